//! Error types for the remote catalog and download capabilities.
//!
//! Display strings are the messages persisted with failed verifications and
//! fed to the error classifier. They keep the status code and reason phrase
//! verbatim and never embed the identifier or URL, whose digits could match a
//! classifier cue by accident.

use thiserror::Error;

/// Errors from a single-object download.
///
/// Variants carry no identifier; callers log the CID in their own span.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request timed out before completion.
    #[error("timeout while downloading")]
    Timeout,

    /// Non-success HTTP response.
    #[error("HTTP {status} {reason}{}", format_detail(.detail))]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Reason phrase for the status.
        reason: String,
        /// Leading part of the response body, when one was sent.
        detail: Option<String>,
    },

    /// The body stream broke off part way.
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// The remote store refused the object for a reason it described in text.
    #[error("{0}")]
    Remote(String),

    /// The download URL could not be built.
    #[error("invalid download URL: {0}")]
    InvalidUrl(String),
}

fn format_detail(detail: &Option<String>) -> String {
    match detail {
        Some(detail) if !detail.is_empty() => format!(": {detail}"),
        _ => String::new(),
    }
}

/// Reason phrase for a status, including the Cloudflare-specific 52x codes
/// that have no canonical phrase.
#[must_use]
pub fn reason_phrase(status: u16) -> String {
    if let Some(reason) = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        return reason.to_string();
    }
    match status {
        520 => "Cloudflare unknown error".to_string(),
        521 => "Cloudflare web server is down".to_string(),
        522 => "Cloudflare connection timed out".to_string(),
        523 => "Cloudflare origin is unreachable".to_string(),
        524 => "Cloudflare a timeout occurred".to_string(),
        _ => "unexpected status".to_string(),
    }
}

impl FetchError {
    /// Creates a network error from a reqwest error, mapping timeouts to [`FetchError::Timeout`].
    ///
    /// The request URL is stripped from the source error.
    #[must_use]
    pub fn from_reqwest(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(source.without_url())
        }
    }

    /// Creates an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, detail: Option<String>) -> Self {
        Self::HttpStatus {
            status,
            reason: reason_phrase(status),
            detail,
        }
    }

    /// Creates an error carrying the store's own message verbatim.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }
}

/// Errors from a catalog page request.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level error.
    #[error("network error listing {url}: {source}")]
    Network {
        /// Request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out.
    #[error("timeout listing {url}")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} listing {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Body could not be decoded as a catalog page.
    #[error("invalid catalog response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// The listing URL could not be built.
    #[error("invalid catalog URL: {url}")]
    InvalidUrl {
        /// The rejected URL text.
        url: String,
    },

    /// Any other failure reported by a catalog implementation.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    /// Creates a network error, mapping timeouts to [`CatalogError::Timeout`].
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }
}
