//! HTTP client for the Auto Drive catalog and download APIs.
//!
//! One [`AutoDriveClient`] implements both [`CatalogSource`] and
//! [`ObjectFetcher`]. It is designed to be created once and shared, taking
//! advantage of reqwest's connection pooling.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument};
use url::Url;

use super::error::{CatalogError, FetchError};
use super::{ByteStream, CatalogObject, CatalogPage, CatalogSource, ObjectFetcher, Scope};
use crate::user_agent;

/// Default catalog API base URL.
pub const DEFAULT_API_URL: &str = "https://mainnet.auto-drive.autonomys.xyz/api";

/// Default download API base URL.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://public.auto-drive.autonomys.xyz/api";

/// Default HTTP connect timeout (30 seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large objects).
const READ_TIMEOUT_SECS: u64 = 300;

/// Maximum number of response-body characters kept in an error message.
const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// Connection settings for [`AutoDriveClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Catalog API base URL.
    pub api_url: String,
    /// Download API base URL.
    pub download_url: String,
    /// API key sent as a bearer token, when set.
    pub api_key: Option<String>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            api_key: None,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Errors building an [`AutoDriveClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// A base URL did not parse.
    #[error("invalid base URL '{url}': {source}")]
    InvalidUrl {
        /// The rejected URL text.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The API key is not a valid header value.
    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,

    /// reqwest refused the configuration.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// HTTP client for the catalog and download APIs.
#[derive(Debug, Clone)]
pub struct AutoDriveClient {
    client: Client,
    api_url: Url,
    download_url: Url,
}

impl AutoDriveClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if a base URL or the API key is invalid, or
    /// if reqwest cannot build the client.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientBuildError> {
        let api_url = parse_base(&config.api_url)?;
        let download_url = parse_base(&config.download_url)?;

        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|key| !key.is_empty()) {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| ClientBuildError::InvalidApiKey)?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
            headers.insert("X-Auth-Provider", HeaderValue::from_static("apikey"));
        }

        let client = ClientBuilder::new()
            .user_agent(user_agent::default_user_agent())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .build()?;

        debug!(
            api_url = %api_url,
            download_url = %download_url,
            authenticated = config.api_key.is_some(),
            "created Auto Drive client"
        );

        Ok(Self {
            client,
            api_url,
            download_url,
        })
    }

    /// URL of the catalog listing endpoint for one page.
    fn roots_url(&self, scope: Scope, offset: u64, limit: u64) -> Option<Url> {
        let mut url = endpoint(&self.api_url, &["objects", "roots"])?;
        url.query_pairs_mut()
            .append_pair("scope", scope.api_value())
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        Some(url)
    }

    /// URL of the download endpoint for one object.
    fn download_endpoint(&self, cid: &str) -> Option<Url> {
        endpoint(&self.download_url, &["downloads", cid])
    }
}

fn parse_base(raw: &str) -> Result<Url, ClientBuildError> {
    Url::parse(raw).map_err(|source| ClientBuildError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Appends path segments to `base`, ignoring any trailing slash on the base.
fn endpoint(base: &Url, segments: &[&str]) -> Option<Url> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().ok()?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Some(url)
}

fn truncate_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_ERROR_DETAIL_CHARS).collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RootsResponse {
    #[serde(default)]
    rows: Vec<RootRow>,
    #[serde(deserialize_with = "lenient_u64")]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RootRow {
    head_cid: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    size: u64,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default, rename = "type")]
    object_type: Option<String>,
}

impl From<RootRow> for CatalogObject {
    fn from(row: RootRow) -> Self {
        Self {
            cid: row.head_cid,
            name: row.name.unwrap_or_default(),
            size: row.size,
            mime_type: row.mime_type,
            object_type: row.object_type.unwrap_or_else(|| "file".to_string()),
        }
    }
}

/// Accepts a number, a numeric string, or null (as zero).
///
/// The catalog serializes big integers as strings.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
        Null(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        Raw::Null(()) => Ok(0),
    }
}

#[async_trait]
impl CatalogSource for AutoDriveClient {
    #[instrument(skip(self), fields(scope = %scope))]
    async fn list_objects(
        &self,
        scope: Scope,
        offset: u64,
        limit: u64,
    ) -> Result<CatalogPage, CatalogError> {
        let url = self
            .roots_url(scope, offset, limit)
            .ok_or_else(|| CatalogError::InvalidUrl {
                url: self.api_url.to_string(),
            })?;
        let url_text = url.to_string();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::from_reqwest(&url_text, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::HttpStatus {
                url: url_text,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::from_reqwest(&url_text, e))?;
        let parsed: RootsResponse =
            serde_json::from_str(&body).map_err(|e| CatalogError::Decode {
                url: url_text.clone(),
                message: e.to_string(),
            })?;

        debug!(
            rows = parsed.rows.len(),
            total = parsed.total_count,
            "catalog page received"
        );

        Ok(CatalogPage {
            items: parsed.rows.into_iter().map(CatalogObject::from).collect(),
            total_count: parsed.total_count,
        })
    }
}

#[async_trait]
impl ObjectFetcher for AutoDriveClient {
    #[instrument(skip(self))]
    async fn fetch(&self, cid: &str) -> Result<ByteStream, FetchError> {
        let url = self
            .download_endpoint(cid)
            .ok_or_else(|| FetchError::InvalidUrl(self.download_url.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            // Best effort: the body often explains why (e.g. encrypted content).
            let detail = response
                .text()
                .await
                .ok()
                .and_then(|body| truncate_detail(&body));
            return Err(FetchError::http_status(status.as_u16(), detail));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout
                    } else {
                        FetchError::Stream(e.without_url().to_string())
                    }
                })
            })
            .boxed();

        Ok(stream)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client_with(api: &str, download: &str) -> AutoDriveClient {
        AutoDriveClient::new(&ClientConfig {
            api_url: api.to_string(),
            download_url: download.to_string(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_roots_url_appends_path_and_query() {
        let client = client_with("https://api.example/api/", "https://dl.example/api");
        let url = client.roots_url(Scope::Private, 200, 100).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example/api/objects/roots?scope=user&offset=200&limit=100"
        );
    }

    #[test]
    fn test_download_endpoint_without_trailing_slash() {
        let client = client_with("https://api.example/api", "https://dl.example/api");
        let url = client.download_endpoint("bafkreiabc").unwrap();
        assert_eq!(url.as_str(), "https://dl.example/api/downloads/bafkreiabc");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = AutoDriveClient::new(&ClientConfig {
            api_url: "not a url".to_string(),
            ..ClientConfig::default()
        });
        assert!(matches!(result, Err(ClientBuildError::InvalidUrl { .. })));
    }

    #[test]
    fn test_api_key_with_newline_is_rejected() {
        let result = AutoDriveClient::new(&ClientConfig {
            api_key: Some("abc\ndef".to_string()),
            ..ClientConfig::default()
        });
        assert!(matches!(result, Err(ClientBuildError::InvalidApiKey)));
    }

    #[test]
    fn test_roots_response_accepts_string_numbers() {
        let body = r#"{
            "rows": [
                {"headCid": "bafy1", "name": "a.txt", "size": "1024", "mimeType": "text/plain", "type": "file"},
                {"headCid": "bafy2", "size": 7, "type": "folder"},
                {"headCid": "bafy3", "size": null}
            ],
            "totalCount": "3"
        }"#;
        let parsed: RootsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.total_count, 3);

        let items: Vec<CatalogObject> = parsed.rows.into_iter().map(CatalogObject::from).collect();
        assert_eq!(items[0].size, 1024);
        assert_eq!(items[0].mime_type.as_deref(), Some("text/plain"));
        assert_eq!(items[1].object_type, "folder");
        assert_eq!(items[1].name, "");
        assert_eq!(items[2].size, 0);
        assert_eq!(items[2].object_type, "file");
    }

    #[test]
    fn test_truncate_detail_limits_length_and_drops_blank() {
        assert_eq!(truncate_detail("   "), None);
        let long = "x".repeat(500);
        assert_eq!(truncate_detail(&long).unwrap().len(), MAX_ERROR_DETAIL_CHARS);
    }
}
