//! Record types and outcome definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Failure taxonomy recorded for objects that could not be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Content is password protected or otherwise encrypted.
    Encrypted,
    /// Gateway, timeout or 5xx trouble on the remote side.
    ServerIssue,
    /// The object does not exist (any more).
    NotFound,
    /// Nothing matched.
    Unknown,
}

impl ErrorCategory {
    /// All categories, in classifier priority order.
    pub const ALL: [Self; 4] = [
        Self::Encrypted,
        Self::ServerIssue,
        Self::NotFound,
        Self::Unknown,
    ];

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encrypted => "encrypted",
            Self::ServerIssue => "server_issue",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the failure is not expected to change between runs.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Encrypted | Self::NotFound)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "encrypted" => Ok(Self::Encrypted),
            "server_issue" => Ok(Self::ServerIssue),
            "not_found" => Ok(Self::NotFound),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("invalid error category: {s}")),
        }
    }
}

/// Result of sniffing downloaded content for a null byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// No null byte seen.
    Text,
    /// At least one null byte seen.
    Binary,
}

impl ContentKind {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "binary" => Ok(Self::Binary),
            _ => Err(format!("invalid content kind: {s}")),
        }
    }
}

/// Final verification outcome for one record.
///
/// The two variants carry exactly the fields each outcome needs, so a
/// downloadable outcome can never hold an error category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    /// The full object was retrieved.
    Downloadable {
        /// Text/binary classification of the body.
        content_kind: ContentKind,
        /// Bytes read from the stream.
        bytes_read: u64,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed.
    Failed {
        /// Message of the final error.
        message: String,
        /// Classified category of `message`.
        category: ErrorCategory,
        /// Attempts used.
        attempts: u32,
    },
}

impl TestOutcome {
    /// Whether this outcome marks the object downloadable.
    #[must_use]
    pub fn is_downloadable(&self) -> bool {
        matches!(self, Self::Downloadable { .. })
    }

    /// Number of attempts recorded with the outcome.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Downloadable { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// Error category, for failed outcomes.
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Downloadable { .. } => None,
            Self::Failed { category, .. } => Some(*category),
        }
    }
}

/// Fields needed to append a freshly discovered object.
#[derive(Debug, Clone, Copy)]
pub struct NewFileRecord<'a> {
    /// Content identifier.
    pub cid: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Size in bytes as reported by the catalog.
    pub size: u64,
    /// MIME type, when the catalog knows it.
    pub mime_type: Option<&'a str>,
    /// Catalog partition the object was found in.
    pub scope: &'a str,
    /// Catalog object type (`file`, `folder`, ...).
    pub object_type: &'a str,
}

/// A single persisted record.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FileRecord {
    /// Content identifier (primary key).
    pub cid: String,
    /// Display name.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// MIME type, when known.
    pub mime_type: Option<String>,
    /// Catalog partition label.
    pub scope: String,
    /// Catalog object type.
    pub object_type: String,
    /// RFC 3339 discovery timestamp.
    pub discovered_at: String,
    /// Whether verification has written an outcome.
    pub tested: bool,
    /// RFC 3339 verification timestamp.
    pub tested_at: Option<String>,
    /// Verification result; set iff `tested`.
    pub is_downloadable: Option<bool>,
    /// Final error message for failed verifications.
    pub download_error: Option<String>,
    /// Error category, stored as text (parsed via `error_type()`).
    #[sqlx(rename = "error_type")]
    pub error_type_str: Option<String>,
    /// Content kind, stored as text (parsed via `content_kind()`).
    #[sqlx(rename = "content_kind")]
    pub content_kind_str: Option<String>,
    /// Attempts used by verification.
    pub attempts: Option<i64>,
    /// Bytes read during a successful verification.
    pub bytes_read: Option<i64>,
}

impl FileRecord {
    /// Returns the parsed error category, if any.
    ///
    /// Unrecognized stored values map to [`ErrorCategory::Unknown`].
    #[must_use]
    pub fn error_type(&self) -> Option<ErrorCategory> {
        self.error_type_str
            .as_deref()
            .map(|value| value.parse().unwrap_or(ErrorCategory::Unknown))
    }

    /// Returns the parsed content kind, if any.
    #[must_use]
    pub fn content_kind(&self) -> Option<ContentKind> {
        self.content_kind_str
            .as_deref()
            .and_then(|value| value.parse().ok())
    }

    /// Checks the outcome invariants that tie `tested`, `is_downloadable`
    /// and `error_type` together.
    #[must_use]
    pub fn outcome_is_consistent(&self) -> bool {
        match (self.tested, self.is_downloadable) {
            (false, None) => self.error_type_str.is_none(),
            (false, Some(_)) => false,
            (true, None) => false,
            (true, Some(true)) => self.error_type_str.is_none(),
            (true, Some(false)) => self.error_type().is_some(),
        }
    }
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordStats {
    /// Number of records.
    pub total: i64,
    /// Records with an outcome.
    pub tested: i64,
    /// Records still awaiting verification.
    pub untested: i64,
    /// Tested and downloadable.
    pub downloadable: i64,
    /// Tested and not downloadable.
    pub failed: i64,
    /// Record count per scope label.
    pub by_scope: BTreeMap<String, i64>,
    /// Failed record count per error category.
    pub by_error: BTreeMap<String, i64>,
}

impl RecordStats {
    /// Count for one scope label, zero if absent.
    #[must_use]
    pub fn scope_count(&self, scope: &str) -> i64 {
        self.by_scope.get(scope).copied().unwrap_or(0)
    }
}
