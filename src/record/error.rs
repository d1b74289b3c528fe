//! Error types for record store operations.

use std::fmt;

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Coarse cause of a database failure, used to decide whether a failed write
/// is worth retrying on a later run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// Another connection held the write lock past the busy timeout.
    BusyOrLocked,
    /// A UNIQUE, CHECK or NOT NULL constraint rejected the row.
    Constraint,
    /// No pooled connection was available (timed out or closed).
    PoolUnavailable,
    /// Anything else.
    Other,
}

impl StoreDbErrorKind {
    /// Classifies a sqlx error.
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::PoolUnavailable,
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::CheckViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::ForeignKeyViolation => Self::Constraint,
                _ if is_busy(db.code().as_deref(), db.message()) => Self::BusyOrLocked,
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }

    /// Whether the same write may succeed once contention clears.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::BusyOrLocked | Self::PoolUnavailable)
    }
}

/// `SQLITE_BUSY` (5) and `SQLITE_LOCKED` (6), including extended codes.
fn is_busy(code: Option<&str>, message: &str) -> bool {
    let primary = code
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| code & 0xff);
    matches!(primary, Some(5 | 6)) || message.contains("database is locked")
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy",
            Self::Constraint => "constraint",
            Self::PoolUnavailable => "pool_unavailable",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

/// Errors that can occur during record store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used for failure handling.
        kind: StoreDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// No record exists for the content identifier.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The record already carries a final outcome.
    #[error("record already tested: {0}")]
    AlreadyTested(String),

    /// A persisted column held a value outside its domain.
    #[error("invalid stored value for {field}: '{value}'")]
    InvalidValue {
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether a later run may succeed where this call failed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.database_kind().is_some_and(StoreDbErrorKind::is_transient)
    }
}
