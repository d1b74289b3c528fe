//! Run reports: the JSON statistics snapshot and CSV interchange.

mod interchange;
mod snapshot;

pub use interchange::{CSV_HEADERS, ImportStats, export_csv, import_csv};
pub use snapshot::{FileCounts, StatsSnapshot, VerificationCounts, format_timestamp};

use crate::record::StoreError;

/// Errors producing or consuming reports.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// File I/O failed.
    #[error("report I/O error at {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CSV header lacks a required column.
    #[error("CSV is missing required column '{0}'")]
    MissingColumn(&'static str),

    /// The record store failed.
    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}
