//! Statistics snapshot published after a run.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ReportError;
use crate::persist;
use crate::record::RecordStats;

/// Object counts per scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    /// Public plus private.
    pub total: i64,
    /// Objects in the public scope.
    pub public: i64,
    /// Objects in the private scope.
    pub private: i64,
}

/// Verification counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationCounts {
    /// Records with an outcome.
    pub tested: i64,
    /// Records found downloadable.
    pub downloadable: i64,
    /// Records that could not be downloaded.
    pub failed: i64,
    /// Records awaiting verification.
    pub untested: i64,
    /// Failed records per error category.
    pub errors: BTreeMap<String, i64>,
}

/// JSON document written to the stats file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Human-readable generation time, e.g. `January 30, 2024 at 14:30 UTC`.
    pub timestamp: String,
    /// Object counts per scope.
    pub files: FileCounts,
    /// Verification counts.
    pub verification: VerificationCounts,
}

impl StatsSnapshot {
    /// Builds a snapshot from store statistics at time `now`.
    ///
    /// Scope labels are matched case-insensitively; labels other than
    /// `public` and `private` are left out of the file counts.
    #[must_use]
    pub fn from_stats(stats: &RecordStats, now: DateTime<Utc>) -> Self {
        let mut files = FileCounts::default();
        for (scope, count) in &stats.by_scope {
            match scope.to_ascii_lowercase().as_str() {
                "public" => files.public += count,
                "private" => files.private += count,
                _ => {}
            }
        }
        files.total = files.public + files.private;

        Self {
            timestamp: format_timestamp(now),
            files,
            verification: VerificationCounts {
                tested: stats.tested,
                downloadable: stats.downloadable,
                failed: stats.failed,
                untested: stats.untested,
                errors: stats.by_error.clone(),
            },
        }
    }

    /// Atomically writes the snapshot as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if encoding or writing fails.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_vec_pretty(self)?;
        persist::write_atomic(path, &json).map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Formats `now` as `January 30, 2024 at 14:30 UTC`.
#[must_use]
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%B %d, %Y at %H:%M UTC").to_string()
}
