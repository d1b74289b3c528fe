//! Persisted discovery cursor.
//!
//! The state file holds `{scope, offset, totalCount, seenIds}` as JSON. It is
//! rewritten atomically after every processed page and removed once every
//! scope has been crawled, so its presence means "a previous run was
//! interrupted here".

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::persist;
use crate::remote::Scope;

/// Errors reading or writing the progress file.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// Reading, writing or removing the file failed.
    #[error("progress file I/O error at {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding the state failed.
    #[error("failed to encode progress state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Resumable discovery cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Scope being crawled.
    pub scope: Scope,
    /// Offset of the next page to request within `scope`.
    pub offset: u64,
    /// Total reported by the catalog for `scope` on the last page.
    pub total_count: u64,
    /// Every identifier seen so far in this discovery run.
    pub seen_ids: BTreeSet<String>,
}

impl ProgressState {
    /// Fresh state at the start of `scope`.
    #[must_use]
    pub fn start(scope: Scope) -> Self {
        Self {
            scope,
            offset: 0,
            total_count: 0,
            seen_ids: BTreeSet::new(),
        }
    }

    /// Whether the saved cursor already walked past the end of its scope.
    #[must_use]
    pub fn scope_exhausted(&self) -> bool {
        self.offset > 0 && self.offset >= self.total_count
    }

    /// Loads the state at `path`.
    ///
    /// Returns `Ok(None)` if no file exists. An unreadable or corrupt file is
    /// logged and treated as absent; the store's uniqueness keeps a fresh
    /// crawl correct.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Io`] for I/O failures other than "not found".
    pub fn load(path: &Path) -> Result<Option<Self>, ProgressError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ProgressError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        match serde_json::from_str::<Self>(&contents) {
            Ok(state) => {
                debug!(
                    scope = %state.scope,
                    offset = state.offset,
                    seen = state.seen_ids.len(),
                    "loaded progress state"
                );
                Ok(Some(state))
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring corrupt progress file");
                Ok(None)
            }
        }
    }

    /// Atomically writes the state to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError`] if encoding or the atomic write fails.
    pub fn save(&self, path: &Path) -> Result<(), ProgressError> {
        let json = serde_json::to_vec_pretty(self)?;
        persist::write_atomic(path, &json).map_err(|source| ProgressError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Removes the state file; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Io`] if removal fails for another reason.
    pub fn clear(path: &Path) -> Result<(), ProgressError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProgressError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}
