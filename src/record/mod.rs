//! Record store for discovered objects and their verification outcomes.
//!
//! This module provides `SQLite`-backed persistence for [`FileRecord`]s keyed by
//! content identifier. Records are created by discovery (`tested = false`) and
//! receive exactly one outcome from verification; they are never deleted.
//!
//! # Overview
//!
//! - [`RecordStore`] - Main interface for store operations
//! - [`RecordRepository`] - Async trait seam used by the crawler and verifier
//! - [`FileRecord`] / [`TestOutcome`] / [`ErrorCategory`] - Record types
//! - [`StoreError`] - Operation error types
//!
//! # Write serialization
//!
//! All clones of a [`RecordStore`] share one async write gate. `append` and
//! `mark_tested` hold it for the duration of their single statement, so
//! concurrent workers never interleave mutating calls. `mark_tested` is a
//! conditional point update (`WHERE tested = 0`), which makes a second outcome
//! for the same identifier impossible rather than merely unlikely.
//!
//! # Example
//!
//! ```no_run
//! use autodrive_core::record::{NewFileRecord, RecordStore};
//! use autodrive_core::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RecordStore::new(Database::new_in_memory().await?);
//! let inserted = store
//!     .append(&NewFileRecord {
//!         cid: "bafkreia",
//!         name: "notes.txt",
//!         size: 12,
//!         mime_type: Some("text/plain"),
//!         scope: "public",
//!         object_type: "file",
//!     })
//!     .await?;
//! assert!(inserted);
//! # Ok(())
//! # }
//! ```

mod error;
mod item;
mod repository;

pub use error::{StoreDbErrorKind, StoreError};
pub use item::{
    ContentKind, ErrorCategory, FileRecord, NewFileRecord, RecordStats, TestOutcome,
};
pub use repository::RecordRepository;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Current time as an RFC 3339 UTC string, the format used by every timestamp column.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Record store backed by `SQLite`.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db: Database,
    write_gate: Arc<Mutex<()>>,
}

impl RecordStore {
    /// Creates a record store over an opened database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Appends a newly discovered record with `tested = false`.
    ///
    /// Returns `false` without modifying anything when the identifier is
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self, record), fields(cid = %record.cid, scope = %record.scope))]
    pub async fn append(&self, record: &NewFileRecord<'_>) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        let result = sqlx::query(
            r"INSERT INTO file_records (
                cid, name, size, mime_type, scope, object_type, discovered_at
              )
              VALUES (?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(cid) DO NOTHING",
        )
        .bind(record.cid)
        .bind(record.name)
        .bind(to_i64(record.size))
        .bind(record.mime_type)
        .bind(record.scope)
        .bind(record.object_type)
        .bind(now_timestamp())
        .execute(self.db.pool())
        .await?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!("record already present");
        }
        Ok(inserted)
    }

    /// Inserts a complete record (including any outcome), used by CSV import.
    ///
    /// Returns `false` when the identifier is already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidValue`] if the record breaks the outcome
    /// invariants, or [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self, record), fields(cid = %record.cid))]
    pub async fn import_record(&self, record: &FileRecord) -> Result<bool> {
        if !record.outcome_is_consistent() {
            return Err(StoreError::InvalidValue {
                field: "tested/isDownloadable/errorType",
                value: format!(
                    "{}/{:?}/{:?}",
                    record.tested, record.is_downloadable, record.error_type_str
                ),
            });
        }

        let _gate = self.write_gate.lock().await;
        let result = sqlx::query(
            r"INSERT INTO file_records (
                cid, name, size, mime_type, scope, object_type, discovered_at,
                tested, tested_at, is_downloadable, download_error, error_type,
                content_kind, attempts, bytes_read
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(cid) DO NOTHING",
        )
        .bind(&record.cid)
        .bind(&record.name)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(&record.scope)
        .bind(&record.object_type)
        .bind(&record.discovered_at)
        .bind(record.tested)
        .bind(&record.tested_at)
        .bind(record.is_downloadable)
        .bind(&record.download_error)
        .bind(&record.error_type_str)
        .bind(&record.content_kind_str)
        .bind(record.attempts)
        .bind(record.bytes_read)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Returns whether a record exists for the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn exists(&self, cid: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM file_records WHERE cid = ?)")
                .bind(cid)
                .fetch_one(self.db.pool())
                .await?;
        Ok(exists)
    }

    /// Returns whether the record exists and already carries an outcome.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn is_tested(&self, cid: &str) -> Result<bool> {
        let tested: Option<bool> =
            sqlx::query_scalar("SELECT tested FROM file_records WHERE cid = ?")
                .bind(cid)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(tested.unwrap_or(false))
    }

    /// Retrieves one record by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, cid: &str) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM file_records WHERE cid = ?")
            .bind(cid)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(record)
    }

    /// Returns every identifier in the store.
    ///
    /// This materializes the whole key column and is meant for seeding the
    /// crawler's seen-set once per run; memory grows linearly with the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn all_ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT cid FROM file_records")
            .fetch_all(self.db.pool())
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Returns the identifiers of every record still awaiting verification.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn untested_ids(&self) -> Result<BTreeSet<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT cid FROM file_records WHERE tested = 0 ORDER BY cid")
                .fetch_all(self.db.pool())
                .await?;
        Ok(ids.into_iter().collect())
    }

    /// Returns up to `limit` untested identifiers ordered by identifier and
    /// strictly greater than `after`.
    ///
    /// Keyset pagination keeps each batch bounded and guarantees forward
    /// progress even when a record cannot be marked.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn untested_batch(&self, after: Option<&str>, limit: u32) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r"SELECT cid FROM file_records
              WHERE tested = 0 AND (?1 IS NULL OR cid > ?1)
              ORDER BY cid
              LIMIT ?2",
        )
        .bind(after)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(ids)
    }

    /// Writes the final verification outcome for a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record exists for `cid`,
    /// [`StoreError::AlreadyTested`] if it already carries an outcome, or
    /// [`StoreError::Database`] if the update fails.
    #[instrument(skip(self, outcome), fields(downloadable = outcome.is_downloadable()))]
    pub async fn mark_tested(&self, cid: &str, outcome: &TestOutcome) -> Result<()> {
        let (is_downloadable, message, category, content_kind, bytes_read) = match outcome {
            TestOutcome::Downloadable {
                content_kind,
                bytes_read,
                ..
            } => (
                true,
                None,
                None,
                Some(content_kind.as_str()),
                Some(to_i64(*bytes_read)),
            ),
            TestOutcome::Failed {
                message, category, ..
            } => (
                false,
                Some(message.as_str()),
                Some(category.as_str()),
                None,
                None,
            ),
        };

        let _gate = self.write_gate.lock().await;
        let result = sqlx::query(
            r"UPDATE file_records
              SET tested = 1,
                  tested_at = ?,
                  is_downloadable = ?,
                  download_error = ?,
                  error_type = ?,
                  content_kind = ?,
                  attempts = ?,
                  bytes_read = ?
              WHERE cid = ? AND tested = 0",
        )
        .bind(now_timestamp())
        .bind(is_downloadable)
        .bind(message)
        .bind(category)
        .bind(content_kind)
        .bind(i64::from(outcome.attempts()))
        .bind(bytes_read)
        .bind(cid)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        if self.exists(cid).await? {
            Err(StoreError::AlreadyTested(cid.to_string()))
        } else {
            Err(StoreError::NotFound(cid.to_string()))
        }
    }

    /// Lists every record ordered by discovery time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_records ORDER BY discovered_at ASC, cid ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    /// Returns the number of records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_records")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Computes aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a query fails.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<RecordStats> {
        let (total, tested, downloadable, failed): (i64, i64, i64, i64) = sqlx::query_as(
            r"SELECT
                COUNT(*),
                COALESCE(SUM(tested), 0),
                COALESCE(SUM(CASE WHEN is_downloadable = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_downloadable = 0 THEN 1 ELSE 0 END), 0)
              FROM file_records",
        )
        .fetch_one(self.db.pool())
        .await?;

        let by_scope: Vec<(String, i64)> =
            sqlx::query_as("SELECT scope, COUNT(*) FROM file_records GROUP BY scope")
                .fetch_all(self.db.pool())
                .await?;

        let by_error: Vec<(String, i64)> = sqlx::query_as(
            r"SELECT error_type, COUNT(*) FROM file_records
              WHERE error_type IS NOT NULL
              GROUP BY error_type",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(RecordStats {
            total,
            tested,
            untested: total - tested,
            downloadable,
            failed,
            by_scope: by_scope.into_iter().collect(),
            by_error: by_error.into_iter().collect(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_record<'a>(cid: &'a str, scope: &'a str) -> NewFileRecord<'a> {
        NewFileRecord {
            cid,
            name: "file.bin",
            size: 42,
            mime_type: None,
            scope,
            object_type: "file",
        }
    }

    async fn store() -> RecordStore {
        RecordStore::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_append_then_exists() {
        let store = store().await;
        assert!(!store.exists("bafy1").await.unwrap());

        assert!(store.append(&new_record("bafy1", "public")).await.unwrap());
        assert!(store.exists("bafy1").await.unwrap());
        assert!(!store.is_tested("bafy1").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_duplicate_returns_false_and_keeps_one_row() {
        let store = store().await;
        assert!(store.append(&new_record("bafy1", "public")).await.unwrap());
        assert!(!store.append(&new_record("bafy1", "private")).await.unwrap());

        assert_eq!(store.count().await.unwrap(), 1);
        let record = store.get("bafy1").await.unwrap().unwrap();
        assert_eq!(record.scope, "public", "first write wins");
    }

    #[tokio::test]
    async fn test_mark_tested_missing_record_is_not_found() {
        let store = store().await;
        let outcome = TestOutcome::Failed {
            message: "boom".to_string(),
            category: ErrorCategory::Unknown,
            attempts: 1,
        };
        let result = store.mark_tested("missing", &outcome).await;
        assert!(matches!(result, Err(StoreError::NotFound(cid)) if cid == "missing"));
    }

    #[tokio::test]
    async fn test_mark_tested_twice_is_rejected() {
        let store = store().await;
        store.append(&new_record("bafy1", "public")).await.unwrap();
        let outcome = TestOutcome::Downloadable {
            content_kind: ContentKind::Text,
            bytes_read: 42,
            attempts: 1,
        };

        store.mark_tested("bafy1", &outcome).await.unwrap();
        let second = store.mark_tested("bafy1", &outcome).await;
        assert!(matches!(second, Err(StoreError::AlreadyTested(_))));
    }

    #[tokio::test]
    async fn test_untested_batch_pages_by_key() {
        let store = store().await;
        for cid in ["c", "a", "d", "b"] {
            store.append(&new_record(cid, "public")).await.unwrap();
        }

        let first = store.untested_batch(None, 2).await.unwrap();
        assert_eq!(first, vec!["a", "b"]);
        let second = store.untested_batch(Some("b"), 2).await.unwrap();
        assert_eq!(second, vec!["c", "d"]);
        let done = store.untested_batch(Some("d"), 2).await.unwrap();
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn test_stats_on_empty_store_are_zero() {
        let store = store().await;
        let stats = store.stats().await.unwrap();
        assert_eq!(stats, RecordStats::default());
    }
}
