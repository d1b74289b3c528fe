//! Repository seam for record persistence operations.
//!
//! The crawler and verifier depend on this trait rather than on
//! [`RecordStore`] directly, so tests can inject faults and a different
//! backend can be swapped in without touching pipeline code.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;

use super::{NewFileRecord, RecordStats, RecordStore, Result, TestOutcome};

/// Data-access contract for the discovery and verification pipeline.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Appends a newly discovered record; `false` if it already existed.
    async fn append(&self, record: &NewFileRecord<'_>) -> Result<bool>;

    /// Returns whether a record exists.
    async fn exists(&self, cid: &str) -> Result<bool>;

    /// Returns whether a record exists and carries an outcome.
    async fn is_tested(&self, cid: &str) -> Result<bool>;

    /// Returns every stored identifier.
    async fn all_ids(&self) -> Result<HashSet<String>>;

    /// Returns every identifier still awaiting verification.
    async fn untested_ids(&self) -> Result<BTreeSet<String>>;

    /// Returns the next keyset page of untested identifiers.
    async fn untested_batch(&self, after: Option<&str>, limit: u32) -> Result<Vec<String>>;

    /// Writes the final outcome for a record.
    async fn mark_tested(&self, cid: &str, outcome: &TestOutcome) -> Result<()>;

    /// Computes aggregate statistics.
    async fn stats(&self) -> Result<RecordStats>;
}

#[async_trait]
impl RecordRepository for RecordStore {
    async fn append(&self, record: &NewFileRecord<'_>) -> Result<bool> {
        RecordStore::append(self, record).await
    }

    async fn exists(&self, cid: &str) -> Result<bool> {
        RecordStore::exists(self, cid).await
    }

    async fn is_tested(&self, cid: &str) -> Result<bool> {
        RecordStore::is_tested(self, cid).await
    }

    async fn all_ids(&self) -> Result<HashSet<String>> {
        RecordStore::all_ids(self).await
    }

    async fn untested_ids(&self) -> Result<BTreeSet<String>> {
        RecordStore::untested_ids(self).await
    }

    async fn untested_batch(&self, after: Option<&str>, limit: u32) -> Result<Vec<String>> {
        RecordStore::untested_batch(self, after, limit).await
    }

    async fn mark_tested(&self, cid: &str, outcome: &TestOutcome) -> Result<()> {
        RecordStore::mark_tested(self, cid, outcome).await
    }

    async fn stats(&self) -> Result<RecordStats> {
        RecordStore::stats(self).await
    }
}
