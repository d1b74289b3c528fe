//! In-memory stand-ins for the remote store and a fault-injecting record store.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use autodrive_core::record::{
    NewFileRecord, RecordRepository, RecordStats, RecordStore, StoreDbErrorKind, StoreError,
    TestOutcome,
};
use autodrive_core::remote::{
    ByteStream, CatalogError, CatalogObject, CatalogPage, CatalogSource, FetchError,
    ObjectFetcher, Scope,
};
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;

/// Catalog serving fixed identifier lists per scope.
#[derive(Default)]
pub struct FakeCatalog {
    public: Vec<String>,
    private: Vec<String>,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(Scope, u64)>>,
}

#[allow(dead_code)]
impl FakeCatalog {
    pub fn new(public: &[String], private: &[String]) -> Self {
        Self {
            public: public.to_vec(),
            private: private.to_vec(),
            ..Self::default()
        }
    }

    /// Makes the `call`-th request (1-indexed) fail.
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `(scope, offset)` requested, in order.
    pub fn requests(&self) -> Vec<(Scope, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_objects(
        &self,
        scope: Scope,
        offset: u64,
        limit: u64,
    ) -> Result<CatalogPage, CatalogError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push((scope, offset));
        if self.fail_on_call == Some(call) {
            return Err(CatalogError::Unavailable(format!("injected failure on call {call}")));
        }

        let ids = match scope {
            Scope::Public => &self.public,
            Scope::Private => &self.private,
        };
        let start = usize::try_from(offset).unwrap().min(ids.len());
        let end = (start + usize::try_from(limit).unwrap()).min(ids.len());

        Ok(CatalogPage {
            items: ids[start..end]
                .iter()
                .map(|cid| CatalogObject {
                    cid: cid.clone(),
                    name: format!("{cid}.dat"),
                    size: 16,
                    mime_type: Some("application/octet-stream".to_string()),
                    object_type: "file".to_string(),
                })
                .collect(),
            total_count: ids.len() as u64,
        })
    }
}

/// Scripted download behavior for one identifier.
#[derive(Clone)]
#[allow(dead_code)]
pub enum Behavior {
    /// Succeed with this body.
    Body(Vec<u8>),
    /// Fail every attempt with this message.
    FailAlways(String),
    /// Fail the first `times` attempts, then succeed with `body`.
    FailTimes {
        times: u32,
        message: String,
        body: Vec<u8>,
    },
}

/// Fetcher with per-identifier scripts and an in-flight counter.
pub struct FakeFetcher {
    behaviors: HashMap<String, Behavior>,
    attempts: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

#[allow(dead_code)]
impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with(mut self, cid: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(cid.to_string(), behavior);
        self
    }

    /// Holds each request open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempts(&self, cid: &str) -> u32 {
        self.attempts.lock().unwrap().get(cid).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectFetcher for FakeFetcher {
    async fn fetch(&self, cid: &str) -> Result<ByteStream, FetchError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(cid.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self
            .behaviors
            .get(cid)
            .cloned()
            .unwrap_or_else(|| Behavior::Body(b"hello world".to_vec()));

        let body = match behavior {
            Behavior::Body(body) => body,
            Behavior::FailAlways(message) => return Err(FetchError::remote(message)),
            Behavior::FailTimes {
                times,
                message,
                body,
            } => {
                if attempt <= times {
                    return Err(FetchError::remote(message));
                }
                body
            }
        };

        Ok(stream::iter(vec![Ok(Bytes::from(body))]).boxed())
    }
}

/// Record store whose `mark_tested` fails for chosen identifiers.
#[derive(Clone)]
pub struct FlakyStore {
    inner: RecordStore,
    fail_mark: HashSet<String>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: RecordStore, fail_mark: &[&str]) -> Self {
        Self {
            inner,
            fail_mark: fail_mark.iter().map(|cid| (*cid).to_string()).collect(),
        }
    }
}

#[async_trait]
impl RecordRepository for FlakyStore {
    async fn append(&self, record: &NewFileRecord<'_>) -> Result<bool, StoreError> {
        self.inner.append(record).await
    }

    async fn exists(&self, cid: &str) -> Result<bool, StoreError> {
        self.inner.exists(cid).await
    }

    async fn is_tested(&self, cid: &str) -> Result<bool, StoreError> {
        self.inner.is_tested(cid).await
    }

    async fn all_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.inner.all_ids().await
    }

    async fn untested_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        self.inner.untested_ids().await
    }

    async fn untested_batch(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<String>, StoreError> {
        self.inner.untested_batch(after, limit).await
    }

    async fn mark_tested(&self, cid: &str, outcome: &TestOutcome) -> Result<(), StoreError> {
        if self.fail_mark.contains(cid) {
            return Err(StoreError::Database {
                kind: StoreDbErrorKind::BusyOrLocked,
                message: "database is locked".to_string(),
            });
        }
        self.inner.mark_tested(cid, outcome).await
    }

    async fn stats(&self) -> Result<RecordStats, StoreError> {
        self.inner.stats().await
    }
}

/// Identifiers `prefix-000` .. `prefix-{n-1}`.
#[allow(dead_code)]
pub fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}-{i:03}")).collect()
}
