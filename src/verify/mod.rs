//! Downloadability verifier: a bounded worker pool over untested records.
//!
//! # Concurrency model
//!
//! - Untested identifiers are read in keyset batches (default 100) so memory
//!   stays bounded regardless of store size
//! - For each batch, `C` worker tasks are spawned into a [`JoinSet`]
//! - Workers take the next index from a shared [`AtomicUsize`] cursor before
//!   any await, so every identifier goes to exactly one worker
//! - Each processed identifier is followed by a fixed pacing delay
//! - A cooldown separates full batches
//!
//! Per-item failures never abort the pool. Download failures are classified
//! and persisted; store failures while writing an outcome are logged and
//! counted, leaving the record untested for the next run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use autodrive_core::record::RecordStore;
//! use autodrive_core::remote::{AutoDriveClient, ClientConfig};
//! use autodrive_core::verify::{Verifier, VerifyOptions};
//! use autodrive_core::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RecordStore::new(Database::new_in_memory().await?);
//! let client = Arc::new(AutoDriveClient::new(&ClientConfig::default())?);
//! let verifier = Verifier::new(VerifyOptions::default())?;
//! let summary = verifier.run(store, client).await?;
//! println!("{} downloadable, {} failed", summary.downloadable, summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod classify;
mod probe;
pub mod retry;

pub use classify::classify;
pub use probe::{ProbeResult, probe};
pub use retry::{RetryOptions, RetryReport, RetryState, run_with_retry};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::record::{ErrorCategory, RecordRepository, StoreError, TestOutcome};
use crate::remote::ObjectFetcher;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 64;

/// Number of error categories tracked per run.
const CATEGORY_COUNT: usize = 4;

/// Default worker count.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default delay after each processed identifier.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(500);

/// Default number of identifiers per outer batch.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Default pause between full batches.
pub const DEFAULT_BATCH_COOLDOWN: Duration = Duration::from_secs(1);

/// Errors that stop a verification run.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Batch size must be at least one.
    #[error("invalid batch size {0}: must be at least 1")]
    InvalidBatchSize(u32),

    /// Reading the next batch of untested identifiers failed.
    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}

/// Verifier settings.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Worker count (1-64).
    pub concurrency: usize,
    /// Retry and backoff policy per identifier.
    pub retry: RetryOptions,
    /// Delay after each processed identifier, whatever the outcome.
    pub pacing_delay: Duration,
    /// Identifiers per outer batch.
    pub batch_size: u32,
    /// Pause before each batch after the first.
    pub batch_cooldown: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryOptions::default(),
            pacing_delay: DEFAULT_PACING_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_cooldown: DEFAULT_BATCH_COOLDOWN,
        }
    }
}

/// Live counters shared by all workers.
#[derive(Debug, Default)]
pub struct VerifyStats {
    processed: AtomicUsize,
    downloadable: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    retried: AtomicUsize,
    store_errors: AtomicUsize,
    store_contention: AtomicUsize,
    by_error: [AtomicUsize; CATEGORY_COUNT],
}

impl VerifyStats {
    /// Creates a tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers whose downloads were attempted.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Identifiers found downloadable.
    #[must_use]
    pub fn downloadable(&self) -> usize {
        self.downloadable.load(Ordering::SeqCst)
    }

    /// Identifiers that exhausted their attempts.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Identifiers skipped because they were already tested.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Extra attempts beyond the first, summed over identifiers.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Store operations that failed during the run.
    #[must_use]
    pub fn store_errors(&self) -> usize {
        self.store_errors.load(Ordering::SeqCst)
    }

    /// Store failures caused by lock contention or pool exhaustion.
    #[must_use]
    pub fn store_contention(&self) -> usize {
        self.store_contention.load(Ordering::SeqCst)
    }

    /// Failed identifiers in one category.
    #[must_use]
    pub fn category(&self, category: ErrorCategory) -> usize {
        self.by_error[category_index(category)].load(Ordering::SeqCst)
    }

    fn record_outcome(&self, outcome: &TestOutcome) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        let extra = outcome.attempts().saturating_sub(1);
        self.retried
            .fetch_add(usize::try_from(extra).unwrap_or(0), Ordering::SeqCst);
        match outcome.category() {
            None => {
                self.downloadable.fetch_add(1, Ordering::SeqCst);
            }
            Some(category) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                self.by_error[category_index(category)].fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn record_store_error(&self, error: &StoreError) {
        self.store_errors.fetch_add(1, Ordering::SeqCst);
        if error.is_transient() {
            self.store_contention.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> VerifySummary {
        VerifySummary {
            processed: self.processed(),
            downloadable: self.downloadable(),
            failed: self.failed(),
            skipped: self.skipped(),
            retried: self.retried(),
            store_errors: self.store_errors(),
            store_contention: self.store_contention(),
            by_error: ErrorCategory::ALL
                .into_iter()
                .map(|category| (category, self.category(category)))
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }
}

fn category_index(category: ErrorCategory) -> usize {
    match category {
        ErrorCategory::Encrypted => 0,
        ErrorCategory::ServerIssue => 1,
        ErrorCategory::NotFound => 2,
        ErrorCategory::Unknown => 3,
    }
}

/// Final counters of a verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    /// Identifiers whose downloads were attempted.
    pub processed: usize,
    /// Identifiers found downloadable.
    pub downloadable: usize,
    /// Identifiers that exhausted their attempts.
    pub failed: usize,
    /// Identifiers skipped because they were already tested.
    pub skipped: usize,
    /// Extra attempts beyond the first.
    pub retried: usize,
    /// Store operations that failed.
    pub store_errors: usize,
    /// Subset of `store_errors` caused by lock contention or pool exhaustion.
    pub store_contention: usize,
    /// Failed identifiers per category.
    pub by_error: BTreeMap<ErrorCategory, usize>,
}

/// Bounded worker pool that verifies untested records.
#[derive(Debug, Clone)]
pub struct Verifier {
    options: VerifyOptions,
}

impl Verifier {
    /// Creates a verifier.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidConcurrency`] if the concurrency is
    /// outside 1-64, or [`VerifyError::InvalidBatchSize`] for a zero batch.
    #[instrument(level = "debug", skip(options), fields(concurrency = options.concurrency))]
    pub fn new(options: VerifyOptions) -> Result<Self, VerifyError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.concurrency) {
            return Err(VerifyError::InvalidConcurrency {
                value: options.concurrency,
            });
        }
        if options.batch_size == 0 {
            return Err(VerifyError::InvalidBatchSize(options.batch_size));
        }

        debug!(
            max_retries = options.retry.max_attempts(),
            pacing_ms = u64::try_from(options.pacing_delay.as_millis()).unwrap_or(u64::MAX),
            "creating verifier"
        );
        Ok(Self { options })
    }

    /// Returns the configured options.
    #[must_use]
    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    /// Verifies every record that is untested when its batch is read.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Store`] only if reading a batch fails. Failures
    /// on individual identifiers are recorded and do not end the run.
    #[instrument(skip_all, fields(concurrency = self.options.concurrency))]
    pub async fn run<R>(
        &self,
        store: R,
        fetcher: Arc<dyn ObjectFetcher>,
    ) -> Result<VerifySummary, VerifyError>
    where
        R: RecordRepository + Clone + 'static,
    {
        let stats = Arc::new(VerifyStats::new());
        let options = Arc::new(self.options.clone());
        let mut after: Option<String> = None;
        let mut batches = 0usize;

        info!("starting verification");

        loop {
            let batch = store
                .untested_batch(after.as_deref(), options.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }
            if batches > 0 && !options.batch_cooldown.is_zero() {
                tokio::time::sleep(options.batch_cooldown).await;
            }
            batches += 1;
            after = batch.last().cloned();
            let full = batch.len() == usize::try_from(options.batch_size).unwrap_or(usize::MAX);

            debug!(batch = batches, size = batch.len(), "verifying batch");
            self.run_batch(&store, &fetcher, &options, &stats, batch)
                .await;

            if !full {
                break;
            }
        }

        let summary = stats.snapshot();
        info!(
            processed = summary.processed,
            downloadable = summary.downloadable,
            failed = summary.failed,
            skipped = summary.skipped,
            retried = summary.retried,
            store_errors = summary.store_errors,
            store_contention = summary.store_contention,
            "verification complete"
        );
        Ok(summary)
    }

    async fn run_batch<R>(
        &self,
        store: &R,
        fetcher: &Arc<dyn ObjectFetcher>,
        options: &Arc<VerifyOptions>,
        stats: &Arc<VerifyStats>,
        batch: Vec<String>,
    ) where
        R: RecordRepository + Clone + 'static,
    {
        let batch = Arc::new(batch);
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = self.options.concurrency.min(batch.len());
        let mut set = JoinSet::new();

        for worker in 0..workers {
            let store = store.clone();
            let fetcher = Arc::clone(fetcher);
            let options = Arc::clone(options);
            let stats = Arc::clone(stats);
            let batch = Arc::clone(&batch);
            let cursor = Arc::clone(&cursor);

            set.spawn(async move {
                let mut rng = StdRng::from_entropy();
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(cid) = batch.get(index) else {
                        break;
                    };
                    let processed =
                        verify_one(&store, fetcher.as_ref(), &options, &stats, &mut rng, cid)
                            .await;
                    if processed && !options.pacing_delay.is_zero() {
                        tokio::time::sleep(options.pacing_delay).await;
                    }
                }
                debug!(worker, "worker drained batch");
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "verification worker panicked");
            }
        }
    }
}

/// Verifies one identifier. Returns `false` if it was skipped.
#[instrument(skip(store, fetcher, options, stats, rng))]
async fn verify_one<R>(
    store: &R,
    fetcher: &dyn ObjectFetcher,
    options: &VerifyOptions,
    stats: &VerifyStats,
    rng: &mut StdRng,
    cid: &str,
) -> bool
where
    R: RecordRepository + ?Sized,
{
    match store.is_tested(cid).await {
        Ok(true) => {
            debug!("already tested, skipping");
            stats.increment_skipped();
            return false;
        }
        Ok(false) => {}
        Err(error) => {
            warn!(%error, kind = ?error.database_kind(), "tested check failed, skipping");
            stats.record_store_error(&error);
            return false;
        }
    }

    let report = run_with_retry(
        &options.retry,
        rng,
        |_attempt| probe(fetcher, cid),
        |error| classify(&error.to_string()).is_permanent(),
    )
    .await;

    let outcome = match report.result {
        Ok(result) => {
            debug!(
                attempts = report.attempts,
                bytes = result.bytes_read,
                kind = %result.content_kind,
                "downloadable"
            );
            TestOutcome::Downloadable {
                content_kind: result.content_kind,
                bytes_read: result.bytes_read,
                attempts: report.attempts,
            }
        }
        Err(error) => {
            let message = error.to_string();
            let category = classify(&message);
            info!(attempts = report.attempts, %category, error = %message, "not downloadable");
            TestOutcome::Failed {
                message,
                category,
                attempts: report.attempts,
            }
        }
    };

    match store.mark_tested(cid, &outcome).await {
        Ok(()) => stats.record_outcome(&outcome),
        Err(error) => {
            warn!(
                %error,
                kind = ?error.database_kind(),
                transient = error.is_transient(),
                "failed to record outcome"
            );
            stats.record_store_error(&error);
        }
    }
    true
}
