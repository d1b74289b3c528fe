//! Discovery crawler: pages through the remote catalog and appends new objects.
//!
//! Scopes are crawled in a fixed order. After every page the crawler writes a
//! [`ProgressState`] so an interrupted run resumes at the exact next offset.
//! Any page-fetch failure saves the state first and then ends the run; a
//! skipped page would leave a gap nothing could detect later.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use autodrive_core::crawl::{CrawlOptions, DiscoveryCrawler};
//! use autodrive_core::record::RecordStore;
//! use autodrive_core::remote::{AutoDriveClient, ClientConfig};
//! use autodrive_core::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RecordStore::new(Database::new_in_memory().await?);
//! let client = AutoDriveClient::new(&ClientConfig::default())?;
//! let crawler = DiscoveryCrawler::new(CrawlOptions::default(), PathBuf::from("progress.json"))?;
//! let stats = crawler.run(&client, &store).await?;
//! println!("appended {} new objects", stats.appended);
//! # Ok(())
//! # }
//! ```

mod progress;

pub use progress::{ProgressError, ProgressState};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::record::{NewFileRecord, RecordRepository, StoreError};
use crate::remote::{CatalogError, CatalogObject, CatalogSource, Scope};

/// Default catalog page size.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Default delay between page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Errors that end a discovery run.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Page size must be at least one.
    #[error("invalid page size {0}: must be at least 1")]
    InvalidPageSize(u64),

    /// A catalog page could not be fetched. Progress was saved first.
    #[error("catalog request failed for {scope} scope at offset {offset}: {source}")]
    Catalog {
        /// Scope being crawled.
        scope: Scope,
        /// Offset of the failed page.
        offset: u64,
        /// Underlying error.
        #[source]
        source: CatalogError,
    },

    /// The record store rejected an operation.
    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    /// The progress file could not be written.
    #[error("progress state error: {0}")]
    Progress(#[from] ProgressError),
}

/// Crawl settings.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Items requested per page.
    pub page_size: u64,
    /// Sleep between consecutive page requests.
    pub page_delay: Duration,
    /// Scopes to crawl, in order.
    pub scopes: Vec<Scope>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
            scopes: Scope::ALL.to_vec(),
        }
    }
}

/// Counters from one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Pages fetched successfully.
    pub pages: u64,
    /// Items returned by the catalog.
    pub seen: u64,
    /// Items newly appended to the store.
    pub appended: u64,
    /// Items skipped because their identifier was already known.
    pub duplicates: u64,
    /// Whether the run continued from a saved progress file.
    pub resumed: bool,
}

/// Paginates the catalog and feeds new objects into the record store.
#[derive(Debug, Clone)]
pub struct DiscoveryCrawler {
    options: CrawlOptions,
    progress_path: PathBuf,
}

/// Mutable state threaded through one run.
struct Cursor {
    state: ProgressState,
    known: HashSet<String>,
}

impl DiscoveryCrawler {
    /// Creates a crawler that keeps its progress at `progress_path`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidPageSize`] if `options.page_size` is zero.
    pub fn new(options: CrawlOptions, progress_path: PathBuf) -> Result<Self, CrawlError> {
        if options.page_size == 0 {
            return Err(CrawlError::InvalidPageSize(options.page_size));
        }
        Ok(Self {
            options,
            progress_path,
        })
    }

    /// Path of the progress file.
    #[must_use]
    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    /// Crawls every configured scope, resuming from a saved progress file if
    /// one exists, and deletes the file on clean completion.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Catalog`] on the first failed page (after saving
    /// progress), [`CrawlError::Store`] if an append fails, or
    /// [`CrawlError::Progress`] if the state file cannot be written.
    #[instrument(skip_all, fields(progress = %self.progress_path.display()))]
    pub async fn run<R>(
        &self,
        catalog: &dyn CatalogSource,
        store: &R,
    ) -> Result<CrawlStats, CrawlError>
    where
        R: RecordRepository + ?Sized,
    {
        let mut stats = CrawlStats::default();
        let saved = ProgressState::load(&self.progress_path)?;

        // Loaded once per run; the only full-store allocation in the pipeline.
        let mut known = store.all_ids().await?;

        let (start_index, state) = match saved {
            Some(state) => {
                stats.resumed = true;
                known.extend(state.seen_ids.iter().cloned());
                self.resume_point(state)
            }
            None => (0, ProgressState::start(self.first_scope())),
        };

        if stats.resumed {
            info!(
                scope = %state.scope,
                offset = state.offset,
                seen = state.seen_ids.len(),
                "resuming discovery"
            );
        }

        let mut cursor = Cursor { state, known };
        let mut first_request = true;

        for (index, scope) in self.options.scopes.iter().copied().enumerate() {
            if index < start_index {
                debug!(%scope, "scope already crawled");
                continue;
            }
            if cursor.state.scope != scope {
                cursor.state.scope = scope;
                cursor.state.offset = 0;
                cursor.state.total_count = 0;
            }

            self.crawl_scope(catalog, store, &mut cursor, &mut stats, &mut first_request)
                .await?;
            info!(%scope, total = cursor.state.total_count, "scope crawled");
        }

        ProgressState::clear(&self.progress_path)?;
        info!(
            pages = stats.pages,
            appended = stats.appended,
            duplicates = stats.duplicates,
            "discovery complete"
        );
        Ok(stats)
    }

    fn first_scope(&self) -> Scope {
        self.options.scopes.first().copied().unwrap_or(Scope::Public)
    }

    /// Maps a saved state onto a starting scope index and cursor.
    fn resume_point(&self, mut state: ProgressState) -> (usize, ProgressState) {
        let Some(index) = self
            .options
            .scopes
            .iter()
            .position(|scope| *scope == state.scope)
        else {
            warn!(scope = %state.scope, "saved scope is not configured, starting over");
            state.scope = self.first_scope();
            state.offset = 0;
            state.total_count = 0;
            return (0, state);
        };

        if state.scope_exhausted() {
            // Crash between the final page and the scope switch.
            return (index + 1, state);
        }
        (index, state)
    }

    async fn crawl_scope<R>(
        &self,
        catalog: &dyn CatalogSource,
        store: &R,
        cursor: &mut Cursor,
        stats: &mut CrawlStats,
        first_request: &mut bool,
    ) -> Result<(), CrawlError>
    where
        R: RecordRepository + ?Sized,
    {
        let scope = cursor.state.scope;
        let page_size = self.options.page_size;

        loop {
            if !*first_request && !self.options.page_delay.is_zero() {
                tokio::time::sleep(self.options.page_delay).await;
            }
            *first_request = false;

            let offset = cursor.state.offset;
            let page = match catalog.list_objects(scope, offset, page_size).await {
                Ok(page) => page,
                Err(source) => {
                    warn!(%scope, offset, error = %source, "catalog page failed, saving progress");
                    cursor.state.save(&self.progress_path)?;
                    return Err(CrawlError::Catalog {
                        scope,
                        offset,
                        source,
                    });
                }
            };

            stats.pages += 1;
            cursor.state.total_count = page.total_count;

            for item in &page.items {
                stats.seen += 1;
                if let Err(error) = Self::ingest(store, cursor, stats, scope, item).await {
                    cursor.state.save(&self.progress_path)?;
                    return Err(error);
                }
            }

            cursor.state.offset = offset + page_size;
            cursor.state.save(&self.progress_path)?;

            debug!(
                %scope,
                offset,
                items = page.items.len(),
                total = page.total_count,
                "page processed"
            );

            if offset + page_size >= page.total_count || page.items.is_empty() {
                return Ok(());
            }
        }
    }

    async fn ingest<R>(
        store: &R,
        cursor: &mut Cursor,
        stats: &mut CrawlStats,
        scope: Scope,
        item: &CatalogObject,
    ) -> Result<(), CrawlError>
    where
        R: RecordRepository + ?Sized,
    {
        if !cursor.known.insert(item.cid.clone()) {
            stats.duplicates += 1;
            return Ok(());
        }

        let inserted = store
            .append(&NewFileRecord {
                cid: &item.cid,
                name: &item.name,
                size: item.size,
                mime_type: item.mime_type.as_deref(),
                scope: scope.as_str(),
                object_type: &item.object_type,
            })
            .await?;
        cursor.state.seen_ids.insert(item.cid.clone());

        if inserted {
            stats.appended += 1;
        } else {
            stats.duplicates += 1;
        }
        Ok(())
    }
}
