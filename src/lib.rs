//! Auto Drive audit core library
//!
//! This library discovers every object in an Auto Drive content-addressed
//! store, records each one once by content identifier, and checks whether it
//! can actually be downloaded.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`record`] - Record store keyed by content identifier
//! - [`remote`] - Catalog and download capabilities, plus their HTTP client
//! - [`crawl`] - Resumable catalog discovery
//! - [`verify`] - Bounded downloadability verification with retry
//! - [`report`] - Statistics snapshot and CSV interchange

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crawl;
pub mod db;
pub mod persist;
pub mod record;
pub mod remote;
pub mod report;
pub mod verify;

mod user_agent;

// Re-export commonly used types
pub use crawl::{CrawlError, CrawlOptions, CrawlStats, DiscoveryCrawler, ProgressState};
pub use db::{Database, DatabaseOptions, DbError};
pub use record::{
    ErrorCategory, FileRecord, RecordRepository, RecordStats, RecordStore, StoreError, TestOutcome,
};
pub use remote::{AutoDriveClient, CatalogSource, ClientConfig, ObjectFetcher, Scope};
pub use report::{StatsSnapshot, export_csv, import_csv};
pub use verify::{
    DEFAULT_CONCURRENCY, RetryOptions, Verifier, VerifyError, VerifyOptions, VerifySummary,
    classify,
};
