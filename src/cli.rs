//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use autodrive_core::DEFAULT_CONCURRENCY;
use autodrive_core::remote::{DEFAULT_API_URL, DEFAULT_DOWNLOAD_URL};
use autodrive_core::verify::retry::DEFAULT_MAX_RETRIES;

/// Which pipeline stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Phase {
    /// Discover, then verify.
    All,
    /// Only page through the catalog.
    Discover,
    /// Only verify records already in the store.
    Verify,
}

impl Phase {
    pub fn discovers(self) -> bool {
        matches!(self, Self::All | Self::Discover)
    }

    pub fn verifies(self) -> bool {
        matches!(self, Self::All | Self::Verify)
    }
}

/// Discover Auto Drive objects and verify that they can still be downloaded.
///
/// Discovery pages through the public and private catalogs and records every
/// object once by CID. Verification downloads each untested object with
/// bounded concurrency and records whether it succeeded and, if not, why.
/// Both stages resume where an interrupted run stopped.
#[derive(Parser, Debug)]
#[command(name = "autodrive-audit")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Record store database file
    #[arg(long, default_value = "autodrive.db")]
    pub db: PathBuf,

    /// Discovery progress file (removed after a complete crawl)
    #[arg(long, default_value = "discovery_progress.json")]
    pub state_file: PathBuf,

    /// Catalog API base URL
    #[arg(long, env = "AUTO_DRIVE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Download API base URL
    #[arg(long, env = "AUTO_DRIVE_DOWNLOAD_URL", default_value = DEFAULT_DOWNLOAD_URL)]
    pub download_url: String,

    /// API key for the catalog and download APIs
    #[arg(long, env = "AUTO_DRIVE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Pipeline stages to run
    #[arg(long, value_enum, default_value_t = Phase::All)]
    pub phase: Phase,

    /// Concurrent verification workers (1-64)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub concurrency: u8,

    /// Download attempts per object, including the first (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: u8,

    /// Backoff delay before the second attempt in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub base_delay_ms: u64,

    /// Cap on a single backoff delay in milliseconds
    #[arg(long, default_value_t = 10000, value_parser = clap::value_parser!(u64).range(0..=300_000))]
    pub max_delay_ms: u64,

    /// Stop retrying failures classified as encrypted or not found
    #[arg(long)]
    pub no_retry_permanent: bool,

    /// Delay between catalog page requests in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub page_delay_ms: u64,

    /// Delay after each verified object in milliseconds
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub pacing_ms: u64,

    /// Import records from a legacy CSV before running
    #[arg(long)]
    pub import_csv: Option<PathBuf>,

    /// Export all records to CSV after running
    #[arg(long)]
    pub export_csv: Option<PathBuf>,

    /// Write the statistics snapshot JSON here after running
    #[arg(long)]
    pub stats_out: Option<PathBuf>,
}
