//! Translates parsed CLI arguments into library options and logging setup.

use std::time::Duration;

use autodrive_core::remote::ClientConfig;
use autodrive_core::{CrawlOptions, RetryOptions, VerifyOptions};

use crate::cli::Args;

pub(crate) fn resolve_default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the CLI level.
pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

pub(crate) fn client_config(args: &Args) -> ClientConfig {
    ClientConfig {
        api_url: args.api_url.clone(),
        download_url: args.download_url.clone(),
        api_key: args.api_key.clone().filter(|key| !key.trim().is_empty()),
        ..ClientConfig::default()
    }
}

pub(crate) fn crawl_options(args: &Args) -> CrawlOptions {
    CrawlOptions {
        page_delay: Duration::from_millis(args.page_delay_ms),
        ..CrawlOptions::default()
    }
}

pub(crate) fn verify_options(args: &Args) -> VerifyOptions {
    VerifyOptions {
        concurrency: usize::from(args.concurrency),
        retry: RetryOptions {
            max_retries: u32::from(args.max_retries),
            base_delay: Duration::from_millis(args.base_delay_ms),
            max_delay: Duration::from_millis(args.max_delay_ms),
            retry_permanent: !args.no_retry_permanent,
        },
        pacing_delay: Duration::from_millis(args.pacing_ms),
        ..VerifyOptions::default()
    }
}
