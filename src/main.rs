//! CLI entry point for the autodrive-audit tool.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};

mod app;
mod cli;

use app::{config_runtime, runtime};
use cli::Args;

/// Process outcome mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every requested stage finished.
    Success,
    /// A stage stopped on a fatal catalog or store error; saved state allows resuming.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    config_runtime::init_tracing(config_runtime::resolve_default_log_level(&args));

    debug!(phase = ?args.phase, db = %args.db.display(), "CLI arguments parsed");
    info!("autodrive-audit starting");

    match runtime::run_pipeline(args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("run failed: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
