//! Runs the discovery and verification pipeline for one invocation.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use autodrive_core::remote::ObjectFetcher;
use autodrive_core::{
    AutoDriveClient, Database, DiscoveryCrawler, RecordStore, StatsSnapshot, Verifier,
    export_csv, import_csv,
};
use chrono::Utc;
use tracing::{debug, error, info};

use crate::ProcessExit;
use crate::app::progress_manager::{self, Stage};
use crate::app::{config_runtime, summary};
use crate::cli::Args;

pub(crate) async fn run_pipeline(args: Args) -> Result<ProcessExit> {
    let db = Database::new(&args.db)
        .await
        .with_context(|| format!("Failed to open record store {}", args.db.display()))?;
    let store = RecordStore::new(db);

    if let Some(path) = &args.import_csv {
        let stats = import_csv(&store, path)
            .await
            .with_context(|| format!("Failed to import {}", path.display()))?;
        emit(&[format!(
            "Import: {} imported, {} duplicates, {} malformed rows skipped",
            stats.imported, stats.duplicates, stats.malformed
        )]);
    }

    let client = Arc::new(
        AutoDriveClient::new(&config_runtime::client_config(&args))
            .context("Failed to build Auto Drive client")?,
    );
    let use_spinner = !args.quiet && io::stderr().is_terminal();
    let mut exit = ProcessExit::Success;

    if args.phase.discovers() {
        let crawler = DiscoveryCrawler::new(
            config_runtime::crawl_options(&args),
            args.state_file.clone(),
        )?;

        let (handle, stop) =
            progress_manager::spawn_progress_ui(use_spinner, store.clone(), Stage::Discover);
        let result = crawler.run(client.as_ref(), &store).await;
        progress_manager::stop_progress_ui(handle, &stop).await;

        match result {
            Ok(stats) => emit(&summary::crawl_lines(&stats)),
            Err(e) => {
                error!(error = %e, "discovery stopped");
                eprintln!(
                    "Discovery failed: {e}\nProgress saved to {}; run again to resume.",
                    args.state_file.display()
                );
                exit = ProcessExit::Failure;
            }
        }
    }

    if exit == ProcessExit::Success && args.phase.verifies() {
        let verifier = Verifier::new(config_runtime::verify_options(&args))?;
        let fetcher: Arc<dyn ObjectFetcher> = client;

        let (handle, stop) =
            progress_manager::spawn_progress_ui(use_spinner, store.clone(), Stage::Verify);
        let result = verifier.run(store.clone(), fetcher).await;
        progress_manager::stop_progress_ui(handle, &stop).await;

        match result {
            Ok(verify_summary) => emit(&summary::verify_lines(&verify_summary)),
            Err(e) => {
                error!(error = %e, "verification stopped");
                eprintln!("Verification failed: {e}");
                exit = ProcessExit::Failure;
            }
        }
    }

    let stats = store.stats().await.context("Failed to read store statistics")?;
    emit(&summary::store_lines(&stats));

    if let Some(path) = &args.export_csv {
        let rows = export_csv(&store, path)
            .await
            .with_context(|| format!("Failed to export {}", path.display()))?;
        debug!(rows, path = %path.display(), "CSV written");
    }

    if let Some(path) = &args.stats_out {
        StatsSnapshot::from_stats(&stats, Utc::now())
            .write(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), "stats snapshot written");
    }

    store.database().clone().close().await;
    Ok(exit)
}

/// Logs each line at info and prints it to stdout.
fn emit(lines: &[String]) {
    for line in lines {
        info!("{line}");
        println!("{line}");
    }
}
