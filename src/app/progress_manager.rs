//! Progress UI (spinner) for discovery and verification runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use autodrive_core::RecordStore;
use indicatif::{ProgressBar, ProgressStyle};

/// Stage the spinner describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Discover,
    Verify,
}

/// Spawns the progress UI (spinner) when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    store: RecordStore,
    stage: Stage,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(store, stage, Arc::clone(&stop));
    (Some(handle), stop)
}

/// Signals the spinner to stop and waits for it to clear.
pub(crate) async fn stop_progress_ui(
    handle: Option<tokio::task::JoinHandle<()>>,
    stop: &AtomicBool,
) {
    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = handle {
        let _ = handle.await;
    }
}

fn spawn_spinner_inner(
    store: RecordStore,
    stage: Stage,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            if let Ok(stats) = store.stats().await {
                spinner.set_message(progress_message(stage, stats.total, stats.tested));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        spinner.finish_and_clear();
    })
}

fn progress_message(stage: Stage, total: i64, tested: i64) -> String {
    match stage {
        Stage::Discover => format!("Discovering... {total} objects recorded"),
        Stage::Verify => format!("[{}/{}] Verifying downloads...", tested.min(total), total),
    }
}
