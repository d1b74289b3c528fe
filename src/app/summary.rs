//! End-of-run summary lines.

use autodrive_core::{CrawlStats, RecordStats, VerifySummary};

/// Summary lines for a discovery run.
pub(crate) fn crawl_lines(stats: &CrawlStats) -> Vec<String> {
    let mut lines = vec![format!(
        "Discovery: {} pages, {} objects listed, {} new, {} already known",
        stats.pages, stats.seen, stats.appended, stats.duplicates
    )];
    if stats.resumed {
        lines.push("Discovery resumed from saved progress".to_string());
    }
    lines
}

/// Summary lines for a verification run.
pub(crate) fn verify_lines(summary: &VerifySummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Verification: {} checked, {} downloadable, {} failed, {} retries",
        summary.processed, summary.downloadable, summary.failed, summary.retried
    )];
    if summary.skipped > 0 {
        lines.push(format!("  {} already tested, skipped", summary.skipped));
    }
    if summary.store_errors > 0 {
        lines.push(format!(
            "  {} outcomes could not be saved and will be retried next run",
            summary.store_errors
        ));
    }
    if summary.store_contention > 0 {
        lines.push(format!(
            "  {} of those hit a locked database; consider lowering --concurrency",
            summary.store_contention
        ));
    }
    lines
}

/// Summary lines for the store as a whole.
pub(crate) fn store_lines(stats: &RecordStats) -> Vec<String> {
    let mut lines = vec![format!(
        "Store: {} total ({} public, {} private), {} tested, {} downloadable, {} failed, {} untested",
        stats.total,
        stats.scope_count("public"),
        stats.scope_count("private"),
        stats.tested,
        stats.downloadable,
        stats.failed,
        stats.untested
    )];
    for (category, count) in &stats.by_error {
        lines.push(format!("  {category}: {count}"));
    }
    lines
}
