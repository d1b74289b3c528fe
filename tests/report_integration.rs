//! CSV interchange and stats snapshot tests.

mod support;

use autodrive_core::record::{ContentKind, NewFileRecord, TestOutcome};
use autodrive_core::report::CSV_HEADERS;
use autodrive_core::{ErrorCategory, RecordStore, StatsSnapshot, export_csv, import_csv};
use chrono::{TimeZone, Utc};
use support::setup_test_store;

async fn seeded_store() -> (RecordStore, tempfile::TempDir) {
    let (store, dir) = setup_test_store().await;
    for (cid, scope) in [("bafy-a", "public"), ("bafy-b", "public"), ("bafy-c", "private")] {
        store
            .append(&NewFileRecord {
                cid,
                name: "report, final.pdf",
                size: 4096,
                mime_type: Some("application/pdf"),
                scope,
                object_type: "file",
            })
            .await
            .expect("append");
    }
    store
        .mark_tested(
            "bafy-a",
            &TestOutcome::Downloadable {
                content_kind: ContentKind::Binary,
                bytes_read: 4096,
                attempts: 1,
            },
        )
        .await
        .expect("mark");
    store
        .mark_tested(
            "bafy-b",
            &TestOutcome::Failed {
                message: "File is encrypted, password required".to_string(),
                category: ErrorCategory::Encrypted,
                attempts: 3,
            },
        )
        .await
        .expect("mark");
    (store, dir)
}

#[tokio::test]
async fn test_export_then_import_into_fresh_store() {
    let (store, dir) = seeded_store().await;
    let csv_path = dir.path().join("records.csv");

    let rows = export_csv(&store, &csv_path).await.expect("export");
    assert_eq!(rows, 3);

    let text = std::fs::read_to_string(&csv_path).expect("read csv");
    assert!(text.starts_with(&CSV_HEADERS.join(",")));

    let (fresh, _fresh_dir) = setup_test_store().await;
    let stats = import_csv(&fresh, &csv_path).await.expect("import");
    assert_eq!(stats.imported, 3);
    assert_eq!(stats.malformed, 0);

    let original = store.stats().await.expect("stats");
    let copied = fresh.stats().await.expect("stats");
    assert_eq!(copied.total, original.total);
    assert_eq!(copied.downloadable, original.downloadable);
    assert_eq!(copied.failed, original.failed);
    assert_eq!(copied.by_scope, original.by_scope);
    assert_eq!(copied.by_error, original.by_error);

    let b = fresh.get("bafy-b").await.expect("get").expect("present");
    assert_eq!(b.name, "report, final.pdf");
    assert_eq!(b.error_type(), Some(ErrorCategory::Encrypted));
    assert_eq!(
        b.download_error.as_deref(),
        Some("File is encrypted, password required")
    );

    let again = import_csv(&fresh, &csv_path).await.expect("reimport");
    assert_eq!(again.imported, 0);
    assert_eq!(again.duplicates, 3);
}

#[tokio::test]
async fn test_export_of_empty_store_writes_header_only() {
    let (store, dir) = setup_test_store().await;
    let csv_path = dir.path().join("empty.csv");

    assert_eq!(export_csv(&store, &csv_path).await.expect("export"), 0);
    let text = std::fs::read_to_string(&csv_path).expect("read csv");
    assert_eq!(text.trim_end(), CSV_HEADERS.join(","));
}

#[tokio::test]
async fn test_import_skips_malformed_rows() {
    let (store, dir) = setup_test_store().await;
    let csv_path = dir.path().join("legacy.csv");
    std::fs::write(
        &csv_path,
        "id,name,size,scope,tested,isDownloadable,downloadError\n\
         good-1,a.txt,10,Public,true,false,404 not found.\n\
         good-2,b.txt,20,private,false,,\n\
         short-row,c.txt\n\
         bad-size,d.txt,lots,public,false,,\n\
         bad-bool,e.txt,5,public,perhaps,,\n\
         ,f.txt,5,public,false,,\n",
    )
    .expect("write csv");

    let stats = import_csv(&store, &csv_path).await.expect("import");
    assert_eq!(stats.imported, 2);
    assert_eq!(stats.malformed, 4);

    let legacy = store.get("good-1").await.expect("get").expect("present");
    assert_eq!(legacy.scope, "public");
    assert!(legacy.tested);
    assert_eq!(
        legacy.error_type(),
        Some(ErrorCategory::NotFound),
        "missing category derived from the message"
    );

    let untested = store.get("good-2").await.expect("get").expect("present");
    assert!(!untested.tested);
    assert!(untested.is_downloadable.is_none());
}

#[tokio::test]
async fn test_import_of_missing_file_is_empty() {
    let (store, dir) = setup_test_store().await;
    let stats = import_csv(&store, &dir.path().join("absent.csv"))
        .await
        .expect("missing file is not an error");
    assert_eq!(stats.imported + stats.duplicates + stats.malformed, 0);
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn test_stats_snapshot_from_store() {
    let (store, dir) = seeded_store().await;
    let stats = store.stats().await.expect("stats");
    let now = Utc.with_ymd_and_hms(2024, 1, 30, 14, 30, 0).unwrap();

    let snapshot = StatsSnapshot::from_stats(&stats, now);
    assert_eq!(snapshot.timestamp, "January 30, 2024 at 14:30 UTC");
    assert_eq!(snapshot.files.total, 3);
    assert_eq!(snapshot.files.public, 2);
    assert_eq!(snapshot.files.private, 1);
    assert_eq!(snapshot.verification.tested, 2);
    assert_eq!(snapshot.verification.untested, 1);

    let path = dir.path().join("stats.json");
    snapshot.write(&path).expect("write");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(json["files"]["public"], 2);
    assert_eq!(json["verification"]["downloadable"], 1);
    assert_eq!(json["verification"]["errors"]["encrypted"], 1);
}
