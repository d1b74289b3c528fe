//! Integration tests for the record store on a file-backed database.

mod support;

use autodrive_core::record::{ContentKind, NewFileRecord, StoreError, TestOutcome};
use autodrive_core::{Database, ErrorCategory, RecordStore};
use support::setup_test_store;

fn new_record<'a>(cid: &'a str, scope: &'a str) -> NewFileRecord<'a> {
    NewFileRecord {
        cid,
        name: "object.bin",
        size: 2048,
        mime_type: Some("application/octet-stream"),
        scope,
        object_type: "file",
    }
}

#[tokio::test]
async fn test_store_uses_wal_journal() {
    let (store, _dir) = setup_test_store().await;
    assert!(store.database().is_wal_enabled().await.expect("pragma"));
}

#[tokio::test]
async fn test_append_is_idempotent_per_identifier() {
    let (store, _dir) = setup_test_store().await;

    assert!(store.append(&new_record("bafy1", "public")).await.expect("append"));
    assert!(!store.append(&new_record("bafy1", "private")).await.expect("append"));

    assert_eq!(store.count().await.expect("count"), 1);
    let record = store.get("bafy1").await.expect("get").expect("present");
    assert_eq!(record.scope, "public", "first sighting wins");
    assert!(!record.tested);
    assert!(record.outcome_is_consistent());
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let path = dir.path().join("records.db");

    {
        let store = RecordStore::new(Database::new(&path).await.expect("open"));
        store.append(&new_record("bafy1", "public")).await.expect("append");
        store
            .mark_tested(
                "bafy1",
                &TestOutcome::Failed {
                    message: "HTTP 404 Not Found".to_string(),
                    category: ErrorCategory::NotFound,
                    attempts: 3,
                },
            )
            .await
            .expect("mark");
        store.database().clone().close().await;
    }

    let store = RecordStore::new(Database::new(&path).await.expect("reopen"));
    let record = store.get("bafy1").await.expect("get").expect("present");
    assert!(record.tested);
    assert_eq!(record.is_downloadable, Some(false));
    assert_eq!(record.error_type(), Some(ErrorCategory::NotFound));
    assert_eq!(record.attempts, Some(3));
    assert!(record.tested_at.is_some());
}

#[tokio::test]
async fn test_mark_tested_only_once() {
    let (store, _dir) = setup_test_store().await;
    store.append(&new_record("bafy1", "public")).await.expect("append");

    let ok = TestOutcome::Downloadable {
        content_kind: ContentKind::Binary,
        bytes_read: 2048,
        attempts: 1,
    };
    store.mark_tested("bafy1", &ok).await.expect("first mark");

    let again = store.mark_tested("bafy1", &ok).await;
    assert!(matches!(again, Err(StoreError::AlreadyTested(ref cid)) if cid == "bafy1"));

    let missing = store.mark_tested("nope", &ok).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));

    let record = store.get("bafy1").await.expect("get").expect("present");
    assert_eq!(record.content_kind(), Some(ContentKind::Binary));
    assert_eq!(record.bytes_read, Some(2048));
    assert!(record.download_error.is_none());
}

#[tokio::test]
async fn test_untested_batches_page_in_identifier_order() {
    let (store, _dir) = setup_test_store().await;
    for cid in ["c", "a", "e", "b", "d"] {
        store.append(&new_record(cid, "public")).await.expect("append");
    }
    store
        .mark_tested(
            "b",
            &TestOutcome::Downloadable {
                content_kind: ContentKind::Text,
                bytes_read: 1,
                attempts: 1,
            },
        )
        .await
        .expect("mark");

    let first = store.untested_batch(None, 2).await.expect("batch");
    assert_eq!(first, vec!["a", "c"]);
    let second = store.untested_batch(Some("c"), 2).await.expect("batch");
    assert_eq!(second, vec!["d", "e"]);
    let third = store.untested_batch(Some("e"), 2).await.expect("batch");
    assert!(third.is_empty());
}

#[tokio::test]
async fn test_untested_ids_shrink_as_records_are_marked() {
    let (store, _dir) = setup_test_store().await;
    for (cid, scope) in [("d", "private"), ("a", "public"), ("c", "public"), ("b", "private")] {
        store.append(&new_record(cid, scope)).await.expect("append");
    }
    let all: Vec<String> = store.untested_ids().await.expect("ids").into_iter().collect();
    assert_eq!(all, vec!["a", "b", "c", "d"]);

    for cid in ["a", "d"] {
        store
            .mark_tested(
                cid,
                &TestOutcome::Failed {
                    message: "timeout".to_string(),
                    category: ErrorCategory::ServerIssue,
                    attempts: 2,
                },
            )
            .await
            .expect("mark");
    }

    let remaining: Vec<String> = store.untested_ids().await.expect("ids").into_iter().collect();
    assert_eq!(remaining, vec!["b", "c"]);
    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.untested, 2);
}

#[tokio::test]
async fn test_stats_partition_by_outcome_scope_and_category() {
    let (store, _dir) = setup_test_store().await;
    for (cid, scope) in [("a", "public"), ("b", "public"), ("c", "private"), ("d", "private")] {
        store.append(&new_record(cid, scope)).await.expect("append");
    }
    store
        .mark_tested(
            "a",
            &TestOutcome::Downloadable {
                content_kind: ContentKind::Text,
                bytes_read: 10,
                attempts: 1,
            },
        )
        .await
        .expect("mark");
    store
        .mark_tested(
            "c",
            &TestOutcome::Failed {
                message: "Cloudflare 524 timeout".to_string(),
                category: ErrorCategory::ServerIssue,
                attempts: 3,
            },
        )
        .await
        .expect("mark");

    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.total, 4);
    assert_eq!(stats.tested, 2);
    assert_eq!(stats.untested, 2);
    assert_eq!(stats.downloadable, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.tested, stats.downloadable + stats.failed);
    assert_eq!(stats.scope_count("public"), 2);
    assert_eq!(stats.scope_count("private"), 2);
    assert_eq!(stats.by_error.get("server_issue"), Some(&1));
}

#[tokio::test]
async fn test_concurrent_marks_from_clones_are_serialized() {
    let (store, _dir) = setup_test_store().await;
    let cids: Vec<String> = (0..40).map(|i| format!("cid-{i:02}")).collect();
    for cid in &cids {
        store.append(&new_record(cid, "public")).await.expect("append");
    }

    let mut handles = Vec::new();
    for cid in cids.clone() {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .mark_tested(
                    &cid,
                    &TestOutcome::Downloadable {
                        content_kind: ContentKind::Text,
                        bytes_read: 1,
                        attempts: 1,
                    },
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("mark");
    }

    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.tested, 40);
    assert_eq!(stats.untested, 0);
}
