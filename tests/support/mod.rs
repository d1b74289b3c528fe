//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod fakes;
pub mod socket_guard;

use autodrive_core::{Database, RecordStore};
use tempfile::TempDir;

/// Creates a file-backed record store in a fresh temp dir.
pub async fn setup_test_store() -> (RecordStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("records.db");

    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");

    (RecordStore::new(db), temp_dir)
}
