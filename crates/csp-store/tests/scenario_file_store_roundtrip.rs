//! Scenario: File Checkout Store
//!
//! # Invariants under test
//!
//! 1. A missing file reads as `None` (first run).
//! 2. Write then read returns the same checkout.
//! 3. A record missing a field, or with a bad count, reads as an error.
//! 4. Writes replace the file atomically and leave no temp file behind.
//! 5. `write_atomic`, shared with the output sink, creates missing parent
//!    directories and overwrites existing content.

use chrono::{TimeZone, Utc};
use csp_reconcile::{CheckoutStateStore, CollaboratorError};
use csp_schemas::CheckoutInfo;
use csp_store::{write_atomic, FileStateStore};

fn info(token: &str, n: u32) -> CheckoutInfo {
    CheckoutInfo {
        consumption_token: token.to_string(),
        entitled_licenses: n,
        expiry: Utc.with_ymd_and_hms(2026, 10, 18, 12, 30, 0).unwrap(),
    }
}

#[tokio::test]
async fn missing_file_is_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path(), "csp-adapter-cache");
    assert_eq!(store.read().await.unwrap(), None);
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path().join("nested"), "csp-adapter-cache");

    store.write(&info("tok-1", 2)).await.unwrap();
    assert_eq!(store.read().await.unwrap(), Some(info("tok-1", 2)));

    store.write(&info("tok-2", 3)).await.unwrap();
    assert_eq!(store.read().await.unwrap(), Some(info("tok-2", 3)));

    let names: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["csp-adapter-cache.json".to_string()]);
}

#[tokio::test]
async fn cleared_checkout_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path(), "cache");

    store.write(&CheckoutInfo::empty()).await.unwrap();
    let back = store.read().await.unwrap().unwrap();
    assert!(!back.has_token());
    assert_eq!(back.entitled_licenses, 0);
}

#[tokio::test]
async fn partial_record_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path(), "cache");
    std::fs::write(
        store.path(),
        r#"{"consumptionToken":"tok","expiry":"2026-10-18T12:30:00Z"}"#,
    )
    .unwrap();

    let err = store.read().await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Decode(_)));
    assert!(err.to_string().contains("entitledNodes"));
}

#[tokio::test]
async fn bad_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path(), "cache");
    std::fs::write(
        store.path(),
        r#"{"consumptionToken":"tok","entitledNodes":"many","expiry":"2026-10-18T12:30:00Z"}"#,
    )
    .unwrap();

    assert!(store.read().await.is_err());
}

#[tokio::test]
async fn non_json_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path(), "cache");
    std::fs::write(store.path(), "not json").unwrap();

    assert!(matches!(
        store.read().await.unwrap_err(),
        CollaboratorError::Decode(_)
    ));
}

#[tokio::test]
async fn write_atomic_creates_parents_and_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("report.json");

    write_atomic(&path, b"first\n").await.unwrap();
    write_atomic(&path, b"second\n").await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["report.json".to_string()]);
}
