//! Persistence Integration Tests
//!
//! Header handling and row layout of the sheet and SQLite sinks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use fs2::FileExt;
use tempfile::TempDir;
use uuid::Uuid;

use common::{jane_doe_reply, CountingTranscriber, ScriptedExtractor};
use voxreg::adapters::sheet::header_line;
use voxreg::adapters::{SheetSink, SqliteSink};
use voxreg::config::LimitSettings;
use voxreg::core::generate_save_key;
use voxreg::domain::{ClientRecord, RecordRow};
use voxreg::{RecordSink, SessionEngine};

fn row(name: &str, address: &str) -> RecordRow {
    let record = ClientRecord {
        name: name.to_string(),
        household_members: 3,
        address: address.to_string(),
        phone: "555-123-4567".to_string(),
    };
    RecordRow {
        save_key: generate_save_key(Uuid::new_v4(), &record),
        record,
        completed_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 59, 30).unwrap(),
        saved_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_sheet_header_written_once() {
    let temp_dir = TempDir::new().unwrap();
    let sink = SheetSink::new(temp_dir.path().join("out").join("registrations.csv"));

    sink.ensure_header().await.unwrap();
    sink.ensure_header().await.unwrap();
    sink.append(&row("Jane Doe", "12 Elm St")).await.unwrap();

    let lines = sink.read_lines().await.unwrap();
    assert_eq!(
        lines,
        vec![
            "Name,Household Members,Address,Phone,Timestamp".to_string(),
            "Jane Doe,3,12 Elm St,555-123-4567,2024-05-01 10:00:00".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_sheet_append_creates_header() {
    let temp_dir = TempDir::new().unwrap();
    let sink = SheetSink::new(temp_dir.path().join("registrations.csv"));

    sink.append(&row("Jane Doe", "123 Main St, Anytown, USA"))
        .await
        .unwrap();
    sink.append(&row("John Roe", "9 Oak Ave")).await.unwrap();

    let lines = sink.read_lines().await.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], header_line());
    assert_eq!(
        lines[1],
        "Jane Doe,3,\"123 Main St, Anytown, USA\",555-123-4567,2024-05-01 10:00:00"
    );
    assert!(lines[2].starts_with("John Roe,"));
}

#[tokio::test]
async fn test_sheet_header_mismatch_is_rewritten() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("registrations.csv");
    tokio::fs::write(&path, "Client,Size\nOld Row,2,1 Way,555,2023-01-01 00:00:00\n")
        .await
        .unwrap();

    let sink = SheetSink::new(&path);
    sink.ensure_header().await.unwrap();

    let lines = sink.read_lines().await.unwrap();
    assert_eq!(lines[0], header_line());
    assert_eq!(lines[1], "Old Row,2,1 Way,555,2023-01-01 00:00:00");
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn test_sheet_skips_repeated_save_key() {
    let temp_dir = TempDir::new().unwrap();
    let sink = SheetSink::new(temp_dir.path().join("registrations.csv"));

    let jane = row("Jane Doe", "12 Elm St");
    sink.append(&jane).await.unwrap();
    sink.append(&jane).await.unwrap();

    let lines = sink.read_lines().await.unwrap();
    assert_eq!(lines.len(), 2);

    let keys = tokio::fs::read_to_string(sink.keys_path()).await.unwrap();
    assert_eq!(keys.lines().collect::<Vec<_>>(), vec![jane.save_key.as_str()]);
}

#[tokio::test]
async fn test_sheet_header_rechecked_on_every_append() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("registrations.csv");
    let sink = SheetSink::new(&path);

    sink.append(&row("Jane Doe", "12 Elm St")).await.unwrap();

    // Another process truncates the sheet
    tokio::fs::write(&path, "").await.unwrap();
    sink.append(&row("John Roe", "9 Oak Ave")).await.unwrap();

    let lines = sink.read_lines().await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], header_line());
    assert!(lines[1].starts_with("John Roe,"));

    // ...or replaces the header and drops the trailing newline
    tokio::fs::write(&path, "Client,Size\nJohn Roe,3,9 Oak Ave,555-123-4567,2024-05-01 10:00:00")
        .await
        .unwrap();
    sink.append(&row("Ann Poe", "1 Pine Rd")).await.unwrap();

    let lines = sink.read_lines().await.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], header_line());
    assert!(lines[1].starts_with("John Roe,"));
    assert!(lines[2].starts_with("Ann Poe,"));
}

#[tokio::test]
async fn test_timed_out_sheet_save_then_retry_writes_one_row() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("registrations.csv");
    let sink = Arc::new(SheetSink::new(&path));
    sink.ensure_header().await.unwrap();

    let engine = SessionEngine::new(
        Arc::new(CountingTranscriber::default()),
        Arc::new(ScriptedExtractor::replies(&[jane_doe_reply()])),
        sink.clone(),
    )
    .with_limits(LimitSettings {
        persistence_timeout_seconds: 1,
        ..Default::default()
    });
    let handle = engine.start_session().await;
    engine.submit_utterance(&handle, b"Jane Doe").await.unwrap();

    // Another interview process holds the sheet
    let holder = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .unwrap();
    holder.lock_exclusive().unwrap();

    let first = engine.confirm_save(&handle).await.unwrap();
    assert_eq!(first.kind(), "persistence_failed");

    drop(holder);

    let second = engine.confirm_save(&handle).await.unwrap();
    assert_eq!(second.kind(), "saved");

    // The timed-out write is still queued behind the lock; let it run
    tokio::time::sleep(Duration::from_millis(500)).await;

    let lines = sink.read_lines().await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], header_line());
    assert!(lines[1].starts_with("Jane Doe,3,\"123 Main St, Anytown, USA\",555-123-4567,"));
}

#[tokio::test]
async fn test_sqlite_duplicate_save_key_is_ignored() {
    let sink = SqliteSink::open_in_memory().unwrap();
    sink.ensure_header().await.unwrap();

    let jane = row("Jane Doe", "12 Elm St");
    sink.append(&jane).await.unwrap();
    sink.append(&jane).await.unwrap();
    assert_eq!(sink.count().await.unwrap(), 1);

    sink.append(&row("John Roe", "9 Oak Ave")).await.unwrap();
    assert_eq!(sink.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_sqlite_file_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("db").join("registrations.db");

    {
        let sink = SqliteSink::open(&path).unwrap();
        sink.append(&row("Jane Doe", "12 Elm St")).await.unwrap();
    }

    let sink = SqliteSink::open(&path).unwrap();
    sink.ensure_header().await.unwrap();
    assert_eq!(sink.count().await.unwrap(), 1);
}
