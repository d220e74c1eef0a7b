//! Session Journal Integration Tests
//!
//! JSONL format, reset journaling and session listing.

mod common;

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use common::{jane_doe_reply, CountingTranscriber, FailingTranscriber, MemorySink, ScriptedExtractor};
use voxreg::core::SessionLog;
use voxreg::domain::{SessionEvent, SessionEventType};
use voxreg::{SessionEngine, SessionStatus};

#[tokio::test]
async fn test_event_jsonl_format() {
    let temp_dir = TempDir::new().unwrap();
    let log = SessionLog::open(temp_dir.path()).await.unwrap();
    let id = Uuid::new_v4();

    log.append(
        &SessionEvent::new(
            id,
            SessionEventType::SaveFailed,
            "Save failed, awaiting retry",
            SessionStatus::AwaitingConfirmation,
        )
        .with_duration(42)
        .with_error("disk full"),
    )
    .await
    .unwrap();

    let raw = tokio::fs::read_to_string(log.events_path(id)).await.unwrap();
    assert_eq!(raw.lines().count(), 1);

    let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(value["session_id"], id.to_string());
    assert_eq!(value["event_type"], "save_failed");
    assert_eq!(value["status"], "awaiting_confirmation");
    assert_eq!(value["duration_ms"], 42);
    assert_eq!(value["error"], "disk full");
}

#[tokio::test]
async fn test_reset_is_journaled_on_both_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let log = SessionLog::open(temp_dir.path()).await.unwrap();
    let engine = SessionEngine::new(
        Arc::new(CountingTranscriber::default()),
        Arc::new(ScriptedExtractor::default()),
        Arc::new(MemorySink::default()),
    )
    .with_log(log.clone());

    let handle = engine.start_session().await;
    let old_id = handle.snapshot().unwrap().id;
    let new_id = engine.reset(&handle).await.unwrap().id;

    let old = log.summary(old_id).await.unwrap().unwrap();
    assert_eq!(old.status, SessionStatus::Reset);

    let new_events = log.replay(new_id).await.unwrap();
    assert_eq!(new_events.len(), 1);
    assert_eq!(new_events[0].event_type, SessionEventType::SessionStarted);
    assert!(new_events[0].summary.contains(&old_id.to_string()));
}

#[tokio::test]
async fn test_failures_are_counted_in_summary() {
    let temp_dir = TempDir::new().unwrap();
    let log = SessionLog::open(temp_dir.path()).await.unwrap();
    let engine = SessionEngine::new(
        Arc::new(FailingTranscriber),
        Arc::new(ScriptedExtractor::replies(&[jane_doe_reply()])),
        Arc::new(MemorySink::default()),
    )
    .with_log(log.clone());

    let handle = engine.start_session().await;
    let id = handle.snapshot().unwrap().id;
    engine.submit_utterance(&handle, b"audio").await.unwrap();
    engine.submit_utterance(&handle, b"audio").await.unwrap();

    let summary = log.summary(id).await.unwrap().unwrap();
    assert_eq!(summary.failures, 2);
    assert_eq!(summary.status, SessionStatus::Collecting);
    assert!(summary
        .last_error
        .as_deref()
        .unwrap_or_default()
        .contains("service unavailable"));
}

#[tokio::test]
async fn test_recent_lists_newest_first() {
    let temp_dir = TempDir::new().unwrap();
    let log = SessionLog::open(temp_dir.path()).await.unwrap();
    let engine = SessionEngine::new(
        Arc::new(CountingTranscriber::default()),
        Arc::new(ScriptedExtractor::default()),
        Arc::new(MemorySink::default()),
    )
    .with_log(log.clone());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let handle = engine.start_session().await;
        ids.push(handle.snapshot().unwrap().id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let recent = log.recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].session_id, ids[2]);
    assert_eq!(recent[1].session_id, ids[1]);
}
