//! Scripted adapters shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Barrier, Notify};

use voxreg::adapters::{
    parse_reply, ExtractionError, PassthroughTranscriber, PersistenceError, TranscriptionError,
};
use voxreg::domain::RecordRow;
use voxreg::{Extraction, Extractor, RecordSink, SessionEngine, Transcriber, Turn};

/// Reply that completes Jane Doe's record
pub fn jane_doe_reply() -> String {
    json!({
        "record": {
            "name": "Jane Doe",
            "household_members": 3,
            "address": "123 Main St, Anytown, USA",
            "phone": "555-123-4567"
        }
    })
    .to_string()
}

pub fn question_reply(question: &str) -> String {
    json!({ "question": question }).to_string()
}

/// Passthrough transcriber that counts calls
#[derive(Default)]
pub struct CountingTranscriber {
    pub calls: AtomicUsize,
}

impl CountingTranscriber {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for CountingTranscriber {
    fn name(&self) -> &str {
        "counting"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PassthroughTranscriber.transcribe(audio, language_hint).await
    }
}

/// Always fails
pub struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    fn name(&self) -> &str {
        "failing"
    }

    async fn transcribe(
        &self,
        _audio: &[u8],
        _language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::Request("service unavailable".to_string()))
    }
}

/// Signals `entered`, then waits for `release`
#[derive(Default)]
pub struct GatedTranscriber {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl Transcriber for GatedTranscriber {
    fn name(&self) -> &str {
        "gated"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        self.entered.notify_one();
        self.release.notified().await;
        PassthroughTranscriber.transcribe(audio, language_hint).await
    }
}

/// Only returns once `n` transcriptions are in flight at the same time
pub struct BarrierTranscriber {
    barrier: Barrier,
}

impl BarrierTranscriber {
    pub fn new(n: usize) -> Self {
        Self {
            barrier: Barrier::new(n),
        }
    }
}

#[async_trait]
impl Transcriber for BarrierTranscriber {
    fn name(&self) -> &str {
        "barrier"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        self.barrier.wait().await;
        PassthroughTranscriber.transcribe(audio, language_hint).await
    }
}

pub enum Step {
    /// Raw model output, parsed like the real extractor does
    Reply(String),
    Fail(String),
    Hang,
}

/// Extractor that plays back a script, one step per call
#[derive(Default)]
pub struct ScriptedExtractor {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Vec<Turn>>>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    pub fn replies(replies: &[String]) -> Self {
        Self::new(replies.iter().cloned().map(Step::Reply).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories passed to each call
    pub fn seen(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(
        &self,
        history: &[Turn],
        _latest_utterance: &str,
    ) -> Result<Extraction, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(history.to_vec());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Fail("script exhausted".to_string()));

        match step {
            Step::Reply(raw) => Ok(parse_reply(&raw)),
            Step::Fail(msg) => Err(ExtractionError::Request(msg)),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// In-memory sink that can be told to fail the next `n` appends
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<RecordRow>>,
    failures_left: AtomicUsize,
}

impl MemorySink {
    pub fn failing(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<RecordRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_header(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn append(&self, row: &RecordRow) -> Result<(), PersistenceError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(PersistenceError::Storage("sheet unavailable".to_string()));
        }
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }
}

/// Engine over the given doubles
pub fn engine(
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<ScriptedExtractor>,
    sink: Arc<MemorySink>,
) -> SessionEngine {
    SessionEngine::new(transcriber, extractor, sink)
}
