//! Adapter interfaces for external systems.
//!
//! The session engine talks to three kinds of collaborators:
//! - `Transcriber`: audio bytes to text (OpenAI, local whisper, text passthrough)
//! - `Extractor`: conversation to a question or a candidate record (OpenAI chat)
//! - `RecordSink`: durable storage for finished records (CSV sheet, SQLite)

pub mod audio;
pub mod openai;
pub mod passthrough;
pub mod reply;
pub mod sheet;
pub mod sqlite;
pub mod whisper;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{RecordRow, Turn};

pub use audio::AudioFormat;
pub use openai::{OpenAiClient, OpenAiExtractor, OpenAiTranscriber};
pub use passthrough::PassthroughTranscriber;
pub use reply::parse_reply;
pub use sheet::SheetSink;
pub use sqlite::SqliteSink;
pub use whisper::WhisperCliTranscriber;

/// What the extractor made of the conversation so far
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// One clarifying question for the user
    Question(String),

    /// A record the extractor believes is complete (not yet validated)
    Candidate(Map<String, Value>),

    /// Output that could not be interpreted
    Malformed { raw: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Audio is empty")]
    EmptyAudio,

    #[error("Transcript is empty")]
    EmptyTranscript,

    #[error("Audio too large: {actual} > {limit} bytes")]
    TooLarge { actual: usize, limit: usize },

    #[error("Transcription request failed: {0}")]
    Request(String),

    #[error("Transcriber process failed: {0}")]
    Process(String),

    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction request failed: {0}")]
    Request(String),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Persistence timed out after {0:?}")]
    Timeout(Duration),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        PersistenceError::Storage(e.to_string())
    }
}

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Turn audio into text
    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError>;
}

/// Language-model backend that reads the interview
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect the history (which already ends with the latest user turn)
    async fn extract(
        &self,
        history: &[Turn],
        latest_utterance: &str,
    ) -> Result<Extraction, ExtractionError>;
}

/// Durable storage for completed records
#[async_trait]
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    /// Make sure the header/schema exists and matches `SHEET_HEADERS`
    async fn ensure_header(&self) -> Result<(), PersistenceError>;

    /// Append one row
    async fn append(&self, row: &RecordRow) -> Result<(), PersistenceError>;
}
