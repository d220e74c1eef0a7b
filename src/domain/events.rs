//! Session events for the interview journal.
//!
//! Every state change of a session is recorded as an immutable event in an
//! append-only log. Events carry summaries only: transcript text and field
//! values never go into the journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::SessionStatus;

/// A single event in a session's journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The session this event belongs to
    pub session_id: Uuid,

    /// Type of event
    pub event_type: SessionEventType,

    /// Human-readable summary (NO personal data)
    pub summary: String,

    /// Session status after the event
    pub status: SessionStatus,

    /// Time spent in adapter calls, in milliseconds
    pub duration_ms: Option<u64>,

    /// Error message if something failed
    pub error: Option<String>,
}

impl SessionEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        session_id: Uuid,
        event_type: SessionEventType,
        summary: impl Into<String>,
        status: SessionStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session_id,
            event_type,
            summary: summary.into(),
            status,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Types of events that can occur during an interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventType {
    /// A new interview began
    SessionStarted,

    /// Transcription failed or produced no text
    TranscriptionFailed,

    /// The extractor asked a clarifying question
    QuestionAsked,

    /// The extractor call failed outright or timed out
    ExtractionFailed,

    /// The extractor output was unparsable or failed validation
    ExtractionRejected,

    /// Too many rejected extractions in a row
    RestartRequired,

    /// All fields validated, waiting for confirmation
    RecordCompleted,

    /// Record persisted
    RecordSaved,

    /// Persistence failed (retryable)
    SaveFailed,

    /// Session discarded for a fresh one
    SessionReset,
}
