//! Interview session state.
//!
//! A Session is one registration interview. It is only mutated by the
//! session engine; everything here is plain data plus read helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{ClientRecord, FieldSlots};
use super::turn::History;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Gathering fields turn by turn
    Collecting,

    /// All fields valid, waiting for the user to confirm the save
    AwaitingConfirmation,

    /// Record persisted (terminal until reset)
    Saved,

    /// Discarded in favour of a fresh session
    Reset,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Collecting
    }
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Collecting => "collecting",
            SessionStatus::AwaitingConfirmation => "awaiting_confirmation",
            SessionStatus::Saved => "saved",
            SessionStatus::Reset => "reset",
        }
    }
}

/// One registration interview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier (a reset always produces a new one)
    pub id: Uuid,

    /// Conversation so far
    pub history: History,

    /// Validated field values
    pub fields: FieldSlots,

    pub status: SessionStatus,

    pub created_at: DateTime<Utc>,

    /// Set once, when all fields validated
    pub completed_at: Option<DateTime<Utc>>,

    /// Set once, when the record was persisted
    pub saved_at: Option<DateTime<Utc>>,

    /// Consecutive malformed or invalid extractions
    pub malformed_streak: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: History::new(),
            fields: FieldSlots::default(),
            status: SessionStatus::Collecting,
            created_at: Utc::now(),
            completed_at: None,
            saved_at: None,
            malformed_streak: 0,
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.status == SessionStatus::Collecting
    }

    /// The completed record, once the session has one
    pub fn record(&self) -> Option<ClientRecord> {
        match self.status {
            SessionStatus::AwaitingConfirmation | SessionStatus::Saved => self.fields.to_record(),
            _ => None,
        }
    }
}
