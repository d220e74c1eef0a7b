//! Session summaries reconstructed from the journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{SessionEvent, SessionEventType};
use super::session::SessionStatus;

/// What the journal says about one past session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub saved_at: Option<DateTime<Utc>>,

    /// Questions and re-prompts issued
    pub prompts: u32,

    /// Failed adapter rounds (transcription, extraction, persistence)
    pub failures: u32,

    /// Last error seen, if any
    pub last_error: Option<String>,
}

impl SessionSummary {
    /// Reconstruct a summary by replaying events in order
    pub fn from_events(events: &[SessionEvent]) -> Option<Self> {
        let first = events.first()?;

        let mut summary = Self {
            session_id: first.session_id,
            status: SessionStatus::Collecting,
            started_at: first.timestamp,
            completed_at: None,
            saved_at: None,
            prompts: 0,
            failures: 0,
            last_error: None,
        };

        for event in events {
            summary.apply_event(event);
        }

        Some(summary)
    }

    /// Apply a single event
    pub fn apply_event(&mut self, event: &SessionEvent) {
        self.status = event.status;

        match event.event_type {
            SessionEventType::SessionStarted => {
                self.started_at = event.timestamp;
            }
            SessionEventType::QuestionAsked
            | SessionEventType::ExtractionRejected
            | SessionEventType::RestartRequired => {
                self.prompts += 1;
            }
            SessionEventType::RecordCompleted => {
                self.completed_at = Some(event.timestamp);
            }
            SessionEventType::RecordSaved => {
                self.saved_at = Some(event.timestamp);
            }
            SessionEventType::TranscriptionFailed
            | SessionEventType::ExtractionFailed
            | SessionEventType::SaveFailed => {
                self.failures += 1;
            }
            SessionEventType::SessionReset => {}
        }

        if let Some(ref error) = event.error {
            self.last_error = Some(error.clone());
        }
    }

    pub fn is_saved(&self) -> bool {
        self.status == SessionStatus::Saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_events() {
        let id = Uuid::new_v4();
        let events = vec![
            SessionEvent::new(id, SessionEventType::SessionStarted, "started", SessionStatus::Collecting),
            SessionEvent::new(id, SessionEventType::QuestionAsked, "asked", SessionStatus::Collecting),
            SessionEvent::new(
                id,
                SessionEventType::RecordCompleted,
                "completed",
                SessionStatus::AwaitingConfirmation,
            ),
            SessionEvent::new(
                id,
                SessionEventType::SaveFailed,
                "save failed",
                SessionStatus::AwaitingConfirmation,
            )
            .with_error("disk full"),
            SessionEvent::new(id, SessionEventType::RecordSaved, "saved", SessionStatus::Saved),
        ];

        let summary = SessionSummary::from_events(&events).unwrap();
        assert_eq!(summary.session_id, id);
        assert!(summary.is_saved());
        assert_eq!(summary.prompts, 1);
        assert_eq!(summary.failures, 1);
        assert!(summary.completed_at.is_some());
        assert!(summary.saved_at.is_some());
        assert_eq!(summary.last_error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_summary_of_nothing() {
        assert!(SessionSummary::from_events(&[]).is_none());
    }
}
