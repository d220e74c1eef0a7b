//! Results of engine calls and the payloads handed to presentation.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::record::ClientRecord;

/// What happened after an engine call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    /// Ask the user another question
    NeedsMoreInfo { prompt: String },

    /// Every field is valid; show the record for confirmation
    ReadyForReview { record: ClientRecord },

    /// The record was persisted
    Saved { save_key: String },

    /// Audio could not be turned into text; nothing changed
    TranscriptionFailed { prompt: String, reason: String },

    /// The extractor could not be reached; nothing changed
    ExtractionFailed { prompt: String, reason: String },

    /// Storage failed; the record is still awaiting confirmation
    PersistenceFailed { reason: String },

    /// Too many unusable extractions; the session must be reset
    RestartRequired { prompt: String },
}

impl Outcome {
    /// Stable name of the outcome
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::NeedsMoreInfo { .. } => "needs_more_info",
            Outcome::ReadyForReview { .. } => "ready_for_review",
            Outcome::Saved { .. } => "saved",
            Outcome::TranscriptionFailed { .. } => "transcription_failed",
            Outcome::ExtractionFailed { .. } => "extraction_failed",
            Outcome::PersistenceFailed { .. } => "persistence_failed",
            Outcome::RestartRequired { .. } => "restart_required",
        }
    }

    /// Text to show or speak next, if the outcome carries one
    pub fn prompt(&self) -> Option<&str> {
        match self {
            Outcome::NeedsMoreInfo { prompt }
            | Outcome::TranscriptionFailed { prompt, .. }
            | Outcome::ExtractionFailed { prompt, .. }
            | Outcome::RestartRequired { prompt } => Some(prompt),
            _ => None,
        }
    }

    /// Presentation payload for this outcome
    pub fn payload(&self) -> Value {
        match self {
            Outcome::NeedsMoreInfo { prompt } => json!({ "prompt_text": prompt }),
            Outcome::ReadyForReview { record } => json!({ "record": record }),
            Outcome::Saved { .. } => json!({ "saved": true }),
            Outcome::TranscriptionFailed { prompt, reason }
            | Outcome::ExtractionFailed { prompt, reason } => json!({
                "kind": self.kind(),
                "message": reason,
                "prompt_text": prompt,
            }),
            Outcome::PersistenceFailed { reason } => json!({
                "kind": self.kind(),
                "message": reason,
            }),
            Outcome::RestartRequired { prompt } => json!({
                "kind": self.kind(),
                "message": prompt,
            }),
        }
    }
}

/// Error payload for presentation
pub fn error_payload(kind: &str, message: &str) -> Value {
    json!({ "kind": kind, "message": message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shapes() {
        let ask = Outcome::NeedsMoreInfo {
            prompt: "What is your phone number?".to_string(),
        };
        assert_eq!(
            ask.payload(),
            json!({ "prompt_text": "What is your phone number?" })
        );

        let saved = Outcome::Saved {
            save_key: "abc".to_string(),
        };
        assert_eq!(saved.payload(), json!({ "saved": true }));

        let failed = Outcome::PersistenceFailed {
            reason: "sheet unavailable".to_string(),
        };
        assert_eq!(failed.payload()["kind"], "persistence_failed");
        assert_eq!(failed.payload()["message"], "sheet unavailable");
    }

    #[test]
    fn test_review_payload_carries_record() {
        let outcome = Outcome::ReadyForReview {
            record: ClientRecord {
                name: "Jane Doe".to_string(),
                household_members: 3,
                address: "123 Main St".to_string(),
                phone: "555-123-4567".to_string(),
            },
        };
        let payload = outcome.payload();
        assert_eq!(payload["record"]["household_members"], 3);
        assert_eq!(payload["record"]["name"], "Jane Doe");
        assert!(outcome.prompt().is_none());
    }
}
