//! Strict parsing of extractor replies.
//!
//! The model is asked to answer with exactly one JSON object:
//! `{"question": "..."}` or `{"record": {...}}`. A bare object carrying
//! record keys is also accepted as a record. Anything else is malformed.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::Extraction;
use crate::domain::Field;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Reply {
    Question(String),
    Record(Map<String, Value>),
}

/// Parse a raw model reply into an `Extraction`
pub fn parse_reply(raw: &str) -> Extraction {
    let text = raw.trim();

    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return malformed(raw, format!("reply is not valid JSON: {}", e)),
    };

    let object = match value {
        Value::Object(map) => map,
        other => {
            return malformed(
                raw,
                format!("expected a JSON object, got {}", json_kind(&other)),
            )
        }
    };

    match serde_json::from_value::<Reply>(Value::Object(object.clone())) {
        Ok(Reply::Question(q)) if q.trim().is_empty() => malformed(raw, "empty question"),
        Ok(Reply::Question(q)) => Extraction::Question(q.trim().to_string()),
        Ok(Reply::Record(record)) => Extraction::Candidate(record),
        Err(_) if Field::ALL.iter().any(|f| object.contains_key(f.key())) => {
            Extraction::Candidate(object)
        }
        Err(_) => malformed(raw, "object has neither a question nor a record"),
    }
}

fn malformed(raw: &str, reason: impl Into<String>) -> Extraction {
    Extraction::Malformed {
        raw: raw.to_string(),
        reason: reason.into(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_reply() {
        let extraction = parse_reply(r#"{"question": " What is the client's address? "}"#);
        assert_eq!(
            extraction,
            Extraction::Question("What is the client's address?".to_string())
        );
    }

    #[test]
    fn test_record_reply() {
        let extraction = parse_reply(
            r#"{"record": {"name": "Jane Doe", "household_members": 3, "address": "123 Main St", "phone": "555-123-4567"}}"#,
        );
        match extraction {
            Extraction::Candidate(map) => {
                assert_eq!(map["name"], "Jane Doe");
                assert_eq!(map["household_members"], 3);
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_record_object() {
        let extraction = parse_reply(r#"{"name": "Jane Doe"}"#);
        assert!(matches!(extraction, Extraction::Candidate(ref m) if m.len() == 1));
    }

    #[test]
    fn test_truncated_json_is_malformed() {
        let extraction = parse_reply(r#"{"name": "Jane Doe", "household_members": "#);
        assert!(matches!(extraction, Extraction::Malformed { .. }));
    }

    #[test]
    fn test_prose_is_malformed() {
        // No prefix sniffing: prose is not a question unless wrapped
        let extraction = parse_reply("What is your phone number?");
        assert!(matches!(extraction, Extraction::Malformed { .. }));
    }

    #[test]
    fn test_non_object_and_unknown_shapes() {
        assert!(matches!(parse_reply("[1, 2]"), Extraction::Malformed { .. }));
        assert!(matches!(parse_reply(r#"{"answer": 42}"#), Extraction::Malformed { .. }));
        assert!(matches!(parse_reply(r#"{"question": "  "}"#), Extraction::Malformed { .. }));
    }
}
