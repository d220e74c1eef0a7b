//! Field validation for extraction candidates.
//!
//! Pure functions: a candidate mapping either becomes a `ClientRecord` or
//! fails with the first offending field, checked in `Field::ALL` order.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{ClientRecord, Field, FieldValue};

/// Why a candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Missing field: {0}")]
    Missing(Field),

    #[error("Invalid value for {field}: {reason}")]
    InvalidType { field: Field, reason: String },
}

impl FieldError {
    pub fn field(&self) -> Field {
        match self {
            FieldError::Missing(field) => *field,
            FieldError::InvalidType { field, .. } => *field,
        }
    }

    /// Re-prompt asking the user for the offending field
    pub fn prompt(&self) -> String {
        let field = self.field();
        match self {
            FieldError::Missing(_) => field.question().to_string(),
            FieldError::InvalidType { .. } => format!(
                "Sorry, I didn't catch a valid {}. {}",
                field.label(),
                field.question()
            ),
        }
    }
}

/// Validate a complete candidate
pub fn validate(candidate: &Map<String, Value>) -> Result<ClientRecord, FieldError> {
    let raw = |field: Field| present(field, candidate.get(field.key()));

    Ok(ClientRecord {
        name: validate_text(Field::Name, raw(Field::Name)?)?,
        household_members: coerce_count(raw(Field::HouseholdMembers)?).map_err(|reason| {
            FieldError::InvalidType {
                field: Field::HouseholdMembers,
                reason,
            }
        })?,
        address: validate_text(Field::Address, raw(Field::Address)?)?,
        phone: validate_text(Field::Phone, raw(Field::Phone)?)?,
    })
}

/// Validate one field's raw value. `None` and JSON null are missing.
pub fn validate_field(field: Field, value: Option<&Value>) -> Result<FieldValue, FieldError> {
    let value = present(field, value)?;

    match field {
        Field::HouseholdMembers => coerce_count(value)
            .map(FieldValue::Count)
            .map_err(|reason| FieldError::InvalidType { field, reason }),
        Field::Name | Field::Address | Field::Phone => {
            validate_text(field, value).map(FieldValue::Text)
        }
    }
}

fn present(field: Field, value: Option<&Value>) -> Result<&Value, FieldError> {
    match value {
        None | Some(Value::Null) => Err(FieldError::Missing(field)),
        Some(v) => Ok(v),
    }
}

/// Non-empty text after trimming
fn validate_text(field: Field, value: &Value) -> Result<String, FieldError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::String(_) => Err(FieldError::Missing(field)),
        other => Err(FieldError::InvalidType {
            field,
            reason: format!("expected text, got {}", other),
        }),
    }
}

/// Household size: a positive integer, given as a number or numeric text
fn coerce_count(value: &Value) -> Result<u32, String> {
    let n: i64 = match value {
        Value::Number(num) => {
            if let Some(i) = num.as_i64() {
                i
            } else if let Some(f) = num.as_f64() {
                if f.fract() != 0.0 || !f.is_finite() {
                    return Err(format!("{} is not a whole number", f));
                }
                f as i64
            } else {
                return Err(format!("{} is out of range", num));
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("'{}' is not a number", s.trim()))?,
        other => return Err(format!("expected a number, got {}", other)),
    };

    if n <= 0 {
        return Err(format!("{} is not a positive count", n));
    }
    u32::try_from(n).map_err(|_| format!("{} is out of range", n))
}

/// Individually valid fields of a (possibly partial) candidate
pub fn valid_fields(candidate: &Map<String, Value>) -> Vec<(Field, FieldValue)> {
    Field::ALL
        .into_iter()
        .filter_map(|f| {
            validate_field(f, candidate.get(f.key()))
                .ok()
                .map(|v| (f, v))
        })
        .collect()
}
