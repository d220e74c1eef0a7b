//! Registration record types.
//!
//! A record is built up slot by slot during an interview (`FieldSlots`),
//! becomes a `ClientRecord` once every slot holds a validated value, and is
//! written out as a `RecordRow` with a fixed column order.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column headers of the registration sheet, in order
pub const SHEET_HEADERS: [&str; 5] = ["Name", "Household Members", "Address", "Phone", "Timestamp"];

/// Format of the Timestamp column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One of the four required registration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    HouseholdMembers,
    Address,
    Phone,
}

impl Field {
    /// All fields, in validation and column order
    pub const ALL: [Field; 4] = [
        Field::Name,
        Field::HouseholdMembers,
        Field::Address,
        Field::Phone,
    ];

    /// JSON key used in extraction candidates
    pub fn key(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::HouseholdMembers => "household_members",
            Field::Address => "address",
            Field::Phone => "phone",
        }
    }

    /// Sheet column header
    pub fn column(&self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::HouseholdMembers => "Household Members",
            Field::Address => "Address",
            Field::Phone => "Phone",
        }
    }

    /// Human wording used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            Field::Name => "full name",
            Field::HouseholdMembers => "household size",
            Field::Address => "address",
            Field::Phone => "phone number",
        }
    }

    /// Follow-up question asking for this field
    pub fn question(&self) -> &'static str {
        match self {
            Field::Name => "Could you please tell me the client's full name?",
            Field::HouseholdMembers => {
                "How many people are in the household, including the client?"
            }
            Field::Address => "What is the client's home address?",
            Field::Phone => "What is the best phone number to reach the client?",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A validated value for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Count(u32),
}

/// A complete, validated registration record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    pub household_members: u32,
    pub address: String,
    pub phone: String,
}

impl ClientRecord {
    /// Value of a field rendered as text
    pub fn value_of(&self, field: Field) -> String {
        match field {
            Field::Name => self.name.clone(),
            Field::HouseholdMembers => self.household_members.to_string(),
            Field::Address => self.address.clone(),
            Field::Phone => self.phone.clone(),
        }
    }
}

/// Partially filled record. Each slot is either empty or validated.
///
/// Slots only drive re-prompts and the status table. Completion never merges
/// them: a candidate must carry all four fields, and a complete candidate
/// overwrites every slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlots {
    pub name: Option<String>,
    pub household_members: Option<u32>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl FieldSlots {
    /// Fill a slot with a validated value. Mismatched value kinds are ignored.
    pub fn fill(&mut self, field: Field, value: FieldValue) {
        match (field, value) {
            (Field::Name, FieldValue::Text(v)) => self.name = Some(v),
            (Field::HouseholdMembers, FieldValue::Count(n)) => self.household_members = Some(n),
            (Field::Address, FieldValue::Text(v)) => self.address = Some(v),
            (Field::Phone, FieldValue::Text(v)) => self.phone = Some(v),
            _ => {}
        }
    }

    pub fn is_filled(&self, field: Field) -> bool {
        match field {
            Field::Name => self.name.is_some(),
            Field::HouseholdMembers => self.household_members.is_some(),
            Field::Address => self.address.is_some(),
            Field::Phone => self.phone.is_some(),
        }
    }

    /// Fields still empty, in order
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| !self.is_filled(*f))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.missing().len() == Field::ALL.len()
    }

    /// The full record, if every slot is filled
    pub fn to_record(&self) -> Option<ClientRecord> {
        Some(ClientRecord {
            name: self.name.clone()?,
            household_members: self.household_members?,
            address: self.address.clone()?,
            phone: self.phone.clone()?,
        })
    }

    pub fn set_record(&mut self, record: &ClientRecord) {
        self.name = Some(record.name.clone());
        self.household_members = Some(record.household_members);
        self.address = Some(record.address.clone());
        self.phone = Some(record.phone.clone());
    }

    /// Rows for the review table, `N/A` for empty slots
    pub fn table_rows(&self) -> Vec<(String, String)> {
        let text = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
        vec![
            ("Name".to_string(), text(&self.name)),
            (
                "Household Members".to_string(),
                self.household_members
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
            ),
            ("Address".to_string(), text(&self.address)),
            ("Phone".to_string(), text(&self.phone)),
            ("Timestamp".to_string(), "N/A".to_string()),
        ]
    }
}

/// A record ready to be appended to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub record: ClientRecord,

    /// When the interview produced a valid record
    pub completed_at: DateTime<Utc>,

    /// When the save was requested (the Timestamp column)
    pub saved_at: DateTime<Utc>,

    /// Deterministic key for exactly-once storage: "{session_id}:{record_hash}"
    pub save_key: String,
}

impl RecordRow {
    /// Cells in `SHEET_HEADERS` order
    pub fn cells(&self) -> [String; 5] {
        [
            self.record.name.clone(),
            self.record.household_members.to_string(),
            self.record.address.clone(),
            self.record.phone.clone(),
            self.saved_at.format(TIMESTAMP_FORMAT).to_string(),
        ]
    }

    pub fn table_rows(&self) -> Vec<(String, String)> {
        SHEET_HEADERS
            .iter()
            .zip(self.cells())
            .map(|(h, v)| (h.to_string(), v))
            .collect()
    }
}

/// Render `(field, value)` pairs as a fixed-width text table
pub fn render_table(rows: &[(String, String)]) -> String {
    let key_width = rows
        .iter()
        .map(|(k, _)| k.chars().count())
        .max()
        .unwrap_or(0)
        .max("Field".len());
    let value_width = rows
        .iter()
        .map(|(_, v)| v.chars().count())
        .max()
        .unwrap_or(0)
        .max("Value".len());

    let separator = format!("+-{}-+-{}-+", "-".repeat(key_width), "-".repeat(value_width));
    let line = |k: &str, v: &str| format!("| {:<kw$} | {:<vw$} |", k, v, kw = key_width, vw = value_width);

    let mut lines = vec![separator.clone(), line("Field", "Value"), separator.clone()];
    for (k, v) in rows {
        lines.push(line(k, v));
    }
    lines.push(separator);
    lines.join("\n")
}
