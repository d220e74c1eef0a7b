//! Domain types for voxreg.
//!
//! This module contains the core data structures:
//! - Turn/History: the append-only conversation
//! - Record: fields, validated records and storage rows
//! - Session: one interview and its status
//! - Outcome: what an engine call produced
//! - Events/Summary: the session journal

pub mod events;
pub mod outcome;
pub mod record;
pub mod session;
pub mod summary;
pub mod turn;

// Re-export commonly used types
pub use events::{SessionEvent, SessionEventType};
pub use outcome::{error_payload, Outcome};
pub use record::{
    render_table, ClientRecord, Field, FieldSlots, FieldValue, RecordRow, SHEET_HEADERS,
    TIMESTAMP_FORMAT,
};
pub use session::{Session, SessionStatus};
pub use summary::SessionSummary;
pub use turn::{render_transcript, History, Role, Turn};
