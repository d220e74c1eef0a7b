//! Core interview logic.
//!
//! This module contains:
//! - SessionEngine: the slot-filling state machine
//! - Validator: candidate → validated record
//! - SessionLog: append-only journal of session events

pub mod engine;
pub mod session_log;
pub mod validator;

// Re-export commonly used types
pub use engine::{
    EngineError, SessionEngine, SessionHandle, EXTRACTION_RETRY_PROMPT, GREETING, RESTART_PROMPT,
    TRANSCRIPTION_RETRY_PROMPT,
};
pub use session_log::{generate_save_key, hash_input, SessionLog};
pub use validator::{valid_fields, validate, validate_field, FieldError};
