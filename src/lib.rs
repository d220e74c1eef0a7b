//! voxreg - Voice-driven registration interviews
//!
//! Guides a user through a spoken interview, extracts four required fields
//! (name, household size, address, phone) with speech-to-text and a language
//! model, and stores one completed record per interview.
//!
//! # Architecture
//!
//! The heart is a slot-filling session engine:
//! - Each utterance is transcribed, then the whole conversation is handed to
//!   an extractor that either asks a question or proposes a record
//! - Proposed records are validated field by field before completion
//! - Sessions are explicit handles, so independent interviews run concurrently
//!   and one session never processes two utterances at once
//!
//! # Modules
//!
//! - `adapters`: External systems (OpenAI, whisper CLI, CSV sheet, SQLite)
//! - `core`: SessionEngine, field validation, session journal
//! - `domain`: Data structures (Session, Turn, ClientRecord, Outcome)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Interview from recorded audio files (one path per line)
//! voxreg interview
//!
//! # Typed interview, useful without a microphone
//! voxreg interview --text
//!
//! # Recent sessions
//! voxreg sessions
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{Extraction, Extractor, RecordSink, Transcriber};
pub use core::{EngineError, SessionEngine, SessionHandle};
pub use domain::{ClientRecord, Field, Outcome, Session, SessionStatus, Turn};
