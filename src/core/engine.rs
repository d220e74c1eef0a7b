//! Session engine for slot-filling interviews.
//!
//! Drives one utterance at a time through transcription and extraction,
//! decides between re-prompting and completion, and hands finished records
//! to storage. Every adapter call runs under a timeout, and session state is
//! only touched once a call has produced something the engine can interpret.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{
    Extraction, ExtractionError, Extractor, RecordSink, Transcriber, TranscriptionError,
};
use crate::config::LimitSettings;
use crate::domain::{
    error_payload, ClientRecord, Outcome, RecordRow, Session, SessionEvent, SessionEventType,
    SessionStatus, Turn,
};

use super::session_log::{generate_save_key, SessionLog};
use super::validator;

/// Opening prompt of every interview
pub const GREETING: &str =
    "Hello! I'm here to help with registration. Please tell me the client's full name to start.";

/// Re-prompt after a failed transcription
pub const TRANSCRIPTION_RETRY_PROMPT: &str = "I couldn't hear that. Please try again.";

/// Re-prompt after a failed extraction call
pub const EXTRACTION_RETRY_PROMPT: &str =
    "I'm having a little trouble. Could you please repeat that?";

/// Shown once too many extractions in a row were unusable
pub const RESTART_PROMPT: &str =
    "I'm having trouble understanding. Please restart the registration.";

const MALFORMED_PREFIX: &str = "Sorry, I didn't quite get that.";

/// Errors that reject a call without touching the session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Session is busy with another request")]
    SessionBusy,

    #[error("Cannot {action} while the session is {}", .status.as_str())]
    InvalidState {
        action: &'static str,
        status: SessionStatus,
    },
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::SessionBusy => "session_busy",
            EngineError::InvalidState { .. } => "invalid_state",
        }
    }

    /// Presentation payload `{kind, message}`
    pub fn payload(&self) -> serde_json::Value {
        error_payload(self.kind(), &self.to_string())
    }
}

/// Shared handle to one session.
///
/// Engine calls take the session exclusively for their whole duration; a
/// second call arriving meanwhile is rejected with `SessionBusy`.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Session>, EngineError> {
        self.inner.try_lock().map_err(|_| EngineError::SessionBusy)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Result<Session, EngineError> {
        Ok(self.acquire()?.clone())
    }
}

/// Slot-filling interview engine
pub struct SessionEngine {
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn RecordSink>,
    limits: LimitSettings,
    language: Option<String>,
    log: Option<SessionLog>,
}

impl SessionEngine {
    /// Create an engine with default limits and no journal
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            transcriber,
            extractor,
            sink,
            limits: LimitSettings::default(),
            language: None,
            log: None,
        }
    }

    pub fn with_limits(mut self, limits: LimitSettings) -> Self {
        self.limits = limits;
        self
    }

    /// Language hint passed to the transcriber
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Journal every state change to a session log
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn limits(&self) -> &LimitSettings {
        &self.limits
    }

    /// Begin a new interview
    pub async fn start_session(&self) -> SessionHandle {
        let session = Session::new();
        info!(session_id = %session.id, "Session started");
        self.record(SessionEvent::new(
            session.id,
            SessionEventType::SessionStarted,
            "Session started",
            SessionStatus::Collecting,
        ))
        .await;
        SessionHandle::new(session)
    }

    /// Process one spoken utterance
    #[instrument(skip(self, handle, audio), fields(audio_bytes = audio.len()))]
    pub async fn submit_utterance(
        &self,
        handle: &SessionHandle,
        audio: &[u8],
    ) -> Result<Outcome, EngineError> {
        let mut session = handle.acquire()?;

        if !session.is_collecting() {
            return Err(EngineError::InvalidState {
                action: "submit an utterance",
                status: session.status,
            });
        }

        if session.malformed_streak >= self.max_malformed() {
            debug!(session_id = %session.id, "Session needs a restart, skipping adapters");
            return Ok(Outcome::RestartRequired {
                prompt: RESTART_PROMPT.to_string(),
            });
        }

        // Transcription
        let started = Instant::now();
        let transcript = match self.transcribe(audio).await {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Transcription failed");
                self.record(
                    SessionEvent::new(
                        session.id,
                        SessionEventType::TranscriptionFailed,
                        "Transcription failed, history unchanged",
                        session.status,
                    )
                    .with_duration(elapsed_ms(started))
                    .with_error(e.to_string()),
                )
                .await;
                return Ok(Outcome::TranscriptionFailed {
                    prompt: TRANSCRIPTION_RETRY_PROMPT.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        debug!(session_id = %session.id, chars = transcript.len(), "Utterance transcribed");

        // Extraction runs against a copy; history is committed only on an
        // interpretable result
        let user_turn = Turn::user(transcript.clone());
        let mut context = session.history.turns().to_vec();
        context.push(user_turn.clone());

        let started = Instant::now();
        let extraction = match self.extract(&context, &transcript).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Extraction failed");
                self.record(
                    SessionEvent::new(
                        session.id,
                        SessionEventType::ExtractionFailed,
                        "Extraction failed, history unchanged",
                        session.status,
                    )
                    .with_duration(elapsed_ms(started))
                    .with_error(e.to_string()),
                )
                .await;
                return Ok(Outcome::ExtractionFailed {
                    prompt: EXTRACTION_RETRY_PROMPT.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let duration_ms = elapsed_ms(started);

        session.history.push(user_turn);

        let outcome = match extraction {
            Extraction::Question(question) => {
                session.malformed_streak = 0;
                session.history.push(Turn::assistant(question.clone()));
                self.record(
                    SessionEvent::new(
                        session.id,
                        SessionEventType::QuestionAsked,
                        format!("Asked a clarifying question (turn {})", session.history.len()),
                        session.status,
                    )
                    .with_duration(duration_ms),
                )
                .await;
                Outcome::NeedsMoreInfo { prompt: question }
            }
            Extraction::Candidate(candidate) => match validator::validate(&candidate) {
                Ok(record) => self.complete(&mut session, record, duration_ms).await,
                Err(field_error) => {
                    for (field, value) in validator::valid_fields(&candidate) {
                        session.fields.fill(field, value);
                    }
                    self.reject(&mut session, field_error.prompt(), field_error.to_string(), duration_ms)
                        .await
                }
            },
            Extraction::Malformed { reason, .. } => {
                let prompt = match session.fields.missing().first() {
                    Some(field) => format!("{} {}", MALFORMED_PREFIX, field.question()),
                    None => format!("{} Could you please repeat that?", MALFORMED_PREFIX),
                };
                self.reject(&mut session, prompt, reason, duration_ms).await
            }
        };

        Ok(outcome)
    }

    /// Persist the reviewed record
    #[instrument(skip(self, handle))]
    pub async fn confirm_save(&self, handle: &SessionHandle) -> Result<Outcome, EngineError> {
        let mut session = handle.acquire()?;

        let invalid = EngineError::InvalidState {
            action: "save",
            status: session.status,
        };
        if session.status != SessionStatus::AwaitingConfirmation {
            return Err(invalid);
        }
        let record = session.fields.to_record().ok_or(invalid)?;

        let save_key = generate_save_key(session.id, &record);
        let row = RecordRow {
            record,
            completed_at: session.completed_at.unwrap_or_else(Utc::now),
            saved_at: Utc::now(),
            save_key: save_key.clone(),
        };

        let started = Instant::now();
        let limit = self.limits.persistence_timeout();
        let result = match timeout(limit, self.sink.append(&row)).await {
            Ok(result) => result,
            Err(_) => Err(crate::adapters::PersistenceError::Timeout(limit)),
        };

        match result {
            Ok(()) => {
                session.status = SessionStatus::Saved;
                session.saved_at = Some(row.saved_at);
                info!(session_id = %session.id, sink = self.sink.name(), "Record saved");
                self.record(
                    SessionEvent::new(
                        session.id,
                        SessionEventType::RecordSaved,
                        format!("Record saved to {}", self.sink.name()),
                        session.status,
                    )
                    .with_duration(elapsed_ms(started)),
                )
                .await;
                Ok(Outcome::Saved { save_key })
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Save failed, record kept for retry");
                self.record(
                    SessionEvent::new(
                        session.id,
                        SessionEventType::SaveFailed,
                        "Save failed, awaiting retry",
                        session.status,
                    )
                    .with_duration(elapsed_ms(started))
                    .with_error(e.to_string()),
                )
                .await;
                Ok(Outcome::PersistenceFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Discard the session and start over; returns the fresh session
    #[instrument(skip(self, handle))]
    pub async fn reset(&self, handle: &SessionHandle) -> Result<Session, EngineError> {
        let mut session = handle.acquire()?;

        let mut old = std::mem::replace(&mut *session, Session::new());
        old.status = SessionStatus::Reset;
        info!(old_session = %old.id, new_session = %session.id, "Session reset");

        self.record(SessionEvent::new(
            old.id,
            SessionEventType::SessionReset,
            format!("Reset after {} turns, replaced by {}", old.history.len(), session.id),
            old.status,
        ))
        .await;
        self.record(SessionEvent::new(
            session.id,
            SessionEventType::SessionStarted,
            format!("Session started (replacing {})", old.id),
            session.status,
        ))
        .await;

        Ok(session.clone())
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }
        if audio.len() > self.limits.max_audio_bytes {
            return Err(TranscriptionError::TooLarge {
                actual: audio.len(),
                limit: self.limits.max_audio_bytes,
            });
        }

        let limit = self.limits.transcription_timeout();
        let text = timeout(
            limit,
            self.transcriber.transcribe(audio, self.language.as_deref()),
        )
        .await
        .map_err(|_| TranscriptionError::Timeout(limit))??;

        let text = text.trim();
        if text.is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }
        Ok(text.to_string())
    }

    async fn extract(
        &self,
        history: &[Turn],
        latest_utterance: &str,
    ) -> Result<Extraction, ExtractionError> {
        let limit = self.limits.extraction_timeout();
        timeout(limit, self.extractor.extract(history, latest_utterance))
            .await
            .map_err(|_| ExtractionError::Timeout(limit))?
    }

    async fn complete(
        &self,
        session: &mut Session,
        record: ClientRecord,
        duration_ms: u64,
    ) -> Outcome {
        session.fields.set_record(&record);
        if session.completed_at.is_none() {
            session.completed_at = Some(Utc::now());
        }
        session.status = SessionStatus::AwaitingConfirmation;
        session.malformed_streak = 0;

        info!(session_id = %session.id, turns = session.history.len(), "Record complete");
        self.record(
            SessionEvent::new(
                session.id,
                SessionEventType::RecordCompleted,
                "All fields validated, awaiting confirmation",
                session.status,
            )
            .with_duration(duration_ms),
        )
        .await;

        Outcome::ReadyForReview { record }
    }

    /// Unusable extraction: re-prompt, or give up once the streak hits the limit
    async fn reject(
        &self,
        session: &mut Session,
        prompt: String,
        reason: String,
        duration_ms: u64,
    ) -> Outcome {
        session.malformed_streak += 1;
        warn!(
            session_id = %session.id,
            streak = session.malformed_streak,
            reason = %reason,
            "Extraction rejected"
        );

        if session.malformed_streak >= self.max_malformed() {
            session.history.push(Turn::assistant(RESTART_PROMPT));
            self.record(
                SessionEvent::new(
                    session.id,
                    SessionEventType::RestartRequired,
                    format!(
                        "{} unusable extractions in a row",
                        session.malformed_streak
                    ),
                    session.status,
                )
                .with_duration(duration_ms)
                .with_error(reason.clone()),
            )
            .await;
            return Outcome::RestartRequired {
                prompt: RESTART_PROMPT.to_string(),
            };
        }

        session.history.push(Turn::assistant(prompt.clone()));
        self.record(
            SessionEvent::new(
                session.id,
                SessionEventType::ExtractionRejected,
                format!("Re-prompted (streak {})", session.malformed_streak),
                session.status,
            )
            .with_duration(duration_ms)
            .with_error(reason.clone()),
        )
        .await;

        Outcome::NeedsMoreInfo { prompt }
    }

    fn max_malformed(&self) -> u32 {
        self.limits.max_malformed_extractions.max(1)
    }

    /// Journal writes never fail an engine call
    async fn record(&self, event: SessionEvent) {
        if let Some(ref log) = self.log {
            if let Err(e) = log.append(&event).await {
                warn!(session_id = %event.session_id, error = %e, "Failed to write session event");
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
