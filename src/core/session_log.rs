//! Append-only session journal with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL), one file per session:
//! `{sessions_dir}/{session_id}.jsonl`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{ClientRecord, SessionEvent, SessionSummary};

/// File-based session journal
#[derive(Debug, Clone)]
pub struct SessionLog {
    /// Directory containing one JSONL file per session
    dir: PathBuf,
}

impl SessionLog {
    /// Create or open a journal directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create sessions directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open the journal in the configured location (~/.voxreg/sessions)
    pub async fn open_default() -> Result<Self> {
        Self::open(crate::config::config()?.sessions_dir()).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to a session's events file
    pub fn events_path(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.jsonl", session_id))
    }

    /// Append an event to its session's log
    pub async fn append(&self, event: &SessionEvent) -> Result<()> {
        let path = self.events_path(event.session_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open events file: {}", path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events of a session in order
    pub async fn replay(&self, session_id: Uuid) -> Result<Vec<SessionEvent>> {
        let path = self.events_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)
            .await
            .with_context(|| format!("Failed to open events file: {}", path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: SessionEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Summarise one session
    pub async fn summary(&self, session_id: Uuid) -> Result<Option<SessionSummary>> {
        let events = self.replay(session_id).await?;
        Ok(SessionSummary::from_events(&events))
    }

    /// List all session IDs in the journal
    pub async fn list_sessions(&self) -> Result<Vec<Uuid>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(uuid) = Uuid::parse_str(stem) {
                    sessions.push(uuid);
                }
            }
        }

        Ok(sessions)
    }

    /// Most recent sessions first
    pub async fn recent(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for session_id in self.list_sessions().await? {
            if let Ok(Some(summary)) = self.summary(session_id).await {
                summaries.push(summary);
            }
        }

        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        summaries.truncate(limit);
        Ok(summaries)
    }
}

/// Generate the save key for a record: "{session_id}:{record_hash}"
pub fn generate_save_key(session_id: Uuid, record: &ClientRecord) -> String {
    let canonical = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}",
        record.name, record.household_members, record.address, record.phone
    );
    format!("{}:{}", session_id, hash_input(&canonical))
}

/// Hash input content (first 16 chars of SHA256)
pub fn hash_input(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8]) // First 16 hex chars (8 bytes)
}
