//! Local Whisper transcription backend.
//!
//! Shells out to the `whisper` CLI so audio never leaves the machine.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::audio::AudioFormat;
use super::{Transcriber, TranscriptionError};

/// Whisper output JSON structure
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
}

/// Transcriber running the local whisper binary
pub struct WhisperCliTranscriber {
    binary_path: PathBuf,
    model: String,
}

impl WhisperCliTranscriber {
    pub fn new(binary_path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    fn name(&self) -> &str {
        "whisper_cli"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        // Whisper writes <stem>.json next to the requested output dir
        let temp_dir = tempfile::tempdir()?;
        let format = AudioFormat::sniff(audio);
        let audio_path = temp_dir.path().join(format.file_name("utterance"));
        tokio::fs::write(&audio_path, audio).await?;

        let mut command = Command::new(&self.binary_path);
        command
            .arg(&audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_dir")
            .arg(temp_dir.path())
            .arg("--output_format")
            .arg("json");
        if let Some(language) = language_hint {
            command.arg("--language").arg(language);
        }

        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                TranscriptionError::Process(format!(
                    "failed to run {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::Process(format!(
                "whisper failed: {}",
                stderr.trim()
            )));
        }

        let json_path = temp_dir.path().join("utterance.json");
        let json_content = tokio::fs::read_to_string(&json_path).await?;

        let whisper: WhisperOutput = serde_json::from_str(&json_content)
            .map_err(|e| TranscriptionError::Process(format!("invalid whisper JSON: {}", e)))?;

        Ok(whisper.text.trim().to_string())
    }
}
