//! Text passthrough "transcriber" for typed interviews.

use async_trait::async_trait;

use super::{Transcriber, TranscriptionError};

/// Treats the input bytes as UTF-8 text
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranscriber;

#[async_trait]
impl Transcriber for PassthroughTranscriber {
    fn name(&self) -> &str {
        "text"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        _language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let text = std::str::from_utf8(audio)
            .map_err(|e| TranscriptionError::Process(format!("input is not UTF-8: {}", e)))?;
        Ok(text.trim().to_string())
    }
}
