//! OpenAI-compatible HTTP adapters.
//!
//! Endpoints:
//! - POST {base_url}/audio/transcriptions (multipart, Whisper)
//! - POST {base_url}/chat/completions (JSON, field extraction)
//!
//! Auth: Bearer token

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::audio::AudioFormat;
use super::reply::parse_reply;
use super::{Extraction, ExtractionError, Extractor, Transcriber, TranscriptionError};
use crate::config::OpenAiSettings;
use crate::domain::{Role, Turn};

/// Instructions for the extraction model
pub const EXTRACTION_PROMPT: &str = r#"You are an intelligent form-filling assistant for a non-profit. Your goal is to collect four pieces of information about a client: name, household_members (an integer count of people in the household), address and phone.

- Read the whole conversation so far.
- If any information is missing or unclear, ask a single, direct question to get the missing detail. Reply with {"question": "<your question>"}.
- Once all four pieces of information have been clearly gathered, reply with {"record": {"name": "...", "household_members": 3, "address": "...", "phone": "..."}}.
- Always reply with exactly one JSON object and nothing else.

Example of a final reply:
{"record": {"name": "Jane Doe", "household_members": 3, "address": "123 Main St, Anytown, USA", "phone": "555-123-4567"}}"#;

/// Shared HTTP client for an OpenAI-compatible API
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from resolved settings (the API key must be configured)
    pub fn from_settings(settings: &OpenAiSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .context("OPENAI_API_KEY environment variable required")?;
        Ok(Self::new(settings.base_url.clone(), api_key))
    }

    /// Build an endpoint URL
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Response from the transcription endpoint
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper transcription over HTTP
pub struct OpenAiTranscriber {
    client: OpenAiClient,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    fn name(&self) -> &str {
        "openai"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let format = AudioFormat::sniff(audio);
        debug!(format = ?format, bytes = audio.len(), "Uploading audio for transcription");

        let file_part = Part::bytes(audio.to_vec())
            .file_name(format.file_name("utterance"))
            .mime_str(format.mime_type())
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file_part);

        if let Some(language) = language_hint {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .client
            .post(self.client.url("audio/transcriptions"))
            .bearer_auth(&self.client.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Request(format!(
                "transcription API error ({}): {}",
                status, text
            )));
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Request(format!("invalid response: {}", e)))?;

        Ok(body.text.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Field extraction through chat completions
pub struct OpenAiExtractor {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiExtractor {
    pub fn new(client: OpenAiClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    /// System prompt followed by the conversation, latest utterance last
    fn build_messages<'a>(history: &'a [Turn], latest_utterance: &'a str) -> Vec<ChatMessage<'a>> {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: EXTRACTION_PROMPT,
        }];

        for turn in history {
            messages.push(ChatMessage {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &turn.text,
            });
        }

        let ends_with_latest = history
            .last()
            .map(|t| t.role == Role::User && t.text == latest_utterance)
            .unwrap_or(false);
        if !ends_with_latest {
            messages.push(ChatMessage {
                role: "user",
                content: latest_utterance,
            });
        }

        messages
    }
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(
        &self,
        history: &[Turn],
        latest_utterance: &str,
    ) -> Result<Extraction, ExtractionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: Self::build_messages(history, latest_utterance),
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .client
            .post(self.client.url("chat/completions"))
            .bearer_auth(&self.client.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Request(format!(
                "chat API error ({}): {}",
                status, text
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Request(format!("invalid response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(parse_reply(&content))
    }
}
