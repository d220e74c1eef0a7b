//! Command-line interface for voxreg.
//!
//! Provides commands for running registration interviews, transcribing a
//! single recording, listing past sessions and showing configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::{
    Extractor, OpenAiClient, OpenAiExtractor, OpenAiTranscriber, PassthroughTranscriber,
    RecordSink, SheetSink, SqliteSink, Transcriber, WhisperCliTranscriber,
};
use crate::config::{self, ResolvedConfig, StorageBackend, TranscriberBackend};
use crate::core::{SessionEngine, SessionHandle, SessionLog, GREETING};
use crate::domain::{render_table, Outcome};

/// voxreg - Voice-driven registration interviews
#[derive(Parser, Debug)]
#[command(name = "voxreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run registration interviews on the terminal
    ///
    /// Each input line is the path of a recorded utterance (or, with --text,
    /// the utterance itself). Commands: :save, :reset, :status, :quit
    Interview {
        /// Treat input lines as typed utterances instead of audio paths
        #[arg(long)]
        text: bool,

        /// Print presentation payloads as JSON instead of prose
        #[arg(long)]
        json: bool,
    },

    /// Transcribe a single audio file
    Transcribe {
        /// Audio file (wav, webm, ogg, mp3, flac, m4a)
        file: PathBuf,
    },

    /// List recent interview sessions
    Sessions {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Interview { text, json } => run_interview(text, json).await,
            Commands::Transcribe { file } => transcribe_file(&file).await,
            Commands::Sessions { limit } => list_sessions(limit).await,
            Commands::Config => show_config(),
        }
    }
}

/// Build the configured transcriber
fn build_transcriber(config: &ResolvedConfig, text_mode: bool) -> Result<Arc<dyn Transcriber>> {
    if text_mode {
        return Ok(Arc::new(PassthroughTranscriber));
    }

    Ok(match config.transcriber.backend {
        TranscriberBackend::Openai => {
            let client = OpenAiClient::from_settings(&config.openai)?;
            Arc::new(OpenAiTranscriber::new(
                client,
                config.openai.transcription_model.clone(),
            ))
        }
        TranscriberBackend::WhisperCli => Arc::new(WhisperCliTranscriber::new(
            config.transcriber.whisper_path.clone(),
            config.transcriber.whisper_model.clone(),
        )),
    })
}

/// Build the configured record sink and verify its header
async fn build_sink(config: &ResolvedConfig) -> Result<Arc<dyn RecordSink>> {
    let sink: Arc<dyn RecordSink> = match config.storage_backend {
        StorageBackend::Sheet => Arc::new(SheetSink::new(config.storage_path.clone())),
        StorageBackend::Sqlite => Arc::new(
            SqliteSink::open(&config.storage_path).with_context(|| {
                format!("Failed to open database: {}", config.storage_path.display())
            })?,
        ),
    };

    sink.ensure_header().await.with_context(|| {
        format!(
            "Failed to prepare {} storage at {}",
            sink.name(),
            config.storage_path.display()
        )
    })?;

    Ok(sink)
}

/// Assemble an engine from configuration
async fn build_engine(config: &ResolvedConfig, text_mode: bool) -> Result<SessionEngine> {
    let transcriber = build_transcriber(config, text_mode)?;

    let client = OpenAiClient::from_settings(&config.openai)?;
    let extractor: Arc<dyn Extractor> = Arc::new(OpenAiExtractor::new(
        client,
        config.openai.extraction_model.clone(),
        config.openai.temperature,
    ));

    let sink = build_sink(config).await?;
    let log = SessionLog::open(config.sessions_dir()).await?;

    Ok(SessionEngine::new(transcriber, extractor, sink)
        .with_limits(config.limits.clone())
        .with_language(config.openai.language.clone())
        .with_log(log))
}

/// Interactive interview loop
async fn run_interview(text_mode: bool, json: bool) -> Result<()> {
    let config = config::config()?;
    let engine = build_engine(config, text_mode).await?;
    let mut handle = engine.start_session().await;

    print_prompt(GREETING, json);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match line {
            ":quit" | ":q" => break,
            ":save" => engine.confirm_save(&handle).await,
            ":reset" => match engine.reset(&handle).await {
                Ok(_) => {
                    print_prompt(GREETING, json);
                    continue;
                }
                Err(e) => Err(e),
            },
            ":status" => {
                show_session(&handle, json)?;
                continue;
            }
            input => {
                let audio = if text_mode {
                    input.as_bytes().to_vec()
                } else {
                    match tokio::fs::read(input).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            eprintln!("Cannot read audio file {}: {}", input, e);
                            continue;
                        }
                    }
                };
                engine.submit_utterance(&handle, &audio).await
            }
        };

        match result {
            Ok(outcome) => {
                let saved = matches!(outcome, Outcome::Saved { .. });
                print_outcome(&outcome, json);
                if saved {
                    // Ready for the next client
                    handle = engine.start_session().await;
                    print_prompt(GREETING, json);
                }
            }
            Err(e) => {
                if json {
                    println!("{}", e.payload());
                } else {
                    eprintln!("[{}]", e);
                }
            }
        }
    }

    Ok(())
}

fn print_prompt(prompt: &str, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "prompt_text": prompt }));
    } else {
        println!("\nAssistant: {}", prompt);
    }
}

fn print_outcome(outcome: &Outcome, json: bool) {
    if json {
        println!("{}", outcome.payload());
        return;
    }

    match outcome {
        Outcome::NeedsMoreInfo { prompt } | Outcome::RestartRequired { prompt } => {
            println!("\nAssistant: {}", prompt);
            if matches!(outcome, Outcome::RestartRequired { .. }) {
                println!("(type :reset to start over)");
            }
        }
        Outcome::TranscriptionFailed { prompt, reason }
        | Outcome::ExtractionFailed { prompt, reason } => {
            eprintln!("[{}: {}]", outcome.kind(), reason);
            println!("\nAssistant: {}", prompt);
        }
        Outcome::ReadyForReview { record } => {
            let rows: Vec<(String, String)> = crate::domain::Field::ALL
                .iter()
                .map(|f| (f.column().to_string(), record.value_of(*f)))
                .collect();
            println!("\nPlease review the client information:");
            println!("{}", render_table(&rows));
            println!("Type :save to store it or :reset to start over.");
        }
        Outcome::Saved { save_key } => {
            println!("\nData successfully saved! [{}]", save_key);
        }
        Outcome::PersistenceFailed { reason } => {
            eprintln!("\nError saving record: {}", reason);
            println!("Type :save to try again.");
        }
    }
}

/// Print the current session state
fn show_session(handle: &SessionHandle, json: bool) -> Result<()> {
    let session = handle.snapshot()?;

    if json {
        println!("{}", serde_json::to_string(&session)?);
        return Ok(());
    }

    println!("Session: {}", session.id);
    println!("Status:  {}", session.status.as_str());
    println!("Turns:   {}", session.history.len());
    println!("{}", render_table(&session.fields.table_rows()));
    Ok(())
}

/// Transcribe one file and print the text
async fn transcribe_file(path: &PathBuf) -> Result<()> {
    let config = config::config()?;
    let transcriber = build_transcriber(config, false)?;

    let audio = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

    let text = transcriber
        .transcribe(&audio, Some(&config.openai.language))
        .await
        .with_context(|| format!("Failed to transcribe {}", path.display()))?;

    println!("{}", text);
    Ok(())
}

/// List recent sessions from the journal
async fn list_sessions(limit: usize) -> Result<()> {
    let log = SessionLog::open_default().await?;
    let sessions = log.recent(limit).await?;

    if sessions.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    println!(
        "{:<38} {:<22} {:<20} {:>7} {:>8}",
        "SESSION ID", "STATUS", "STARTED", "PROMPTS", "FAILURES"
    );
    println!("{}", "-".repeat(99));

    for s in sessions {
        println!(
            "{:<38} {:<22} {:<20} {:>7} {:>8}",
            s.session_id,
            s.status.as_str(),
            s.started_at.format("%Y-%m-%d %H:%M:%S"),
            s.prompts,
            s.failures
        );
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("voxreg Configuration");
    println!("====================");
    println!();
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!("Home:        {}", config.home.display());
    println!("Sessions:    {}", config.sessions_dir().display());
    println!(
        "Storage:     {:?} at {}",
        config.storage_backend,
        config.storage_path.display()
    );
    println!();
    println!("OpenAI:");
    println!("  base_url:            {}", config.openai.base_url);
    println!(
        "  api_key:             {}",
        if config.openai.api_key.is_some() { "set" } else { "NOT SET" }
    );
    println!("  transcription_model: {}", config.openai.transcription_model);
    println!("  extraction_model:    {}", config.openai.extraction_model);
    println!("  temperature:         {}", config.openai.temperature);
    println!("  language:            {}", config.openai.language);
    println!();
    println!("Transcriber: {:?}", config.transcriber.backend);
    if config.transcriber.backend == TranscriberBackend::WhisperCli {
        println!("  whisper_path:  {}", config.transcriber.whisper_path.display());
        println!("  whisper_model: {}", config.transcriber.whisper_model);
    }
    println!();
    println!("Limits:");
    println!("  transcription_timeout: {}s", config.limits.transcription_timeout_seconds);
    println!("  extraction_timeout:    {}s", config.limits.extraction_timeout_seconds);
    println!("  persistence_timeout:   {}s", config.limits.persistence_timeout_seconds);
    println!("  max_malformed:         {}", config.limits.max_malformed_extractions);
    println!("  max_audio_bytes:       {}", config.limits.max_audio_bytes);

    Ok(())
}
