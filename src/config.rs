//! Configuration for voxreg.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VOXREG_HOME, VOXREG_OUTPUT, OPENAI_API_KEY, OPENAI_BASE_URL)
//! 2. Config file (.voxreg/config.yaml)
//! 3. Defaults (~/.voxreg)
//!
//! Config file discovery:
//! - Searches current directory and parents for .voxreg/config.yaml
//! - Relative paths in the config file are relative to the project root
//!   (the directory containing .voxreg/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
    #[serde(default)]
    pub limits: Option<LimitsConfig>,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub transcriber: Option<TranscriberConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiConfig {
    pub base_url: Option<String>,
    pub transcription_model: Option<String>,
    pub extraction_model: Option<String>,
    pub temperature: Option<f32>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsConfig {
    pub transcription_timeout_seconds: Option<u64>,
    pub extraction_timeout_seconds: Option<u64>,
    pub persistence_timeout_seconds: Option<u64>,
    pub max_malformed_extractions: Option<u32>,
    pub max_audio_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    pub backend: Option<StorageBackend>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriberConfig {
    pub backend: Option<TranscriberBackend>,
    pub whisper_path: Option<String>,
    pub whisper_model: Option<String>,
}

/// Where completed records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// CSV file with the fixed header row
    #[default]
    Sheet,
    /// SQLite database
    Sqlite,
}

/// Which speech-to-text backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriberBackend {
    #[default]
    Openai,
    WhisperCli,
}

/// Resolved OpenAI settings
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub transcription_model: String,
    pub extraction_model: String,
    pub temperature: f32,
    pub language: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            transcription_model: "whisper-1".to_string(),
            extraction_model: "gpt-4o".to_string(),
            temperature: 0.1,
            language: "en".to_string(),
        }
    }
}

/// Resolved limits for engine adapter calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSettings {
    pub transcription_timeout_seconds: u64,
    pub extraction_timeout_seconds: u64,
    pub persistence_timeout_seconds: u64,
    pub max_malformed_extractions: u32,
    pub max_audio_bytes: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            transcription_timeout_seconds: 60,
            extraction_timeout_seconds: 60,
            persistence_timeout_seconds: 30,
            max_malformed_extractions: 3,
            max_audio_bytes: 25 * 1024 * 1024, // 25MB, the Whisper API upload cap
        }
    }
}

impl LimitSettings {
    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_seconds)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_seconds)
    }

    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_secs(self.persistence_timeout_seconds)
    }
}

/// Resolved transcriber settings
#[derive(Debug, Clone)]
pub struct TranscriberSettings {
    pub backend: TranscriberBackend,
    pub whisper_path: PathBuf,
    pub whisper_model: String,
}

impl Default for TranscriberSettings {
    fn default() -> Self {
        Self {
            backend: TranscriberBackend::Openai,
            whisper_path: PathBuf::from("whisper"),
            whisper_model: "base".to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to voxreg home (session journals)
    pub home: PathBuf,
    /// Storage backend for completed records
    pub storage_backend: StorageBackend,
    /// Sheet file or database path
    pub storage_path: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub openai: OpenAiSettings,
    pub limits: LimitSettings,
    pub transcriber: TranscriberSettings,
}

impl ResolvedConfig {
    /// Directory holding one JSONL journal per session
    pub fn sessions_dir(&self) -> PathBuf {
        self.home.join("sessions")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".voxreg").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_config(content: &str) -> Result<ConfigFile> {
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn default_storage_file(backend: StorageBackend) -> &'static str {
    match backend {
        StorageBackend::Sheet => "registrations.csv",
        StorageBackend::Sqlite => "registrations.db",
    }
}

/// Combine file contents, environment lookups and defaults
fn resolve(
    file: ConfigFile,
    base_dir: &Path,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let home = match (env("VOXREG_HOME"), file.home.as_deref()) {
        (Some(h), _) => PathBuf::from(h),
        (None, Some(h)) => resolve_path(base_dir, h),
        (None, None) => dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".voxreg"),
    };

    let storage = file.storage.unwrap_or_default();
    let storage_backend = storage.backend.unwrap_or_default();
    let storage_path = match (env("VOXREG_OUTPUT"), storage.path.as_deref()) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(p)) => resolve_path(base_dir, p),
        (None, None) => home.join(default_storage_file(storage_backend)),
    };

    let defaults = OpenAiSettings::default();
    let openai_file = file.openai.unwrap_or_default();
    let openai = OpenAiSettings {
        base_url: env("OPENAI_BASE_URL")
            .or(openai_file.base_url)
            .unwrap_or(defaults.base_url),
        api_key: env("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
        transcription_model: openai_file
            .transcription_model
            .unwrap_or(defaults.transcription_model),
        extraction_model: openai_file
            .extraction_model
            .unwrap_or(defaults.extraction_model),
        temperature: openai_file.temperature.unwrap_or(defaults.temperature),
        language: openai_file.language.unwrap_or(defaults.language),
    };

    let defaults = LimitSettings::default();
    let limits_file = file.limits.unwrap_or_default();
    let limits = LimitSettings {
        transcription_timeout_seconds: limits_file
            .transcription_timeout_seconds
            .unwrap_or(defaults.transcription_timeout_seconds),
        extraction_timeout_seconds: limits_file
            .extraction_timeout_seconds
            .unwrap_or(defaults.extraction_timeout_seconds),
        persistence_timeout_seconds: limits_file
            .persistence_timeout_seconds
            .unwrap_or(defaults.persistence_timeout_seconds),
        max_malformed_extractions: limits_file
            .max_malformed_extractions
            .unwrap_or(defaults.max_malformed_extractions),
        max_audio_bytes: limits_file.max_audio_bytes.unwrap_or(defaults.max_audio_bytes),
    };

    let defaults = TranscriberSettings::default();
    let transcriber_file = file.transcriber.unwrap_or_default();
    let transcriber = TranscriberSettings {
        backend: transcriber_file.backend.unwrap_or(defaults.backend),
        whisper_path: env("WHISPER_PATH")
            .or(transcriber_file.whisper_path)
            .map(PathBuf::from)
            .unwrap_or(defaults.whisper_path),
        whisper_model: transcriber_file.whisper_model.unwrap_or(defaults.whisper_model),
    };

    Ok(ResolvedConfig {
        home,
        storage_backend,
        storage_path,
        config_file,
        openai,
        limits,
        transcriber,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let env = |key: &str| std::env::var(key).ok();

    match find_config_file() {
        Some(config_path) => {
            let file = load_config_file(&config_path)?;
            // Base directory is the parent of .voxreg/ (the project root)
            let base_dir = config_path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            resolve(file, &base_dir, Some(config_path), env)
        }
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            resolve(ConfigFile::default(), &cwd, None, env)
        }
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
