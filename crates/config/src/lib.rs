//! Configuration loading, validation, and management for wigli.
//!
//! Loads `<data_dir>/config.toml`, then `.env` files and environment
//! variables on top. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "WIGLI_DATA_DIR";

/// The root configuration structure.
///
/// Maps directly to `<data_dir>/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the chat-completions endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model id
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Context budget; larger conversations get the limit sentinel
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Maximum command cycles per send
    #[serde(default = "default_max_commands")]
    pub max_commands: usize,

    /// Stream replies to the terminal as they arrive
    #[serde(default = "default_true")]
    pub stream: bool,

    /// A conversation touched this recently is resumed implicitly
    #[serde(default = "default_idle_resume_secs")]
    pub idle_resume_secs: u64,

    /// Round-trips between persona reminders
    #[serde(default = "default_reminder_period")]
    pub reminder_period: u32,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub python: PythonConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_max_context_tokens() -> usize {
    4096
}
fn default_max_commands() -> usize {
    8
}
fn default_true() -> bool {
    true
}
fn default_idle_resume_secs() -> u64 {
    300
}
fn default_reminder_period() -> u32 {
    5
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_context_tokens", &self.max_context_tokens)
            .field("max_commands", &self.max_commands)
            .field("stream", &self.stream)
            .field("idle_resume_secs", &self.idle_resume_secs)
            .field("reminder_period", &self.reminder_period)
            .field("search", &self.search)
            .field("python", &self.python)
            .finish()
    }
}

/// Web search command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results returned per query
    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

fn default_num_results() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_results: default_num_results(),
        }
    }
}

/// Code execution command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Interpreter used to run generated scripts
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// File name the script is written to under `<data_dir>/scripts`
    #[serde(default = "default_script_name")]
    pub script_name: String,
}

fn default_interpreter() -> String {
    "python3".into()
}
fn default_script_name() -> String {
    "wigli_script.py".into()
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script_name: default_script_name(),
        }
    }
}

/// What a provider needs to authenticate. Passed explicitly at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub api_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration for a data directory.
    ///
    /// `.env` in the working directory and in `data_dir` are loaded first.
    /// Environment overrides, highest priority first:
    /// - `WIGLI_API_KEY`, then `OPENAI_API_KEY`
    /// - `WIGLI_MODEL`
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded {}", path.display());
        }
        let env_path = data_dir.join(".env");
        if env_path.exists() {
            if let Err(e) = dotenvy::from_path(&env_path) {
                tracing::warn!("Could not load {}: {e}", env_path.display());
            }
        }

        let mut config = Self::load_from(&data_dir.join("config.toml"))?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("WIGLI_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|k| !k.trim().is_empty())
        {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("WIGLI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_context_tokens must be > 0".into(),
            ));
        }
        if self.reminder_period == 0 {
            return Err(ConfigError::ValidationError(
                "reminder_period must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_context_tokens: default_max_context_tokens(),
            max_commands: default_max_commands(),
            stream: true,
            idle_resume_secs: default_idle_resume_secs(),
            reminder_period: default_reminder_period(),
            search: SearchConfig::default(),
            python: PythonConfig::default(),
        }
    }
}

/// Resolve the data directory: explicit path, then `WIGLI_DATA_DIR`, then
/// the platform data directory.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        .or_else(|| dirs::data_dir().map(|d| d.join("wigli")))
        .unwrap_or_else(|| PathBuf::from(".wigli"))
}

/// Store an API key in `<data_dir>/.env`, keeping any other variables.
pub fn save_api_key(data_dir: &Path, key: &str) -> Result<PathBuf, ConfigError> {
    let path = data_dir.join(".env");
    let write_err = |e: std::io::Error| ConfigError::WriteError {
        path: path.clone(),
        reason: e.to_string(),
    };

    std::fs::create_dir_all(data_dir).map_err(write_err)?;
    let existing = if path.exists() {
        std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            reason: e.to_string(),
        })?
    } else {
        String::new()
    };

    let mut lines: Vec<String> = existing
        .lines()
        .filter(|l| !l.trim_start().starts_with("OPENAI_API_KEY="))
        .map(str::to_string)
        .collect();
    lines.push(format!("OPENAI_API_KEY={}", key.trim()));
    std::fs::write(&path, lines.join("\n") + "\n").map_err(write_err)?;

    tracing::debug!("Saved API key to {}", path.display());
    Ok(path)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
