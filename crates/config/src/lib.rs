//! Configuration loading, validation, and management for Quill.
//!
//! Loads configuration from `~/.config/quill/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod prompt;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use prompt::{DEFAULT_SYSTEM_PROMPT, SystemPrompt};

/// The root configuration structure.
///
/// Maps directly to `~/.config/quill/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Input history persistence
    #[serde(default)]
    pub history: HistoryConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// System prompt template
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, used in logs and telemetry
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Use the offline mock model instead of a real provider
    #[serde(default)]
    pub use_mock: bool,
}

fn default_provider_name() -> String {
    "gemini".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            use_mock: false,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("use_mock", &self.use_mock)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model round-trips allowed per message; 0 disables the guard
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Minimum spacing between streamed-text flushes
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Rows kept free below streamed output before flushing is held back
    #[serde(default = "default_height_margin")]
    pub height_margin: u16,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_flush_interval_ms() -> u64 {
    100
}
fn default_height_margin() -> u16 {
    7
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            flush_interval_ms: default_flush_interval_ms(),
            height_margin: default_height_margin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Override for the history file location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,

    /// Entries longer than this are treated as corrupt on load
    #[serde(default = "default_history_max_entry_chars")]
    pub max_entry_chars: usize,
}

fn default_history_max_entries() -> usize {
    1000
}
fn default_history_max_entry_chars() -> usize {
    10_000
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: default_history_max_entries(),
            max_entry_chars: default_history_max_entry_chars(),
        }
    }
}

impl HistoryConfig {
    /// The configured history path, or `~/.config/quill/input_history`.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("input_history"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json: bool,

    /// Default filter directive when `RUST_LOG` is unset (e.g. "warn", "quill_agent=debug")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Prompt template; `{{AGENTS}}` is replaced by ./AGENTS.md
    #[serde(default = "default_system_prompt")]
    pub prompt: String,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            prompt: default_system_prompt(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.config/quill/config.toml).
    ///
    /// Environment variables override file values:
    /// - `QUILL_API_KEY`, then `GEMINI_API_KEY`
    /// - `QUILL_MODEL`, then `GEMINI_MODEL`
    /// - `QUILL_BASE_URL`
    /// - `USE_MOCK_MODEL=true`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("QUILL_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = non_empty("QUILL_MODEL").or_else(|| non_empty("GEMINI_MODEL")) {
            self.provider.model = model;
        }
        if let Some(url) = non_empty("QUILL_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(mock) = non_empty("USE_MOCK_MODEL") {
            self.provider.use_mock = mock.eq_ignore_ascii_case("true");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".config").join("quill")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.flush_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "agent.flush_interval_ms must be > 0".into(),
            ));
        }

        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// The API key, unless running against the mock model.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.provider
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No API key configured. Set QUILL_API_KEY or GEMINI_API_KEY, or run with --mock")]
    MissingApiKey,
}

impl From<ConfigError> for quill_core::Error {
    fn from(e: ConfigError) -> Self {
        quill_core::Error::Config {
            message: e.to_string(),
        }
    }
}
