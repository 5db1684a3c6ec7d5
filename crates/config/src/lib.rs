//! Configuration loading, validation, and management for Complimenter.
//!
//! Loads configuration from `complimenter.toml` (working directory, or an
//! explicit path) and then applies environment variable overrides, taken from
//! the process environment or a `.env` file. Validates all settings at
//! startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "complimenter.toml";

/// Dotenv file looked up in the working directory.
pub const ENV_FILE_NAME: &str = ".env";

/// The root configuration structure.
///
/// Maps directly to `complimenter.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Remote chat-completion API
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local fallback model
    #[serde(default)]
    pub local: LocalConfig,

    /// Message history storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Bot behaviour
    #[serde(default)]
    pub bot: BotConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Token from @BotFather. Required only when running the Telegram bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API key. Absent means the remote tier is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_remote_model")]
    pub model: String,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_remote_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_remote_model(),
        }
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Set to false to go straight from remote to rule-based replies
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Preset alias (`smollm:360m`, `tinyllama`, ...) or a `.gguf` path
    #[serde(default = "default_local_model")]
    pub model: String,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
}

fn default_true() -> bool {
    true
}
fn default_local_model() -> String {
    "smollm:360m".into()
}
fn default_max_new_tokens() -> u32 {
    120
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_local_model(),
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/context.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Who the compliments are for
    #[serde(default = "default_recipient")]
    pub recipient_name: String,

    /// How many recent messages feed the prompt
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// Replaces the built-in prompt. Placeholders: `{recipient}`,
    /// `{category}`, `{context}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

fn default_recipient() -> String {
    "Оля".into()
}
fn default_context_limit() -> usize {
    2
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            recipient_name: default_recipient(),
            context_limit: default_context_limit(),
            prompt_template: None,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Load configuration from `complimenter.toml` in the working directory
    /// (or `path` when given), then apply environment overrides:
    ///
    /// - `TELEGRAM_BOT_TOKEN`, `OPENROUTER_API_KEY`, `OPENROUTER_MODEL`,
    ///   `OPENROUTER_BASE_URL`, `FALLBACK_MODEL`, `DB_PATH`, `LOG_LEVEL`,
    ///   `LOG_PATH`, `RECIPIENT_NAME`
    ///
    /// Variables missing from the process environment are read from `.env`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = PathBuf::from(CONFIG_FILE_NAME);
        Self::load_with_env_file(path.unwrap_or(&default_path), Path::new(ENV_FILE_NAME))
    }

    /// Like [`Self::load`] with explicit config and dotenv paths.
    pub fn load_with_env_file(path: &Path, env_file: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        let dotenv = read_env_file(env_file)?;
        config.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()));
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

    /// Apply environment overrides through a lookup function, so tests can
    /// feed a map instead of mutating the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.remote.api_key = Some(key);
        }
        if let Some(model) = get("OPENROUTER_MODEL") {
            self.remote.model = model;
        }
        if let Some(url) = get("OPENROUTER_BASE_URL") {
            self.remote.base_url = url;
        }
        if let Some(model) = get("FALLBACK_MODEL") {
            self.local.model = model;
        }
        if let Some(path) = get("DB_PATH") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(dir) = get("LOG_PATH") {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Some(name) = get("RECIPIENT_NAME") {
            self.bot.recipient_name = name;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.context_limit == 0 {
            return Err(ConfigError::ValidationError(
                "bot.context_limit must be at least 1".into(),
            ));
        }

        if self.bot.recipient_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "bot.recipient_name must not be empty".into(),
            ));
        }

        if self.local.max_new_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "local.max_new_tokens must be at least 1".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Check if a remote API key is available.
    pub fn has_remote_key(&self) -> bool {
        self.remote.api_key.is_some()
    }

    /// The Telegram token, or a fatal configuration error.
    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        self.telegram
            .bot_token
            .as_deref()
            .ok_or(ConfigError::MissingCredential("TELEGRAM_BOT_TOKEN"))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Variables from a dotenv file. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let read_error = |reason: String| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason,
    };

    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(read_error(e.to_string())),
    };

    let vars = entries
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(|e| read_error(e.to_string()))?;
    tracing::debug!(path = %path.display(), count = vars.len(), "Loaded dotenv file");
    Ok(vars)
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

    #[error("Missing required credential: {0}")]
    MissingCredential(&'static str),
}
