//! Configuration data structures
//!
//! Loaded once at process start: the TOML file under the user's config directory, then
//! environment overrides. The bot token is only ever read from the environment.

use crate::models::MAX_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default request timeout when neither the config file nor the caller sets one
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Default Telegram Bot API endpoint
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub const ENV_BOT_TOKEN: &str = "HITL_TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "HITL_TELEGRAM_CHAT_ID";
pub const ENV_TIMEOUT_SECONDS: &str = "HITL_TIMEOUT_SECONDS";
/// Older name for [`ENV_TIMEOUT_SECONDS`]; used only when the new one is unset
pub const ENV_TELEGRAM_TIMEOUT_SECONDS: &str = "HITL_TELEGRAM_TIMEOUT_SECONDS";
pub const ENV_LOG_LEVEL: &str = "HITL_LOG_LEVEL";
pub const ENV_FALLBACK_TO_DIALOG: &str = "HITL_FALLBACK_TO_DIALOG";

/// Errors while reading or writing the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Logging level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Bot credential. Kept out of Debug output and never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(***)")
    }
}

/// Telegram provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    /// Provider switch; a configured token and chat id are still required
    pub enabled: bool,
    /// Authorized Responder Identity: the only chat whose messages count as replies
    pub chat_id: Option<String>,
    /// Bot API base URL
    pub api_base: String,
    /// Upper bound on a single getUpdates long poll
    pub poll_timeout_seconds: u64,
    /// Pause after a failed fetch before polling again
    pub retry_delay_millis: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chat_id: None,
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            poll_timeout_seconds: 25,
            retry_delay_millis: 2000,
        }
    }
}

/// Communication providers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub telegram: TelegramConfig,
}

/// Local dialog settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DialogConfig {
    pub enabled: bool,
    /// Title used when a tool call does not supply one
    pub title: String,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: "Human-in-the-Loop".to_string(),
        }
    }
}

/// Everything the remote relay needs, resolved from config + environment
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub token: BotToken,
    pub chat_id: String,
    pub api_base: String,
    pub poll_timeout: Duration,
    pub retry_delay: Duration,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    /// Default timeout in seconds for requests without an override
    pub timeout_seconds: u64,
    /// Logging verbosity level
    pub log_level: LogLevel,
    /// Use the local dialog when the remote relay cannot start a request
    pub fallback_to_dialog: bool,
    pub providers: ProvidersConfig,
    pub dialog: DialogConfig,
    #[serde(skip)]
    pub telegram_bot_token: Option<BotToken>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            log_level: LogLevel::Info,
            fallback_to_dialog: false,
            providers: ProvidersConfig::default(),
            dialog: DialogConfig::default(),
            telegram_bot_token: None,
        }
    }
}

impl Configuration {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
        } else {
            // Return default configuration if file doesn't exist
            Ok(Configuration::default())
        }
    }

    /// Load the file (default location when `path` is None) and apply process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };
        let mut config = Self::load_from_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("hitl").join("config.toml"))
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(token) = get(ENV_BOT_TOKEN) {
            self.telegram_bot_token = Some(BotToken::new(token));
        }
        if let Some(chat_id) = get(ENV_CHAT_ID) {
            self.providers.telegram.chat_id = Some(chat_id);
        }
        let timeout = get(ENV_TIMEOUT_SECONDS)
            .map(|raw| (ENV_TIMEOUT_SECONDS, raw))
            .or_else(|| {
                get(ENV_TELEGRAM_TIMEOUT_SECONDS).map(|raw| (ENV_TELEGRAM_TIMEOUT_SECONDS, raw))
            });
        if let Some((variable, raw)) = timeout {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 && secs <= MAX_TIMEOUT_SECS => self.timeout_seconds = secs,
                _ => tracing::warn!(
                    variable,
                    value = raw.as_str(),
                    "Ignoring invalid timeout override"
                ),
            }
        }
        if let Some(raw) = get(ENV_LOG_LEVEL) {
            match raw.parse::<LogLevel>() {
                Ok(level) => self.log_level = level,
                Err(e) => tracing::warn!(variable = ENV_LOG_LEVEL, "Ignoring override: {}", e),
            }
        }
        if let Some(raw) = get(ENV_FALLBACK_TO_DIALOG) {
            match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.fallback_to_dialog = true,
                "0" | "false" | "no" | "off" => self.fallback_to_dialog = false,
                _ => tracing::warn!(
                    variable = ENV_FALLBACK_TO_DIALOG,
                    value = raw.as_str(),
                    "Ignoring invalid boolean override"
                ),
            }
        }
    }

    /// Process-wide default timeout, capped at [`MAX_TIMEOUT_SECS`]
    pub fn default_timeout(&self) -> Duration {
        if self.timeout_seconds == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.timeout_seconds.min(MAX_TIMEOUT_SECS))
        }
    }

    /// Remote relay settings, present only when the provider is enabled and both the credential
    /// and the responder identity are configured.
    pub fn telegram_settings(&self) -> Option<TelegramSettings> {
        let telegram = &self.providers.telegram;
        if !telegram.enabled {
            return None;
        }
        let token = self.telegram_bot_token.clone()?;
        let chat_id = telegram
            .chat_id
            .as_ref()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())?
            .to_string();
        Some(TelegramSettings {
            token,
            chat_id,
            api_base: telegram.api_base.trim_end_matches('/').to_string(),
            poll_timeout: Duration::from_secs(telegram.poll_timeout_seconds.max(1)),
            retry_delay: Duration::from_millis(telegram.retry_delay_millis),
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.timeout_seconds == 0 {
            errors.push("timeout_seconds must be greater than 0".to_string());
        }
        if self.timeout_seconds > MAX_TIMEOUT_SECS {
            errors.push(format!("timeout_seconds must be at most {}", MAX_TIMEOUT_SECS));
        }

        let telegram = &self.providers.telegram;
        if telegram.poll_timeout_seconds == 0 || telegram.poll_timeout_seconds > 50 {
            errors.push("providers.telegram.poll_timeout_seconds must be between 1 and 50".to_string());
        }

        if let Some(chat_id) = telegram.chat_id.as_deref().filter(|c| !c.is_empty()) {
            if chat_id.trim().parse::<i64>().is_err() {
                errors.push("providers.telegram.chat_id must be a numeric chat id".to_string());
            }
        }

        if !telegram.api_base.starts_with("http://") && !telegram.api_base.starts_with("https://") {
            errors.push("providers.telegram.api_base must be an http(s) URL".to_string());
        }

        if !self.dialog.enabled && self.telegram_settings().is_none() {
            errors.push("no channel available: dialog disabled and Telegram not configured".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
