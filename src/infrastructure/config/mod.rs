//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::runner::RunnerOptions;
use crate::infrastructure::adapters::retry::RetryPolicy;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub dispatch: DispatchConfig,
    pub security: SecurityConfig,
    pub adapters: AdaptersConfig,
    pub whitelist: WhitelistConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
    /// Drop messages from other bots
    pub ignore_bots: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DispatchConfig {
    /// Default handler deadline; unset means handlers may run indefinitely
    pub handler_timeout_ms: Option<u64>,
    pub sink_retry: SinkRetryConfig,
    pub reconnect_delay_ms: u64,
    /// 0 keeps polling forever
    pub max_consecutive_errors: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SinkRetryConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_seconds: u64,
}

/// Whitelist configuration for user access control
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WhitelistConfig {
    pub enabled: bool,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdaptersConfig {
    pub telegram: Option<TelegramConfig>,
    pub console: Option<ConsoleConfig>,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TelegramConfig {
    pub enabled: bool,
    /// Prefer the BOT_TOKEN environment variable over writing this to disk
    pub token: Option<String>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

// Tokens must never reach the logs
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("enabled", &self.enabled)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("poll_timeout_seconds", &self.poll_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub channel_id: String,
    pub user_id: String,
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "ping-bot".to_string(),
            prefix: "!".to_string(),
            ignore_bots: true,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: None,
            sink_retry: SinkRetryConfig::default(),
            reconnect_delay_ms: 5000,
            max_consecutive_errors: 0,
        }
    }
}

impl Default for SinkRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 500,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_requests: 20,
            window_seconds: 60,
        }
    }
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            telegram: Some(TelegramConfig {
                enabled: false,
                token: None,
                poll_timeout_seconds: default_poll_timeout(),
            }),
            console: Some(ConsoleConfig {
                enabled: true,
                channel_id: "console".to_string(),
                user_id: "local".to_string(),
            }),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            dispatch: DispatchConfig::default(),
            security: SecurityConfig::default(),
            adapters: AdaptersConfig::default(),
            whitelist: WhitelistConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply BOT_TOKEN, BOT_PREFIX and BOT_NAME overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.is_empty()) {
            let tg = self.adapters.telegram.get_or_insert_with(|| TelegramConfig {
                enabled: false,
                token: None,
                poll_timeout_seconds: default_poll_timeout(),
            });
            tg.token = Some(token);
            tg.enabled = true;
        }

        if let Some(prefix) = lookup("BOT_PREFIX").filter(|p| !p.is_empty()) {
            self.bot.prefix = prefix;
        }

        if let Some(name) = lookup("BOT_NAME").filter(|n| !n.is_empty()) {
            self.bot.name = name;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be empty".to_string()));
        }
        if self.bot.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue("bot.prefix must not contain whitespace".to_string()));
        }
        if self.security.rate_limit.enabled && self.security.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue("security.rate-limit.max-requests must be positive".to_string()));
        }
        Ok(())
    }

    /// Telegram token, when the adapter is enabled and a token is present
    pub fn telegram_token(&self) -> Option<&str> {
        self.adapters.telegram.as_ref()
            .filter(|t| t.enabled)
            .and_then(|t| t.token.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.dispatch.handler_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.dispatch.sink_retry.max_retries,
            backoff: Duration::from_millis(self.dispatch.sink_retry.backoff_ms),
        }
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            reconnect_delay: Duration::from_millis(self.dispatch.reconnect_delay_ms),
            max_consecutive_errors: self.dispatch.max_consecutive_errors,
        }
    }
}
