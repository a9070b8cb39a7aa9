use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token accepted as the legacy mentor. Unset disables bearer auth.
    pub mentor_token: Option<String>,
    pub legacy_mentor_id: String,
    pub agent_api_key: String,
    /// In-memory only when unset.
    pub database_path: Option<String>,
    /// Dry-run execution when unset.
    pub execution: Option<ExecutionConfig>,
    pub execution_timeout: Duration,
    /// Notifier disabled when unset.
    pub telegram: Option<TelegramConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("RELAY_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "RELAY_PORT",
                value: raw,
            })?,
            None => 8080,
        };

        let agent_api_key = var("AGENT_API_KEY").ok_or(ConfigError::Missing("AGENT_API_KEY"))?;

        let execution = match (
            var("EXECUTION_BASE_URL"),
            var("EXECUTION_API_KEY"),
            var("EXECUTION_API_SECRET"),
        ) {
            (Some(base_url), Some(api_key), Some(api_secret)) => Some(ExecutionConfig {
                base_url,
                api_key,
                api_secret,
            }),
            (None, None, None) => None,
            (None, _, _) => return Err(ConfigError::Missing("EXECUTION_BASE_URL")),
            (_, None, _) => return Err(ConfigError::Missing("EXECUTION_API_KEY")),
            (_, _, None) => return Err(ConfigError::Missing("EXECUTION_API_SECRET")),
        };

        let execution_timeout = match var("EXECUTION_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "EXECUTION_TIMEOUT_SECS",
                        value: raw,
                    });
                }
            },
            None => Duration::from_secs(10),
        };

        let telegram = match (var("TELEGRAM_BOT_TOKEN"), var("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(raw)) => {
                let chat_id = raw.parse::<i64>().map_err(|_| ConfigError::Invalid {
                    name: "TELEGRAM_CHAT_ID",
                    value: raw,
                })?;
                Some(TelegramConfig { bot_token, chat_id })
            }
            _ => None,
        };

        Ok(Self {
            host: var("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            mentor_token: var("MENTOR_TOKEN"),
            legacy_mentor_id: var("LEGACY_MENTOR_ID").unwrap_or_else(|| "legacy".into()),
            agent_api_key,
            database_path: var("DATABASE_PATH"),
            execution,
            execution_timeout,
            telegram,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
