//! Environment-driven configuration.

use crate::error::ConfigError;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token.
    pub bot_token: String,
    /// Chat id of the support supergroup housing all topics.
    pub support_group_id: i64,
    /// Path to the SQLite database file.
    pub db_path: String,
}

impl Config {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;

        let raw_group_id = std::env::var("SUPPORT_GROUP_ID")
            .map_err(|_| ConfigError::MissingEnvVar("SUPPORT_GROUP_ID".into()))?;
        let support_group_id = parse_chat_id(&raw_group_id)?;

        let db_path =
            std::env::var("RELAY_DB_PATH").unwrap_or_else(|_| "./data/relay.db".to_string());

        Ok(Self {
            bot_token,
            support_group_id,
            db_path,
        })
    }
}

/// Parse a chat id. Supergroup ids are negative (-100... prefix).
fn parse_chat_id(raw: &str) -> Result<i64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: "SUPPORT_GROUP_ID".into(),
        message: format!("expected a numeric chat id, got {raw:?}"),
    })
}
