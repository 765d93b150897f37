//! Environment-driven configuration.
//!
//! Built once at process start and passed by reference into each component;
//! nothing reads the environment after startup. Optional knobs default;
//! required credentials are checked by the entry point that needs them and
//! missing ones are fatal (exit non-zero), never silently defaulted.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ratelimit::BackoffPolicy;

/// Configuration problems, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Everything the process can be told from the outside.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage layout
    pub mentions_csv: PathBuf,
    pub ledger_file: PathBuf,
    pub last_seen_file: PathBuf,
    pub interactions_csv: PathBuf,
    pub lock_file: PathBuf,
    pub dataset_csv: PathBuf,

    // Bot identity
    pub bot_handle: String,
    pub trigger_tag: String,

    // Collaborator endpoints and credentials (checked where needed)
    pub discord_webhook_url: Option<String>,
    pub explain_api_url: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub twitter_user_id: Option<String>,

    // Tuning
    pub batch_size: usize,
    pub max_reply_length: usize,
    pub process_interval: Duration,
    pub fetch_interval: Duration,
    pub error_delay: Duration,
    pub seen_cache_cap: usize,
    pub health_port: u16,
    pub rate_limit_buffer: Duration,
    pub rate_limit_default_wait: Duration,
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// `.env` loading happens in `main` before this; here only `std::env`.
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            mentions_csv: path_var("MENTIONS_CSV", "data/mentions.csv"),
            ledger_file: path_var("LEDGER_FILE", "data/processed_ids.txt"),
            last_seen_file: path_var("LAST_SEEN_FILE", "data/last_seen_id.txt"),
            interactions_csv: path_var("INTERACTIONS_CSV", "data/interactions.csv"),
            lock_file: path_var("LOCK_FILE", "data/pipeline.lock"),
            dataset_csv: path_var("DATASET_CSV", "data/dataset.csv"),

            bot_handle: string_var("BOT_HANDLE", "eli5professor"),
            trigger_tag: string_var("TRIGGER_TAG", "eli5"),

            discord_webhook_url: optional_var("DISCORD_WEBHOOK_URL"),
            explain_api_url: optional_var("ELI5_API_URL"),
            twitter_bearer_token: optional_var("TWITTER_BEARER_TOKEN"),
            twitter_user_id: optional_var("TWITTER_USER_ID"),

            batch_size: parsed_var("BATCH_SIZE", 10)?,
            max_reply_length: parsed_var("MAX_REPLY_LENGTH", 280)?,
            process_interval: Duration::from_secs(parsed_var("PROCESS_INTERVAL_SECS", 30)?),
            fetch_interval: Duration::from_secs(parsed_var("FETCH_INTERVAL_SECS", 1200)?),
            error_delay: Duration::from_secs(parsed_var("ERROR_DELAY_SECS", 60)?),
            seen_cache_cap: parsed_var("SEEN_CACHE_CAP", 1000)?,
            health_port: parsed_var("HEALTH_PORT", 8080)?,
            rate_limit_buffer: Duration::from_secs(parsed_var("RATE_LIMIT_BUFFER_SECS", 30)?),
            rate_limit_default_wait: Duration::from_secs(parsed_var(
                "RATE_LIMIT_DEFAULT_WAIT_SECS",
                900,
            )?),
        })
    }

    /// The webhook URL, required by every entry point that delivers.
    pub fn require_webhook_url(&self) -> Result<&str> {
        self.discord_webhook_url
            .as_deref()
            .ok_or(ConfigError::Missing("DISCORD_WEBHOOK_URL"))
    }

    /// Twitter credentials, required by the entry points that fetch.
    pub fn require_twitter(&self) -> Result<(&str, &str)> {
        let token = self
            .twitter_bearer_token
            .as_deref()
            .ok_or(ConfigError::Missing("TWITTER_BEARER_TOKEN"))?;
        let user_id = self
            .twitter_user_id
            .as_deref()
            .ok_or(ConfigError::Missing("TWITTER_USER_ID"))?;
        Ok((token, user_id))
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            safety_buffer: self.rate_limit_buffer,
            default_wait: self.rate_limit_default_wait,
            ..BackoffPolicy::DEFAULT
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn string_var(name: &str, default: &str) -> String {
    optional_var(name).unwrap_or_else(|| default.to_string())
}

fn path_var(name: &str, default: &str) -> PathBuf {
    PathBuf::from(string_var(name, default))
}

fn parsed_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T> {
    match optional_var(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var mutation is process-global; these tests only exercise the
    // pure helpers and the required-field accessors.

    #[test]
    fn missing_webhook_is_a_config_error() {
        let config = Config {
            discord_webhook_url: None,
            ..test_config()
        };
        assert!(matches!(
            config.require_webhook_url(),
            Err(ConfigError::Missing("DISCORD_WEBHOOK_URL"))
        ));
    }

    #[test]
    fn partial_twitter_credentials_are_rejected() {
        let config = Config {
            twitter_bearer_token: Some("token".to_string()),
            twitter_user_id: None,
            ..test_config()
        };
        assert!(matches!(
            config.require_twitter(),
            Err(ConfigError::Missing("TWITTER_USER_ID"))
        ));
    }

    #[test]
    fn backoff_policy_uses_configured_buffer() {
        let config = Config {
            rate_limit_buffer: Duration::from_secs(45),
            ..test_config()
        };
        assert_eq!(
            config.backoff_policy().safety_buffer,
            Duration::from_secs(45)
        );
    }

    fn test_config() -> Config {
        Config {
            mentions_csv: "data/mentions.csv".into(),
            ledger_file: "data/processed_ids.txt".into(),
            last_seen_file: "data/last_seen_id.txt".into(),
            interactions_csv: "data/interactions.csv".into(),
            lock_file: "data/pipeline.lock".into(),
            dataset_csv: "data/dataset.csv".into(),
            bot_handle: "eli5professor".to_string(),
            trigger_tag: "eli5".to_string(),
            discord_webhook_url: Some("https://discord.example/webhook".to_string()),
            explain_api_url: None,
            twitter_bearer_token: None,
            twitter_user_id: None,
            batch_size: 10,
            max_reply_length: 280,
            process_interval: Duration::from_secs(30),
            fetch_interval: Duration::from_secs(1200),
            error_delay: Duration::from_secs(60),
            seen_cache_cap: 1000,
            health_port: 8080,
            rate_limit_buffer: Duration::from_secs(30),
            rate_limit_default_wait: Duration::from_secs(900),
        }
    }
}
