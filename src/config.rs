use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub telegram: TelegramConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Endpoint serving the raw schedule payload (acquisition adapter output).
    pub schedule_url: String,
    /// Optional endpoint serving the historical daily schedules.
    pub history_url: Option<String>,
    /// Total per-request timeout for fetch calls.
    pub fetch_timeout_seconds: u64,
    /// How long a fetched document is served from cache before a refresh.
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How often the refresh/change-detection worker wakes up.
    pub refresh_poll_seconds: u64,
    /// Reminder scan period; must not exceed one minute so an exact
    /// lead-time match cannot be skipped over.
    pub reminder_tick_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Well-known location where the refreshed document is persisted for
    /// downstream adapters.
    pub schedule_file: String,
    pub history_file: String,
    pub subscriptions_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            source: SourceConfig {
                schedule_url: env::var("SCHEDULE_URL")
                    .map_err(|_| ConfigError::MissingEnv("SCHEDULE_URL".to_string()))?,
                history_url: env::var("HISTORY_URL").ok(),
                fetch_timeout_seconds: env::var("FETCH_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
                cache_ttl_seconds: env::var("SCHEDULE_CACHE_TTL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            },
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            },
            scheduler: SchedulerConfig {
                refresh_poll_seconds: env::var("REFRESH_POLL_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                reminder_tick_seconds: {
                    let secs: u64 = env::var("REMINDER_TICK_SECONDS")
                        .unwrap_or_else(|_| "30".to_string())
                        .parse()
                        .unwrap_or(30);
                    if secs == 0 || secs > 60 {
                        return Err(ConfigError::InvalidValue(
                            "REMINDER_TICK_SECONDS".to_string(),
                        ));
                    }
                    secs
                },
            },
            storage: StorageConfig {
                schedule_file: env::var("SCHEDULE_FILE")
                    .unwrap_or_else(|_| "data/schedule.json".to_string()),
                history_file: env::var("HISTORY_FILE")
                    .unwrap_or_else(|_| "data/history.json".to_string()),
                subscriptions_file: env::var("SUBSCRIPTIONS_FILE")
                    .unwrap_or_else(|_| "data/subscriptions.json".to_string()),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: SourceConfig {
                schedule_url: "http://localhost:8000/schedule.json".to_string(),
                history_url: None,
                fetch_timeout_seconds: 30,
                cache_ttl_seconds: 300,
            },
            telegram: TelegramConfig { bot_token: None },
            scheduler: SchedulerConfig {
                refresh_poll_seconds: 60,
                reminder_tick_seconds: 30,
            },
            storage: StorageConfig {
                schedule_file: "data/schedule.json".to_string(),
                history_file: "data/history.json".to_string(),
                subscriptions_file: "data/subscriptions.json".to_string(),
            },
        }
    }
}
