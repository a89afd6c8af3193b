pub mod runtime;

pub use runtime::RuntimeSettings;

use std::env;

const DEFAULT_FEED_BASE_URL: &str = "https://feed.example.com/api";
const DEFAULT_FEED_STREAM_URL: &str = "wss://feed.example.com/stream";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Feed
    pub feed_base_url: String,
    pub feed_stream_url: String,
    pub feed_channel: String,
    pub stream_enabled: bool,
    pub stream_max_reconnect_attempts: u32,

    // Background tasks
    pub backstop_interval_secs: u64,
    pub config_reload_interval_secs: u64,
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            feed_base_url: env::var("FEED_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_FEED_BASE_URL.into()),
            feed_stream_url: env::var("FEED_STREAM_URL")
                .unwrap_or_else(|_| DEFAULT_FEED_STREAM_URL.into()),
            feed_channel: env::var("FEED_CHANNEL").unwrap_or_else(|_| "double".into()),
            stream_enabled: env::var("STREAM_ENABLED")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(true),
            stream_max_reconnect_attempts: env::var("STREAM_MAX_RECONNECT_ATTEMPTS")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .unwrap_or(20),

            backstop_interval_secs: env::var("BACKSTOP_INTERVAL_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .unwrap_or(10),
            config_reload_interval_secs: env::var("CONFIG_RELOAD_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}
