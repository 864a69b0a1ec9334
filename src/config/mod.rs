use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
    pub redis_pool_size: usize,
    pub redis_max_retries: usize,
    pub redis_idle_timeout_secs: u64,
    pub rate_limit_window_secs: u64,
    pub max_visit_count: i64,
    pub server_host: String,
    pub server_port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value {value:?} for {key}")]
    InvalidVar { key: &'static str, value: String },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn parse_env<T: FromStr>(key: &'static str, fallback: &str) -> Result<T, ConfigError> {
    let value = env_or(key, fallback);
    value
        .parse()
        .map_err(|_| ConfigError::InvalidVar { key, value })
}

impl Config {
    /// Loads configuration from the environment (and `.env` when present).
    /// Absent variables fall back to defaults; malformed values are fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let config = Config {
            redis_addr: env::var("REDIS_ADDR")
                .map_err(|_| ConfigError::MissingVar("REDIS_ADDR"))?,
            redis_password: env_or("REDIS_PASSWD", ""),
            redis_db: parse_env("REDIS_DB", "0")?,
            redis_pool_size: parse_env("REDIS_POOL_SIZE", "10")?,
            redis_max_retries: parse_env("REDIS_MAX_RETRIES", "3")?,
            redis_idle_timeout_secs: parse_env("REDIS_IDLE_TIMEOUT", "60")?,
            rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW", "3600")?,
            max_visit_count: parse_env("MAX_VISIT_COUNT", "1000")?,
            server_host: env_or("SERVER_HOST", "0.0.0.0"),
            server_port: parse_env("PORT", "8080")?,
        };

        if config.rate_limit_window_secs == 0 {
            return Err(ConfigError::NotPositive("RATE_LIMIT_WINDOW"));
        }
        if config.max_visit_count <= 0 {
            return Err(ConfigError::NotPositive("MAX_VISIT_COUNT"));
        }
        if config.redis_pool_size == 0 {
            return Err(ConfigError::NotPositive("REDIS_POOL_SIZE"));
        }

        Ok(config)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn redis_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_idle_timeout_secs)
    }
}
