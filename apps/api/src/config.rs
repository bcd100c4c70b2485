use std::time::Duration;

use anyhow::{Context, Result};

use crate::curriculum::scheduler::{SchedulerSettings, DEFAULT_DEBOUNCE_MS};
use crate::layout::pagination::UnitEstimates;

const DEFAULT_DRAFT_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_MEDIA_URL_TTL_SECS: u64 = 15 * 60;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Quiet period after an edit before the pagination pass runs.
    pub pagination_debounce_ms: u64,
    pub draft_ttl_secs: u64,
    pub media_url_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            pagination_debounce_ms: env_parse("PAGINATION_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS),
            draft_ttl_secs: env_parse("DRAFT_TTL_SECS", DEFAULT_DRAFT_TTL_SECS),
            media_url_ttl_secs: env_parse("MEDIA_URL_TTL_SECS", DEFAULT_MEDIA_URL_TTL_SECS),
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            debounce: Duration::from_millis(self.pagination_debounce_ms),
            estimates: UnitEstimates::default(),
        }
    }

    pub fn media_url_ttl(&self) -> Duration {
        Duration::from_secs(self.media_url_ttl_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Optional numeric setting; unset or unparsable values fall back to `default`.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_missing_returns_default() {
        let val: u64 = env_parse("__COURSEBUILDER_TEST_MISSING__", 150);
        assert_eq!(val, 150);
    }

    #[test]
    fn test_env_parse_invalid_returns_default() {
        std::env::set_var("__COURSEBUILDER_TEST_INVALID__", "soon");
        let val: u64 = env_parse("__COURSEBUILDER_TEST_INVALID__", 150);
        assert_eq!(val, 150);
        std::env::remove_var("__COURSEBUILDER_TEST_INVALID__");
    }

    #[test]
    fn test_env_parse_valid_value() {
        std::env::set_var("__COURSEBUILDER_TEST_VALID__", "40");
        let val: u64 = env_parse("__COURSEBUILDER_TEST_VALID__", 150);
        assert_eq!(val, 40);
        std::env::remove_var("__COURSEBUILDER_TEST_VALID__");
    }
}
