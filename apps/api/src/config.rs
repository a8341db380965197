use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::llm_client::DEFAULT_MODEL;
use crate::ratelimit::FailureMode;
use crate::sanitize::WebsiteMode;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or any value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub port: u16,
    pub rust_log: String,
    /// Unset means counters live in process memory.
    pub redis_url: Option<String>,
    pub rate_limit_fail_mode: FailureMode,
    pub ingest_rate_limit: u64,
    pub careers_rate_limit: u64,
    pub rate_limit_window: Duration,
    pub fetch_max_bytes: usize,
    pub fetch_timeout: Duration,
    pub fetch_allowed_hosts: Vec<String>,
    pub extract_timeout: Duration,
    pub website_mode: WebsiteMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env { lookup: &lookup };

        Ok(Config {
            anthropic_api_key: env.require("ANTHROPIC_API_KEY")?,
            anthropic_model: env.or("ANTHROPIC_MODEL", DEFAULT_MODEL),
            port: env.parse_or("PORT", 8080)?,
            rust_log: env.or("RUST_LOG", "info"),
            redis_url: env.get("REDIS_URL"),
            rate_limit_fail_mode: env.parse_with("RATE_LIMIT_FAIL_MODE", FailureMode::Closed)?,
            ingest_rate_limit: env.parse_or("INGEST_RATE_LIMIT", 10)?,
            careers_rate_limit: env.parse_or("CAREERS_RATE_LIMIT", 5)?,
            rate_limit_window: Duration::from_secs(positive(
                "RATE_LIMIT_WINDOW_SECS",
                env.parse_or("RATE_LIMIT_WINDOW_SECS", 3600)?,
            )?),
            fetch_max_bytes: env.parse_or("FETCH_MAX_BYTES", 10 * 1024 * 1024)?,
            fetch_timeout: Duration::from_secs(positive(
                "FETCH_TIMEOUT_SECS",
                env.parse_or("FETCH_TIMEOUT_SECS", 15)?,
            )?),
            fetch_allowed_hosts: env
                .get("FETCH_ALLOWED_HOSTS")
                .map(|hosts| split_hosts(&hosts))
                .unwrap_or_default(),
            extract_timeout: Duration::from_secs(positive(
                "EXTRACT_TIMEOUT_SECS",
                env.parse_or("EXTRACT_TIMEOUT_SECS", 30)?,
            )?),
            website_mode: env.parse_with("REDACT_WEBSITES", WebsiteMode::Strict)?,
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Blank values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'")),
            None => Ok(default),
        }
    }

    /// For the crate's own enums, whose parse errors are plain messages.
    fn parse_with<T: FromStr<Err = String>>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Some(raw) => raw.parse::<T>().map_err(|e| anyhow!("{key}: {e}")),
            None => Ok(default),
        }
    }
}

fn positive(key: &str, secs: u64) -> Result<u64> {
    if secs == 0 {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(secs)
}

fn split_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let config = load(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.anthropic_model, DEFAULT_MODEL);
        assert_eq!(config.port, 8080);
        assert!(config.redis_url.is_none());
        assert_eq!(config.rate_limit_fail_mode, FailureMode::Closed);
        assert_eq!(config.ingest_rate_limit, 10);
        assert_eq!(config.careers_rate_limit, 5);
        assert_eq!(config.rate_limit_window, Duration::from_secs(3600));
        assert_eq!(config.fetch_max_bytes, 10 * 1024 * 1024);
        assert!(config.fetch_allowed_hosts.is_empty());
        assert_eq!(config.website_mode, WebsiteMode::Strict);
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_overrides_parse() {
        let config = load(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("REDIS_URL", "redis://cache:6379"),
            ("RATE_LIMIT_FAIL_MODE", "open"),
            ("INGEST_RATE_LIMIT", "3"),
            ("FETCH_ALLOWED_HOSTS", " upcdn.io, Files.Example.com ,"),
            ("REDACT_WEBSITES", "off"),
        ])
        .unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.rate_limit_fail_mode, FailureMode::Open);
        assert_eq!(config.ingest_rate_limit, 3);
        assert_eq!(
            config.fetch_allowed_hosts,
            vec!["upcdn.io".to_string(), "files.example.com".to_string()]
        );
        assert_eq!(config.website_mode, WebsiteMode::Off);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = load(&[("ANTHROPIC_API_KEY", "k"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = load(&[("ANTHROPIC_API_KEY", "k"), ("RATE_LIMIT_FAIL_MODE", "maybe")])
            .unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_FAIL_MODE"));

        let err = load(&[("ANTHROPIC_API_KEY", "k"), ("RATE_LIMIT_WINDOW_SECS", "0")])
            .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
