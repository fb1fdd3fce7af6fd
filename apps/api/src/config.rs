use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};

/// Application configuration loaded from environment variables.
/// Startup fails if the completion credential is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub completion_endpoint: String,
    pub completion_timeout: Duration,
    /// Extra attempts for transport failures and 5xx responses. 0 = exactly-once.
    pub completion_max_retries: u32,
    /// Embed the raw candidate profile in the generated HTML fragment.
    pub expose_profile: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            completion_endpoint: std::env::var("COMPLETION_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            completion_timeout: Duration::from_secs(optional_env(
                "COMPLETION_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            completion_max_retries: optional_env("COMPLETION_MAX_RETRIES", 0)?,
            expose_profile: optional_env("EXPOSE_PROFILE", false)?,
            port: optional_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_env_falls_back_to_default() {
        let value: u32 = optional_env("TAILOR_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_optional_env_rejects_garbage() {
        std::env::set_var("TAILOR_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = optional_env("TAILOR_TEST_BAD_PORT", 8080);
        assert!(result.is_err());
    }

    #[test]
    fn test_optional_env_parses_bool() {
        std::env::set_var("TAILOR_TEST_EXPOSE", "true");
        let value: bool = optional_env("TAILOR_TEST_EXPOSE", false).unwrap();
        assert!(value);
    }

    #[test]
    fn test_require_env_missing_is_error() {
        let err = require_env("TAILOR_TEST_MISSING_KEY").unwrap_err();
        assert!(err.to_string().contains("TAILOR_TEST_MISSING_KEY"));
    }
}
