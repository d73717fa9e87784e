//! Gateway configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `RELOVED_CART_API_URL` - Base URL of the marketplace API (http/https)
//!
//! ## Optional
//! - `RELOVED_CART_API_TIMEOUT_SECS` - Per-request timeout in seconds
//!   (default: 10)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const ENV_BASE_URL: &str = "RELOVED_CART_API_URL";
const ENV_TIMEOUT: &str = "RELOVED_CART_API_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Remote cart gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the marketplace API; `/cart` routes hang off it.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create a configuration with the default timeout.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw = std::env::var(ENV_BASE_URL)
            .map_err(|_| ConfigError::MissingEnvVar(ENV_BASE_URL.to_string()))?;
        let base_url = parse_base_url(&raw)?;

        let timeout = match std::env::var(ENV_TIMEOUT) {
            Ok(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar(ENV_TIMEOUT.to_string(), e.to_string())
            })?),
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self { base_url, timeout })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar(ENV_BASE_URL.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            ENV_BASE_URL.to_string(),
            format!("unsupported scheme: {}", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            ENV_BASE_URL.to_string(),
            "URL cannot be a base".to_string(),
        ));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_accepts_http_and_https() {
        assert!(parse_base_url("https://api.reloved.shop").is_ok());
        assert!(parse_base_url("http://localhost:4000/v1").is_ok());
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://api.reloved.shop").is_err());
        assert!(parse_base_url("data:text/plain,cart").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_default_timeout() {
        let url = parse_base_url("https://api.reloved.shop").expect("valid url");
        let config = GatewayConfig::new(url);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }
}
