//! Environment-based configuration

use std::time::Duration;

use crate::chat;
use crate::error::{DossierError, Result};
use crate::resolver::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Chat-completion key; `None` disables document analysis.
    pub chat_api_key: Option<String>,
    pub chat_base_url: String,
    pub chat_model: String,
    /// Selects the FMP provider when present, Yahoo otherwise.
    pub market_data_api_key: Option<String>,
    pub port: u16,
    pub resolver_max_attempts: u32,
    pub resolver_retry_pause: Duration,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat_api_key: None,
            chat_base_url: chat::DEFAULT_BASE_URL.to_string(),
            chat_model: chat::DEFAULT_MODEL.to_string(),
            market_data_api_key: None,
            port: 8080,
            resolver_max_attempts: 3,
            resolver_retry_pause: Duration::from_millis(1000),
            http_timeout: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            chat_api_key: value("PPLX_API_KEY"),
            chat_base_url: value("CHAT_API_BASE_URL").unwrap_or(defaults.chat_base_url),
            chat_model: value("CHAT_MODEL").unwrap_or(defaults.chat_model),
            market_data_api_key: value("MARKET_DATA_API_KEY"),
            port: match value("PORT").or_else(|| value("API_PORT")) {
                Some(raw) => parse("PORT", &raw)?,
                None => defaults.port,
            },
            resolver_max_attempts: match value("RESOLVER_MAX_ATTEMPTS") {
                Some(raw) => parse("RESOLVER_MAX_ATTEMPTS", &raw)?,
                None => defaults.resolver_max_attempts,
            },
            resolver_retry_pause: match value("RESOLVER_RETRY_PAUSE_MS") {
                Some(raw) => Duration::from_millis(parse("RESOLVER_RETRY_PAUSE_MS", &raw)?),
                None => defaults.resolver_retry_pause,
            },
            http_timeout: match value("HTTP_TIMEOUT_SECS") {
                Some(raw) => Duration::from_secs(parse("HTTP_TIMEOUT_SECS", &raw)?),
                None => defaults.http_timeout,
            },
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.resolver_max_attempts, self.resolver_retry_pause)
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| DossierError::Config(format!("{} has invalid value '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.chat_model, "sonar-pro");
        assert_eq!(config.chat_base_url, "https://api.perplexity.ai");
        assert_eq!(config.resolver_max_attempts, 3);
        assert_eq!(config.resolver_retry_pause, Duration::from_secs(1));
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(config.chat_api_key.is_none());
        assert!(config.market_data_api_key.is_none());
    }

    #[test]
    fn test_empty_secrets_are_absent() {
        let config = config(&[("PPLX_API_KEY", "  "), ("MARKET_DATA_API_KEY", "")]).unwrap();
        assert!(config.chat_api_key.is_none());
        assert!(config.market_data_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PPLX_API_KEY", "pplx-123"),
            ("API_PORT", "9000"),
            ("RESOLVER_MAX_ATTEMPTS", "5"),
            ("RESOLVER_RETRY_PAUSE_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.chat_api_key.as_deref(), Some("pplx-123"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.retry_policy().max_attempts(), 5);
        assert_eq!(config.retry_policy().pause_after(1), Duration::from_millis(250));
    }

    #[test]
    fn test_port_takes_precedence() {
        let config = config(&[("PORT", "3000"), ("API_PORT", "9000")]).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_invalid_number() {
        let err = config(&[("HTTP_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, DossierError::Config(_)));
    }
}
