//! Market-data provider seam
//!
//! Providers answer two questions for an exchange-qualified symbol:
//! current quote metadata and the trailing daily price series.
//! Errors carry a retry classification so the resolver can tell
//! "try again" from "give up on this listing".

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{HistoryWindow, PriceSeries, QuoteMetadata};

pub mod fmp;
pub mod yahoo;
mod yahoo_models;

pub use fmp::FmpProvider;
pub use yahoo::YahooProvider;

/// How the resolver should react to a provider error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure; the same symbol may succeed on another attempt.
    Retry,
    /// The listing does not exist or has no data; move to the next candidate.
    NextCandidate,
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data for range: {0}")]
    NoDataForRange(String),

    #[error("Rate limited: {provider}")]
    RateLimited { provider: String },

    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    #[error("Malformed response from {provider}: {message}")]
    Malformed { provider: String, message: String },

    #[error("Provider error: {provider} - {message}")]
    ProviderError { provider: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::SymbolNotFound(_) | Self::NoDataForRange(_) => RetryClass::NextCandidate,

            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Malformed { .. }
            | Self::ProviderError { .. }
            | Self::Network(_) => RetryClass::Retry,
        }
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, symbol: &str) -> Self {
        match status.as_u16() {
            404 => Self::SymbolNotFound(symbol.to_string()),
            429 => Self::RateLimited {
                provider: provider.to_string(),
            },
            408 | 504 => Self::Timeout {
                provider: provider.to_string(),
            },
            _ => Self::ProviderError {
                provider: provider.to_string(),
                message: format!("HTTP {}", status),
            },
        }
    }
}

/// Source of quotes and price history (black-box upstream).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn id(&self) -> &'static str;

    async fn quote_metadata(&self, symbol: &str) -> Result<QuoteMetadata, MarketDataError>;

    async fn price_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
    ) -> Result<PriceSeries, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_moves_to_next_candidate() {
        let error = MarketDataError::SymbolNotFound("FOO.NS".to_string());
        assert_eq!(error.retry_class(), RetryClass::NextCandidate);

        let error = MarketDataError::NoDataForRange("FOO.NS".to_string());
        assert_eq!(error.retry_class(), RetryClass::NextCandidate);
    }

    #[test]
    fn test_transient_errors_retry() {
        let error = MarketDataError::Malformed {
            provider: "YAHOO".to_string(),
            message: "expected value at line 1".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retry);

        let error = MarketDataError::Timeout {
            provider: "FMP".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retry);
    }

    #[test]
    fn test_from_status() {
        let error =
            MarketDataError::from_status("FMP", reqwest::StatusCode::NOT_FOUND, "FOO.NS");
        assert!(matches!(error, MarketDataError::SymbolNotFound(ref s) if s == "FOO.NS"));

        let error =
            MarketDataError::from_status("FMP", reqwest::StatusCode::TOO_MANY_REQUESTS, "FOO.NS");
        assert_eq!(error.retry_class(), RetryClass::Retry);
        assert_eq!(error.to_string(), "Rate limited: FMP");
    }
}
