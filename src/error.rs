//! Error types for the equity dossier service

use thiserror::Error;

use crate::documents::DocumentError;
use crate::market_data::MarketDataError;
use crate::resolver::ResolveError;

/// Result type alias for dossier operations
pub type Result<T> = std::result::Result<T, DossierError>;

#[derive(Error, Debug)]
pub enum DossierError {

    // =============================
    // Pipeline Errors
    // =============================

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl DossierError {
    /// True when no exchange listing matched the query.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Resolve(ResolveError::NotFound { .. }))
    }

    /// True when the caller sent something unusable (blank query, bad upload).
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::Resolve(ResolveError::EmptyQuery)
                | Self::InvalidRequest(_)
                | Self::Document(DocumentError::UnsupportedFormat(_))
        )
    }
}
