//! Equity Dossier
//!
//! Builds a one-page research dossier for an Indian listed company from a
//! free-text ticker query:
//! - Resolves the query to an exchange listing (NSE first, then BSE)
//! - Collects quote, five years of prices, news, statements and forum threads
//! - Optionally analyzes uploaded investor documents with a chat-completion model
//!
//! PIPELINE:
//! QUERY → RESOLVE → NEWS → FINANCIALS → MANAGEMENT → FORUMS → DOCUMENTS

pub mod analysis;
pub mod api;
pub mod chat;
pub mod config;
pub mod documents;
pub mod dossier;
pub mod error;
pub mod forum;
pub mod http;
pub mod market_data;
pub mod models;
pub mod news;
pub mod render;
pub mod resolver;
pub mod screener;

pub use error::Result;

// Re-export common types
pub use config::Config;
pub use dossier::DossierService;
pub use models::*;
pub use resolver::{ResolveError, TickerResolver};
