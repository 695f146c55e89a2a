//! Ticker resolution with exchange fallback
//!
//! A free-text query is normalized to a base symbol and qualified with each
//! configured exchange suffix in priority order. The first candidate with a
//! current price AND a non-empty price history wins. Transient provider
//! failures are retried under the injected [`RetryPolicy`]; they are never
//! surfaced individually, only the aggregate [`ResolveError::NotFound`].

pub mod retry;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::market_data::{MarketDataError, MarketDataProvider, RetryClass};
use crate::models::{Exchange, HistoryWindow, PriceSeries, Quote, QuoteMetadata};

pub use retry::{Backoff, RetryPolicy, Sleeper, TokioSleeper};

/// Trailing history requested for every candidate.
const HISTORY_WINDOW: HistoryWindow = HistoryWindow::FIVE_YEARS;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("No exchange listing found for '{query}' after {attempts} attempt(s)")]
    NotFound { query: String, attempts: usize },
}

/// A resolved listing. The quote always has a matching non-empty series.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub exchange: Exchange,
    pub base_symbol: String,
    pub quote: Quote,
    pub series: PriceSeries,
}

/// One exchange-qualified symbol to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub exchange: Exchange,
    pub symbol: String,
}

enum CandidateOutcome {
    Resolved(Box<Resolution>),
    NotFound(String),
    Transient(MarketDataError),
}

enum AttemptOutcome {
    Resolved,
    NotFound(String),
    Transient(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::NotFound(reason) => write!(f, "not found: {}", reason),
            Self::Transient(error) => write!(f, "transient: {}", error),
        }
    }
}

struct ResolutionAttempt {
    symbol: String,
    attempt: u32,
    outcome: AttemptOutcome,
}

pub struct TickerResolver {
    provider: Arc<dyn MarketDataProvider>,
    exchanges: Vec<Exchange>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl TickerResolver {
    pub fn new(provider: Arc<dyn MarketDataProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            exchanges: Exchange::PRIORITY.to_vec(),
            retry,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Override the exchange priority. Duplicates are dropped; an empty list
    /// keeps the default order.
    pub fn with_exchanges(mut self, exchanges: Vec<Exchange>) -> Self {
        let mut ordered: Vec<Exchange> = Vec::with_capacity(exchanges.len());
        for exchange in exchanges {
            if !ordered.contains(&exchange) {
                ordered.push(exchange);
            }
        }
        if !ordered.is_empty() {
            self.exchanges = ordered;
        }
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    /// Trim, uppercase and strip a known exchange suffix.
    pub fn normalize(query: &str) -> Option<String> {
        let upper = query.trim().to_uppercase();
        let base = Exchange::strip_suffix(&upper).trim();
        if base.is_empty() {
            None
        } else {
            Some(base.to_string())
        }
    }

    pub fn candidates(&self, query: &str) -> Result<(String, Vec<Candidate>), ResolveError> {
        let base = Self::normalize(query).ok_or(ResolveError::EmptyQuery)?;
        let candidates = self
            .exchanges
            .iter()
            .map(|exchange| Candidate {
                exchange: *exchange,
                symbol: exchange.qualify(&base),
            })
            .collect();
        Ok((base, candidates))
    }

    pub async fn resolve(&self, query: &str) -> Result<Resolution, ResolveError> {
        let (base, candidates) = self.candidates(query)?;
        let max_attempts = self.retry.max_attempts();
        let mut attempts: Vec<ResolutionAttempt> = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let has_next_candidate = index + 1 < candidates.len();
            // Metadata survives history retries on the same candidate.
            let mut cached_meta = None;

            for attempt in 1..=max_attempts {
                match self.try_candidate(&base, candidate, &mut cached_meta).await {
                    CandidateOutcome::Resolved(resolution) => {
                        attempts.push(ResolutionAttempt {
                            symbol: candidate.symbol.clone(),
                            attempt,
                            outcome: AttemptOutcome::Resolved,
                        });
                        log_trace(&attempts);
                        info!(
                            query,
                            symbol = %candidate.symbol,
                            bars = resolution.series.len(),
                            "Ticker resolved"
                        );
                        return Ok(*resolution);
                    }
                    CandidateOutcome::NotFound(reason) => {
                        attempts.push(ResolutionAttempt {
                            symbol: candidate.symbol.clone(),
                            attempt,
                            outcome: AttemptOutcome::NotFound(reason),
                        });
                        break;
                    }
                    CandidateOutcome::Transient(error) => {
                        debug!(
                            symbol = %candidate.symbol,
                            attempt,
                            error = %error,
                            "Transient provider failure"
                        );
                        attempts.push(ResolutionAttempt {
                            symbol: candidate.symbol.clone(),
                            attempt,
                            outcome: AttemptOutcome::Transient(error.to_string()),
                        });

                        if attempt < max_attempts || has_next_candidate {
                            self.sleeper.sleep(self.retry.pause_after(attempt)).await;
                        }
                    }
                }
            }
        }

        log_trace(&attempts);
        info!(query, attempts = attempts.len(), "Ticker not found on any exchange");

        Err(ResolveError::NotFound {
            query: query.trim().to_string(),
            attempts: attempts.len(),
        })
    }

    /// One attempt on `candidate`. Metadata fetched by an earlier attempt is
    /// taken from `cached`; it is put back when only the history call fails.
    async fn try_candidate(
        &self,
        base: &str,
        candidate: &Candidate,
        cached: &mut Option<QuoteMetadata>,
    ) -> CandidateOutcome {
        let symbol = candidate.symbol.as_str();

        let mut meta = match cached.take() {
            Some(meta) => meta,
            None => match self.provider.quote_metadata(symbol).await {
                Ok(meta) => meta,
                Err(e) => return classify(e),
            },
        };

        let Some(price) = meta.regular_market_price else {
            return CandidateOutcome::NotFound("no current price".to_string());
        };

        let series = match self.provider.price_history(symbol, HISTORY_WINDOW).await {
            Ok(series) => series,
            Err(e) => {
                *cached = Some(meta);
                return classify(e);
            }
        };

        if series.is_empty() {
            return CandidateOutcome::NotFound("empty price history".to_string());
        }

        meta.symbol = symbol.to_string();
        let quote = Quote::from_metadata(meta, price, &series);

        CandidateOutcome::Resolved(Box::new(Resolution {
            exchange: candidate.exchange,
            base_symbol: base.to_string(),
            quote,
            series,
        }))
    }
}

fn log_trace(attempts: &[ResolutionAttempt]) {
    for a in attempts {
        debug!(symbol = %a.symbol, attempt = a.attempt, outcome = %a.outcome, "Resolution attempt");
    }
}

fn classify(error: MarketDataError) -> CandidateOutcome {
    match error.retry_class() {
        RetryClass::Retry => CandidateOutcome::Transient(error),
        RetryClass::NextCandidate => CandidateOutcome::NotFound(error.to_string()),
    }
}
