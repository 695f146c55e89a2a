//! Financial Modeling Prep provider, used when a market-data key is configured.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use urlencoding::encode;

use super::{MarketDataError, MarketDataProvider};
use crate::models::{HistoryWindow, PriceBar, PriceSeries, QuoteMetadata};

const PROVIDER: &str = "FMP";
pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/stable";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpQuoteDto {
    symbol: String,
    name: Option<String>,
    price: Option<Decimal>,
    year_high: Option<Decimal>,
    year_low: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpProfileDto {
    sector: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FmpHistoryDto {
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
}

#[derive(Clone, Debug)]
pub struct FmpProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FmpProvider {
    pub fn new(client: Client, api_key: String) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, api_key: String, base_url: &str) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn make_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        symbol: &str,
    ) -> Result<Vec<T>, MarketDataError> {
        // The key rides in the query string, so errors are stored without their URL.
        let url = format!("{}/{}&apikey={}", self.base_url, endpoint, self.api_key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.without_url()))?;

        if !response.status().is_success() {
            return Err(MarketDataError::from_status(PROVIDER, response.status(), symbol));
        }

        let text = response
            .text()
            .await
            .map_err(|e| MarketDataError::Network(e.without_url()))?;
        serde_json::from_str::<Vec<T>>(&text).map_err(|e| MarketDataError::Malformed {
            provider: PROVIDER.to_string(),
            message: format!("{}: {}", e, text.chars().take(120).collect::<String>()),
        })
    }

    async fn profile(&self, symbol: &str) -> Option<FmpProfileDto> {
        let endpoint = format!("profile?symbol={}", encode(symbol));
        match self.make_request::<FmpProfileDto>(&endpoint, symbol).await {
            Ok(profiles) => profiles.into_iter().next(),
            Err(e) => {
                debug!(symbol, error = %e, "FMP profile unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for FmpProvider {
    fn id(&self) -> &'static str {
        PROVIDER
    }

    async fn quote_metadata(&self, symbol: &str) -> Result<QuoteMetadata, MarketDataError> {
        let endpoint = format!("quote?symbol={}", encode(symbol));
        let quote = self
            .make_request::<FmpQuoteDto>(&endpoint, symbol)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let profile = self.profile(symbol).await;

        Ok(QuoteMetadata {
            symbol: quote.symbol,
            regular_market_price: quote.price,
            fifty_two_week_high: quote.year_high,
            fifty_two_week_low: quote.year_low,
            sector: profile.as_ref().and_then(|p| p.sector.clone()),
            currency: profile.and_then(|p| p.currency),
            name: quote.name,
        })
    }

    async fn price_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
    ) -> Result<PriceSeries, MarketDataError> {
        let end = Utc::now();
        let start = window.start_from(end);
        let endpoint = format!(
            "historical-price-eod/full?symbol={}&from={}&to={}",
            encode(symbol),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let bars = self
            .make_request::<FmpHistoryDto>(&endpoint, symbol)
            .await?
            .into_iter()
            .map(|dto| PriceBar {
                date: dto.date,
                open: dto.open,
                high: dto.high,
                low: dto.low,
                close: dto.close,
            })
            .collect();

        Ok(PriceSeries::new(symbol, bars))
    }
}
