//! Yahoo Finance market data provider.
//!
//! History comes from the `yahoo_finance_api` chart connector. Quote
//! metadata (price, 52-week range, sector) comes from the quoteSummary
//! endpoint, which needs a cookie/crumb pair. The crumb is cached on the
//! provider instance and refreshed when Yahoo answers 401.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{header, Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use urlencoding::encode;
use yahoo_finance_api as yahoo;

use super::yahoo_models::{QuoteSummaryResponse, RawValue};
use super::{MarketDataError, MarketDataProvider};
use crate::http::BROWSER_USER_AGENT;
use crate::models::{HistoryWindow, PriceBar, PriceSeries, QuoteMetadata};

const PROVIDER: &str = "YAHOO";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const QUERY_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    http: Client,
    cookie_url: String,
    crumb_url: String,
    quote_summary_url: String,
    crumb: RwLock<Option<CrumbData>>,
}

impl YahooProvider {
    pub fn new(http: Client) -> Result<Self, MarketDataError> {
        Self::with_urls(http, COOKIE_URL, QUERY_BASE_URL)
    }

    /// Point the cookie and query endpoints elsewhere. History still goes
    /// through the chart connector.
    pub fn with_urls(
        http: Client,
        cookie_url: &str,
        query_base_url: &str,
    ) -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            provider_error(format!("Failed to initialize Yahoo connector: {}", e))
        })?;
        let query_base_url = query_base_url.trim_end_matches('/');

        Ok(Self {
            connector,
            http,
            cookie_url: cookie_url.to_string(),
            crumb_url: format!("{}/v1/test/getcrumb", query_base_url),
            quote_summary_url: format!("{}/v10/finance/quoteSummary", query_base_url),
            crumb: RwLock::new(None),
        })
    }

    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let fresh = self.fetch_crumb().await?;
        *self.crumb.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        let response = self.http.get(&self.cookie_url).send().await?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| provider_error("Failed to parse Yahoo cookie".to_string()))?;

        let crumb = self
            .http
            .get(&self.crumb_url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::COOKIE, &cookie)
            .send()
            .await?
            .text()
            .await?;

        if crumb.trim().is_empty() {
            return Err(provider_error("Empty Yahoo crumb".to_string()));
        }

        Ok(CrumbData { cookie, crumb })
    }

    async fn clear_crumb(&self) {
        *self.crumb.write().await = None;
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER
    }

    async fn quote_metadata(&self, symbol: &str) -> Result<QuoteMetadata, MarketDataError> {
        let crumb = self.ensure_crumb().await?;

        let url = format!(
            "{}/{}?modules=price,summaryDetail,summaryProfile&crumb={}",
            self.quote_summary_url,
            encode(symbol),
            encode(&crumb.crumb)
        );

        debug!(symbol, "Fetching Yahoo quote summary");

        let response = self
            .http
            .get(&url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.clear_crumb().await;
            return Err(provider_error("Yahoo authentication expired".to_string()));
        }
        if !response.status().is_success() {
            return Err(MarketDataError::from_status(PROVIDER, response.status(), symbol));
        }

        let data: QuoteSummaryResponse = response.json().await.map_err(|e| {
            MarketDataError::Malformed {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            }
        })?;

        let result = data
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let price = result.price.as_ref();
        let detail = result.summary_detail.as_ref();

        Ok(QuoteMetadata {
            symbol: symbol.to_string(),
            regular_market_price: price.and_then(|p| raw_decimal(p.regular_market_price)),
            fifty_two_week_high: detail.and_then(|d| raw_decimal(d.fifty_two_week_high)),
            fifty_two_week_low: detail.and_then(|d| raw_decimal(d.fifty_two_week_low)),
            sector: result.summary_profile.and_then(|p| p.sector),
            currency: price.and_then(|p| p.currency.clone()),
            name: price.and_then(|p| p.long_name.clone().or_else(|| p.short_name.clone())),
        })
    }

    async fn price_history(
        &self,
        symbol: &str,
        window: HistoryWindow,
    ) -> Result<PriceSeries, MarketDataError> {
        let end = Utc::now();
        let start = window.start_from(end);

        debug!(symbol, days = window.days, "Fetching Yahoo price history");

        let response = self
            .connector
            .get_quote_history(symbol, to_offset_datetime(start), to_offset_datetime(end))
            .await
            .map_err(|e| map_yahoo_error(e, symbol))?;

        let quotes = response.quotes().map_err(|e| map_yahoo_error(e, symbol))?;

        let bars: Vec<PriceBar> = quotes
            .into_iter()
            .filter_map(|q| {
                let bar = to_price_bar(q.timestamp as i64, q.open, q.high, q.low, q.close);
                if bar.is_none() {
                    warn!(symbol, timestamp = q.timestamp as i64, "Skipping invalid Yahoo bar");
                }
                bar
            })
            .collect();

        Ok(PriceSeries::new(symbol, bars))
    }
}

fn provider_error(message: String) -> MarketDataError {
    MarketDataError::ProviderError {
        provider: PROVIDER.to_string(),
        message,
    }
}

fn map_yahoo_error(error: yahoo::YahooError, symbol: &str) -> MarketDataError {
    match error {
        yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult => {
            MarketDataError::NoDataForRange(symbol.to_string())
        }
        other => MarketDataError::Malformed {
            provider: PROVIDER.to_string(),
            message: other.to_string(),
        },
    }
}

fn to_offset_datetime(dt: chrono::DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub(crate) fn to_decimal(value: f64) -> Option<Decimal> {
    if value.is_finite() {
        Decimal::from_f64(value).map(|d| d.round_dp(4).normalize())
    } else {
        None
    }
}

fn raw_decimal(value: Option<RawValue>) -> Option<Decimal> {
    value.and_then(|v| v.raw).and_then(to_decimal)
}

fn to_price_bar(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Option<PriceBar> {
    let date = Utc.timestamp_opt(timestamp, 0).single()?.date_naive();
    Some(PriceBar {
        date,
        open: to_decimal(open)?,
        high: to_decimal(high)?,
        low: to_decimal(low)?,
        close: to_decimal(close)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::RetryClass;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use rust_decimal_macros::dec;

    const SUMMARY_PATH: &str = "/v10/finance/quoteSummary/INFY.NS";

    const SUMMARY_BODY: &str = r#"{
        "quoteSummary": {
            "result": [{
                "price": {
                    "currency": "INR",
                    "shortName": "INFOSYS",
                    "longName": "Infosys Limited",
                    "regularMarketPrice": {"raw": 1502.35, "fmt": "1,502.35"}
                },
                "summaryDetail": {
                    "fiftyTwoWeekHigh": {"raw": 1733.0},
                    "fiftyTwoWeekLow": {"raw": 1358.35}
                },
                "summaryProfile": {"sector": "Technology"}
            }],
            "error": null
        }
    }"#;

    /// Cookie and crumb endpoints, each expected to be hit `fetches` times.
    async fn mock_session(server: &mut ServerGuard, fetches: usize) -> (Mock, Mock) {
        let cookie = server
            .mock("GET", "/")
            .with_status(404)
            .with_header("set-cookie", "A3=d=session; Expires=Fri, 01 Jan 2027 00:00:00 GMT")
            .expect(fetches)
            .create_async()
            .await;
        let crumb = server
            .mock("GET", "/v1/test/getcrumb")
            .match_header("cookie", "A3=d=session")
            .with_status(200)
            .with_body("crumb-123")
            .expect(fetches)
            .create_async()
            .await;
        (cookie, crumb)
    }

    async fn mock_summary(
        server: &mut ServerGuard,
        status: usize,
        body: &str,
        hits: usize,
    ) -> Mock {
        server
            .mock("GET", SUMMARY_PATH)
            .match_query(Matcher::UrlEncoded("crumb".into(), "crumb-123".into()))
            .match_header("cookie", "A3=d=session")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    fn provider(server: &ServerGuard) -> YahooProvider {
        let base = server.url();
        YahooProvider::with_urls(Client::new(), &format!("{}/", base), &base).unwrap()
    }

    #[tokio::test]
    async fn test_quote_metadata_reuses_crumb() {
        let mut server = Server::new_async().await;
        let (cookie, crumb) = mock_session(&mut server, 1).await;
        let summary = mock_summary(&mut server, 200, SUMMARY_BODY, 2).await;
        let provider = provider(&server);

        let meta = provider.quote_metadata("INFY.NS").await.unwrap();
        provider.quote_metadata("INFY.NS").await.unwrap();

        assert_eq!(meta.symbol, "INFY.NS");
        assert_eq!(meta.regular_market_price, Some(dec!(1502.35)));
        assert_eq!(meta.fifty_two_week_high, Some(dec!(1733)));
        assert_eq!(meta.fifty_two_week_low, Some(dec!(1358.35)));
        assert_eq!(meta.sector.as_deref(), Some("Technology"));
        assert_eq!(meta.currency.as_deref(), Some("INR"));
        assert_eq!(meta.name.as_deref(), Some("Infosys Limited"));
        cookie.assert_async().await;
        crumb.assert_async().await;
        summary.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_clears_crumb() {
        let mut server = Server::new_async().await;
        let (cookie, crumb) = mock_session(&mut server, 2).await;
        let summary = mock_summary(&mut server, 401, "{}", 2).await;
        let provider = provider(&server);

        let first = provider.quote_metadata("INFY.NS").await.unwrap_err();
        let second = provider.quote_metadata("INFY.NS").await.unwrap_err();

        assert_eq!(first.retry_class(), RetryClass::Retry);
        assert_eq!(second.retry_class(), RetryClass::Retry);
        // the second call had to fetch a fresh cookie and crumb
        cookie.assert_async().await;
        crumb.assert_async().await;
        summary.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_symbol_is_not_found() {
        let mut server = Server::new_async().await;
        mock_session(&mut server, 1).await;
        let body = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found"}}}"#;
        mock_summary(&mut server, 404, body, 1).await;

        let err = provider(&server).quote_metadata("INFY.NS").await.unwrap_err();

        assert!(matches!(err, MarketDataError::SymbolNotFound(ref s) if s == "INFY.NS"));
        assert_eq!(err.retry_class(), RetryClass::NextCandidate);
    }

    #[tokio::test]
    async fn test_empty_price_object_is_absent() {
        let mut server = Server::new_async().await;
        mock_session(&mut server, 1).await;
        let body = r#"{"quoteSummary": {"result": [{
            "price": {"currency": "INR", "regularMarketPrice": {}}
        }], "error": null}}"#;
        mock_summary(&mut server, 200, body, 1).await;

        let meta = provider(&server).quote_metadata("INFY.NS").await.unwrap();

        assert_eq!(meta.regular_market_price, None);
        assert_eq!(meta.fifty_two_week_high, None);
        assert!(meta.sector.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = Server::new_async().await;
        mock_session(&mut server, 1).await;
        mock_summary(&mut server, 500, "upstream unavailable", 1).await;

        let err = provider(&server).quote_metadata("INFY.NS").await.unwrap_err();

        assert!(matches!(err, MarketDataError::ProviderError { .. }));
        assert_eq!(err.retry_class(), RetryClass::Retry);
    }

    #[tokio::test]
    async fn test_missing_cookie_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;

        let err = provider(&server).quote_metadata("INFY.NS").await.unwrap_err();

        assert!(err.to_string().contains("Failed to parse Yahoo cookie"));
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(to_decimal(1502.35), Some(dec!(1502.35)));
        assert_eq!(to_decimal(f64::NAN), None);
        assert_eq!(to_decimal(f64::INFINITY), None);
    }

    #[test]
    fn test_to_price_bar() {
        // 2024-01-02T03:45:00Z
        let bar = to_price_bar(1_704_167_100, 10.0, 12.5, 9.75, 11.0).unwrap();
        assert_eq!(bar.date.to_string(), "2024-01-02");
        assert_eq!(bar.high, dec!(12.5));
        assert_eq!(bar.close, dec!(11));

        assert!(to_price_bar(1_704_167_100, 10.0, f64::NAN, 9.75, 11.0).is_none());
    }

    #[test]
    fn test_map_yahoo_error() {
        let error = map_yahoo_error(yahoo::YahooError::NoQuotes, "FOO.NS");
        assert!(matches!(error, MarketDataError::NoDataForRange(_)));
    }
}
