//! Core data models for the equity dossier

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Exchange =================
//

/// Exchange listing a base symbol can be qualified with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// National Stock Exchange of India (primary)
    Nse,
    /// Bombay Stock Exchange (secondary)
    Bse,
}

impl Exchange {
    /// Default resolution order: primary listing before secondary.
    pub const PRIORITY: [Exchange; 2] = [Exchange::Nse, Exchange::Bse];

    pub fn suffix(&self) -> &'static str {
        match self {
            Exchange::Nse => ".NS",
            Exchange::Bse => ".BO",
        }
    }

    pub fn qualify(&self, base_symbol: &str) -> String {
        format!("{}{}", base_symbol, self.suffix())
    }

    /// Strip any known exchange suffix, returning the base symbol.
    pub fn strip_suffix(symbol: &str) -> &str {
        Self::PRIORITY
            .iter()
            .find_map(|exchange| symbol.strip_suffix(exchange.suffix()))
            .unwrap_or(symbol)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Nse => write!(f, "NSE"),
            Exchange::Bse => write!(f, "BSE"),
        }
    }
}

//
// ================= Quote & Prices =================
//

/// Quote metadata as reported by a provider, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuoteMetadata {
    pub symbol: String,
    pub regular_market_price: Option<Decimal>,
    pub fifty_two_week_high: Option<Decimal>,
    pub fifty_two_week_low: Option<Decimal>,
    pub sector: Option<String>,
    pub currency: Option<String>,
    pub name: Option<String>,
}

/// Snapshot of current price and trading range for a resolved listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub fifty_two_week_high: Decimal,
    pub fifty_two_week_low: Decimal,
    pub sector: Option<String>,
    pub currency: Option<String>,
    pub name: Option<String>,
}

impl Quote {
    /// Build a quote from validated metadata. Missing 52-week bounds are
    /// derived from the trailing year of `series`.
    pub fn from_metadata(meta: QuoteMetadata, price: Decimal, series: &PriceSeries) -> Self {
        let (derived_high, derived_low) = series.trailing_range(Duration::days(365));

        Self {
            symbol: meta.symbol,
            price,
            fifty_two_week_high: meta.fifty_two_week_high.or(derived_high).unwrap_or(price),
            fifty_two_week_low: meta.fifty_two_week_low.or(derived_low).unwrap_or(price),
            sector: meta.sector.filter(|s| !s.trim().is_empty()),
            currency: meta.currency,
            name: meta.name,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Daily bars for one listing, ascending by date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> impl Iterator<Item = (NaiveDate, Decimal)> + '_ {
        self.bars.iter().map(|bar| (bar.date, bar.close))
    }

    /// Highest high and lowest low over `window` ending at the last bar.
    pub fn trailing_range(&self, window: Duration) -> (Option<Decimal>, Option<Decimal>) {
        let Some(last) = self.bars.last() else {
            return (None, None);
        };
        let cutoff = last.date - window;

        self.bars
            .iter()
            .filter(|bar| bar.date > cutoff)
            .fold((None, None), |(high, low), bar| {
                (
                    Some(high.map_or(bar.high, |h: Decimal| h.max(bar.high))),
                    Some(low.map_or(bar.low, |l: Decimal| l.min(bar.low))),
                )
            })
    }
}

/// Trailing lookback for historical prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub days: i64,
}

impl HistoryWindow {
    pub const FIVE_YEARS: HistoryWindow = HistoryWindow { days: 1825 };

    pub fn start_from(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        end - Duration::days(self.days)
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::FIVE_YEARS
    }
}

//
// ================= Sections =================
//

/// A dossier part that degrades to a placeholder instead of failing the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Unavailable(String),
}

impl<T> Section<T> {
    pub fn from_result<E: fmt::Display>(result: Result<T, E>, label: &str) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e) => {
                tracing::warn!(section = label, error = %e, "Section unavailable");
                Section::Unavailable(format!("{} unavailable: {}", label, e))
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Unavailable(_) => None,
        }
    }
}

//
// ================= News & Forums =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsFeedSection {
    pub source: String,
    pub items: Section<Vec<NewsItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForumSource {
    ValuePickr,
    Reddit { subreddit: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForumThread {
    pub source: ForumSource,
    pub title: String,
    pub url: String,
    pub published: DateTime<Utc>,
    pub replies: u64,
    pub score: Option<i64>,
}

//
// ================= Financial Statements =================
//

/// Statement tables on the company page, in page order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    QuarterlyResults,
    ProfitAndLoss,
    BalanceSheet,
    CashFlow,
    Ratios,
    Shareholding,
}

impl StatementKind {
    pub const ALL: [StatementKind; 6] = [
        StatementKind::QuarterlyResults,
        StatementKind::ProfitAndLoss,
        StatementKind::BalanceSheet,
        StatementKind::CashFlow,
        StatementKind::Ratios,
        StatementKind::Shareholding,
    ];

    /// Position of the table among `table.data-table` elements.
    pub fn table_index(&self) -> usize {
        match self {
            StatementKind::QuarterlyResults => 0,
            StatementKind::ProfitAndLoss => 1,
            StatementKind::BalanceSheet => 2,
            StatementKind::CashFlow => 3,
            StatementKind::Ratios => 4,
            StatementKind::Shareholding => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StatementKind::QuarterlyResults => "Quarterly Results",
            StatementKind::ProfitAndLoss => "Profit & Loss",
            StatementKind::BalanceSheet => "Balance Sheet",
            StatementKind::CashFlow => "Cash Flows",
            StatementKind::Ratios => "Ratios",
            StatementKind::Shareholding => "Shareholding Pattern",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinancialTable {
    pub kind: StatementKind,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialSection {
    pub kind: StatementKind,
    pub table: Section<FinancialTable>,
}

//
// ================= Documents =================
//

/// An uploaded investor document, read wholesale into memory.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentAnalysis {
    pub file_name: String,
    pub sha256: String,
    pub management_summary: String,
    pub integrity_matrix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum DocumentsSection {
    NotRequested,
    KeyMissing(String),
    Analyzed(Vec<DocumentAnalysis>),
}

//
// ================= Dossier =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dossier {
    pub dossier_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub query: String,
    pub symbol: String,
    pub base_symbol: String,
    pub exchange: Exchange,
    pub quote: Quote,
    pub history: PriceSeries,
    pub sector_news: Section<Vec<NewsItem>>,
    pub news: Vec<NewsFeedSection>,
    pub financials: Vec<FinancialSection>,
    pub management: Section<Vec<String>>,
    pub valuepickr_threads: Section<Vec<ForumThread>>,
    pub reddit_threads: Section<Vec<ForumThread>>,
    pub documents: DocumentsSection,
    pub forum_search_url: String,
}
