//! Financial-statement tables and management names from screener.in.
//!
//! The company page lists its statements as `table.data-table` elements in a
//! fixed order; a statement is addressed by its position on the page.

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use urlencoding::encode;

use crate::http::{fetch_text, ScrapeError};
use crate::models::{FinancialTable, StatementKind};

pub const DEFAULT_BASE_URL: &str = "https://www.screener.in";
pub const MANAGEMENT_LIMIT: usize = 5;
pub const NO_MANAGEMENT_DATA: &str = "No management data found.";

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Parse {
        what: format!("selector '{}'", css),
        message: e.to_string(),
    })
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the `kind` table from a consolidated company page.
pub fn parse_statement_table(
    html: &str,
    kind: StatementKind,
) -> Result<FinancialTable, ScrapeError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table.data-table")?;
    let header_selector = selector("thead th")?;
    let row_selector = selector("tbody tr")?;
    let cell_selector = selector("td")?;

    let table = document
        .select(&table_selector)
        .nth(kind.table_index())
        .ok_or_else(|| {
            ScrapeError::Missing(format!("{} table not found on page", kind.title()))
        })?;

    let headers = table.select(&header_selector).map(cell_text).collect();
    let rows: Vec<Vec<String>> = table
        .select(&row_selector)
        .map(|row| row.select(&cell_selector).map(cell_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();

    Ok(FinancialTable {
        kind,
        headers,
        rows,
    })
}

/// Names listed on the company-information page, at most five.
pub fn parse_management(html: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let name_selector = selector("td.align-left")?;

    let names: Vec<String> = document
        .select(&name_selector)
        .map(cell_text)
        .filter(|name| !name.is_empty())
        .take(MANAGEMENT_LIMIT)
        .collect();

    if names.is_empty() {
        Ok(vec![NO_MANAGEMENT_DATA.to_string()])
    } else {
        Ok(names)
    }
}

#[derive(Clone)]
pub struct ScreenerClient {
    client: Client,
    base_url: String,
}

impl ScreenerClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn consolidated_page(&self, base_symbol: &str) -> Result<String, ScrapeError> {
        let url = format!("{}/company/{}/consolidated/", self.base_url, encode(base_symbol));
        debug!(url, "Fetching consolidated statements");
        fetch_text(&self.client, &url).await
    }

    pub async fn management(&self, base_symbol: &str) -> Result<Vec<String>, ScrapeError> {
        let url = format!(
            "{}/company/{}/company-information/",
            self.base_url,
            encode(base_symbol)
        );
        debug!(url, "Fetching company information");
        let body = fetch_text(&self.client, &url).await?;
        parse_management(&body)
    }
}
