//! Shared HTTP plumbing for scraping targets and feeds.

use reqwest::{header, Client};
use std::time::Duration;
use thiserror::Error;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("{0}")]
    Missing(String),
}

/// Long-lived client with a browser user agent and a fixed request ceiling.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(BROWSER_USER_AGENT),
    );

    Client::builder()
        .default_headers(headers)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .timeout(timeout)
        .build()
}

/// GET `url` and return the body as text, failing on non-2xx.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let response = client.get(url).send().await.map_err(|source| ScrapeError::Request {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|source| ScrapeError::Request {
        url: url.to_string(),
        source,
    })
}
