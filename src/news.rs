//! RSS news feeds
//!
//! Company and sector headlines come from a Google News search feed; the
//! publisher feeds are fixed URLs. Each feed is fetched once per dossier.

use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use urlencoding::encode;

use crate::http::{fetch_text, ScrapeError};
use crate::models::NewsItem;

/// Length of the pubDate prefix shown next to a headline ("Tue, 04 Jun 2024").
const PUBLISHED_PREFIX_CHARS: usize = 16;

pub const GOOGLE_NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsFeed {
    /// Google News search for `"{term} stock india"`.
    GoogleSearch(String),
    EconomicTimesTop,
    EconomicTimesIndustry,
    MintLatest,
}

impl NewsFeed {
    /// Publisher feeds shown on every dossier, in display order.
    pub const PUBLISHERS: [NewsFeed; 3] = [
        NewsFeed::EconomicTimesTop,
        NewsFeed::EconomicTimesIndustry,
        NewsFeed::MintLatest,
    ];

    pub fn url(&self) -> String {
        self.url_with(GOOGLE_NEWS_SEARCH_URL)
    }

    /// Feed URL with the search endpoint swapped for `google_news_url`.
    pub fn url_with(&self, google_news_url: &str) -> String {
        match self {
            NewsFeed::GoogleSearch(term) => format!(
                "{}?q={}+stock+india",
                google_news_url,
                encode(term.trim())
            ),
            NewsFeed::EconomicTimesTop => {
                "https://economictimes.indiatimes.com/rssfeedstopstories.cms".to_string()
            }
            NewsFeed::EconomicTimesIndustry => {
                "https://economictimes.indiatimes.com/rss/etindustryrss.cms".to_string()
            }
            NewsFeed::MintLatest => "https://www.livemint.com/rss/news".to_string(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            NewsFeed::GoogleSearch(term) => format!("Google News ({})", term),
            NewsFeed::EconomicTimesTop => "Economic Times - Top Stories".to_string(),
            NewsFeed::EconomicTimesIndustry => "Economic Times - Industry News".to_string(),
            NewsFeed::MintLatest => "Mint - Latest News".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// A raw RSS entry; consumers decide how to interpret the date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub pub_date: Option<String>,
}

/// Parse all `<item>` entries that carry both a title and a link.
pub fn parse_feed_entries(xml: &str) -> Result<Vec<FeedEntry>, ScrapeError> {
    let rss: Rss = from_str(xml).map_err(|e| ScrapeError::Parse {
        what: "RSS feed".to_string(),
        message: e.to_string(),
    })?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let title = item.title?.trim().to_string();
            let link = item.link?.trim().to_string();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(FeedEntry {
                title,
                link,
                pub_date: item.pub_date.map(|d| d.trim().to_string()),
            })
        })
        .collect())
}

pub fn parse_news_items(xml: &str, max_items: usize) -> Result<Vec<NewsItem>, ScrapeError> {
    Ok(parse_feed_entries(xml)?
        .into_iter()
        .take(max_items)
        .map(|entry| NewsItem {
            title: entry.title,
            link: entry.link,
            published: entry
                .pub_date
                .map(|d| d.chars().take(PUBLISHED_PREFIX_CHARS).collect())
                .unwrap_or_default(),
        })
        .collect())
}

#[derive(Clone)]
pub struct NewsFetcher {
    client: Client,
    google_news_url: String,
}

impl NewsFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_google_news_url(client, GOOGLE_NEWS_SEARCH_URL)
    }

    pub fn with_google_news_url(client: Client, google_news_url: &str) -> Self {
        Self {
            client,
            google_news_url: google_news_url.to_string(),
        }
    }

    pub async fn fetch(
        &self,
        feed: &NewsFeed,
        max_items: usize,
    ) -> Result<Vec<NewsItem>, ScrapeError> {
        self.fetch_url(&feed.url_with(&self.google_news_url), max_items).await
    }

    pub async fn fetch_url(
        &self,
        url: &str,
        max_items: usize,
    ) -> Result<Vec<NewsItem>, ScrapeError> {
        debug!(url, max_items, "Fetching RSS feed");
        let body = fetch_text(&self.client, url).await?;
        parse_news_items(&body, max_items)
    }
}
