//! Investor-community threads
//!
//! ValuePickr exposes a "latest" RSS feed whose titles carry a reply count;
//! Reddit exposes per-subreddit JSON listings. Both are cut to the last
//! 90 days and ranked by engagement.

use chrono::{DateTime, Duration, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::http::{fetch_text, ScrapeError};
use crate::models::{ForumSource, ForumThread};
use crate::news::{parse_feed_entries, FeedEntry};

pub const VALUEPICKR_FEED_URL: &str = "https://valuepickr4.rssing.com/chan-72344682/latest.php";
pub const REDDIT_BASE_URL: &str = "https://www.reddit.com";
pub const SUBREDDITS: [&str; 3] = ["IndianStockMarket", "Stocks", "investingindia"];
pub const LOOKBACK_DAYS: i64 = 90;
pub const THREAD_LIMIT: usize = 15;

lazy_static! {
    static ref REPLIES_PATTERN: Regex = Regex::new(r"\[Replies:\s*(\d+)\]").unwrap();
}

/// Search link for a symbol on the ValuePickr forum.
pub fn valuepickr_search_url(base_symbol: &str) -> String {
    format!("https://forum.valuepickr.com/search?q={}", encode(base_symbol))
}

/// Keep recent entries, read "[Replies: N]" from the title, and rank by
/// (replies, date) descending.
pub fn rank_valuepickr(
    entries: Vec<FeedEntry>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<ForumThread> {
    let cutoff = now - Duration::days(LOOKBACK_DAYS);

    let mut threads: Vec<ForumThread> = entries
        .into_iter()
        .filter_map(|entry| {
            let published = entry
                .pub_date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())?
                .with_timezone(&Utc);
            if published < cutoff {
                return None;
            }

            let replies = REPLIES_PATTERN
                .captures(&entry.title)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0);
            let topic = entry
                .title
                .split(" [")
                .next()
                .unwrap_or(&entry.title)
                .trim()
                .to_string();

            Some(ForumThread {
                source: ForumSource::ValuePickr,
                title: topic,
                url: entry.link,
                published,
                replies,
                score: None,
            })
        })
        .collect();

    threads.sort_by(|a, b| {
        b.replies
            .cmp(&a.replies)
            .then_with(|| b.published.cmp(&a.published))
    });
    threads.truncate(limit);
    threads
}

#[derive(Debug, Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Deserialize)]
struct RedditListingData {
    #[serde(default)]
    children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    title: String,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    score: i64,
    created_utc: f64,
    permalink: String,
}

pub fn parse_reddit_listing(subreddit: &str, body: &str) -> Result<Vec<ForumThread>, ScrapeError> {
    let listing: RedditListing = serde_json::from_str(body).map_err(|e| ScrapeError::Parse {
        what: format!("r/{} listing", subreddit),
        message: e.to_string(),
    })?;

    Ok(listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            let post = child.data;
            let published = Utc.timestamp_opt(post.created_utc as i64, 0).single()?;
            Some(ForumThread {
                source: ForumSource::Reddit {
                    subreddit: subreddit.to_string(),
                },
                title: post.title,
                url: format!("{}{}", REDDIT_BASE_URL, post.permalink),
                published,
                replies: post.num_comments,
                score: Some(post.score),
            })
        })
        .collect())
}

/// Keep recent posts and rank by (comments, score) descending.
pub fn rank_reddit(posts: Vec<ForumThread>, now: DateTime<Utc>, limit: usize) -> Vec<ForumThread> {
    let cutoff = now - Duration::days(LOOKBACK_DAYS);
    let mut posts: Vec<ForumThread> = posts.into_iter().filter(|p| p.published >= cutoff).collect();

    posts.sort_by(|a, b| {
        b.replies
            .cmp(&a.replies)
            .then_with(|| b.score.cmp(&a.score))
    });
    posts.truncate(limit);
    posts
}

#[derive(Clone)]
pub struct ForumFetcher {
    client: Client,
    valuepickr_url: String,
    reddit_base_url: String,
}

impl ForumFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_urls(client, VALUEPICKR_FEED_URL, REDDIT_BASE_URL)
    }

    pub fn with_urls(client: Client, valuepickr_url: &str, reddit_base_url: &str) -> Self {
        Self {
            client,
            valuepickr_url: valuepickr_url.to_string(),
            reddit_base_url: reddit_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn valuepickr_threads(&self, limit: usize) -> Result<Vec<ForumThread>, ScrapeError> {
        let body = fetch_text(&self.client, &self.valuepickr_url).await?;
        let entries = parse_feed_entries(&body)?;
        debug!(entries = entries.len(), "ValuePickr feed fetched");
        Ok(rank_valuepickr(entries, Utc::now(), limit))
    }

    /// Top posts across `subreddits`. Fails only when every subreddit fails.
    pub async fn reddit_threads(
        &self,
        subreddits: &[&str],
        limit: usize,
    ) -> Result<Vec<ForumThread>, ScrapeError> {
        let mut posts = Vec::new();
        let mut last_error = None;

        for subreddit in subreddits {
            let url = format!(
                "{}/r/{}/top.json?t=quarter&limit={}",
                self.reddit_base_url, subreddit, limit
            );
            match fetch_text(&self.client, &url)
                .await
                .and_then(|body| parse_reddit_listing(subreddit, &body))
            {
                Ok(mut threads) => posts.append(&mut threads),
                Err(e) => {
                    warn!(subreddit, error = %e, "Subreddit listing unavailable");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if posts.is_empty() => Err(e),
            _ => Ok(rank_reddit(posts, Utc::now(), limit)),
        }
    }
}
