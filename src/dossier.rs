//! Dossier assembly
//!
//! One query becomes one [`Dossier`]. Sections are fetched one after another
//! in page order. Only ticker resolution can fail the whole dossier; every
//! other source degrades to [`Section::Unavailable`].

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::analysis::DocumentAnalyst;
use crate::chat::{ChatClient, ChatCompletion};
use crate::config::Config;
use crate::error::Result;
use crate::forum::{valuepickr_search_url, ForumFetcher, SUBREDDITS, THREAD_LIMIT};
use crate::http::build_client;
use crate::market_data::{FmpProvider, MarketDataProvider, YahooProvider};
use crate::models::{
    Dossier, FinancialSection, NewsFeedSection, NewsItem, Section, StatementKind,
    UploadedDocument,
};
use crate::news::{NewsFeed, NewsFetcher};
use crate::resolver::{Resolution, TickerResolver};
use crate::screener::{parse_statement_table, ScreenerClient};

pub const COMPANY_NEWS_ITEMS: usize = 5;
pub const SECTOR_NEWS_ITEMS: usize = 7;
pub const PUBLISHER_NEWS_ITEMS: usize = 5;

pub struct DossierService {
    resolver: TickerResolver,
    news: NewsFetcher,
    forums: ForumFetcher,
    screener: ScreenerClient,
    analyst: DocumentAnalyst,
    publisher_feeds: Vec<NewsFeed>,
}

impl DossierService {
    pub fn new(
        resolver: TickerResolver,
        news: NewsFetcher,
        forums: ForumFetcher,
        screener: ScreenerClient,
        analyst: DocumentAnalyst,
    ) -> Self {
        Self {
            resolver,
            news,
            forums,
            screener,
            analyst,
            publisher_feeds: NewsFeed::PUBLISHERS.to_vec(),
        }
    }

    /// Wire up the production collaborators. All of them share one
    /// connection-pooled HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(config.http_timeout)?;

        let provider: Arc<dyn MarketDataProvider> = match &config.market_data_api_key {
            Some(key) => Arc::new(FmpProvider::new(client.clone(), key.clone())),
            None => Arc::new(YahooProvider::new(client.clone())?),
        };

        let chat = config.chat_api_key.as_ref().map(|key| {
            Arc::new(ChatClient::new(
                client.clone(),
                key.clone(),
                &config.chat_base_url,
                &config.chat_model,
            )) as Arc<dyn ChatCompletion>
        });

        let resolver = TickerResolver::new(provider, config.retry_policy());
        info!(
            provider = resolver.provider_id(),
            document_analysis = chat.is_some(),
            "Dossier service configured"
        );

        Ok(Self::new(
            resolver,
            NewsFetcher::new(client.clone()),
            ForumFetcher::new(client.clone()),
            ScreenerClient::new(client),
            DocumentAnalyst::new(chat),
        ))
    }

    pub fn with_publisher_feeds(mut self, feeds: Vec<NewsFeed>) -> Self {
        self.publisher_feeds = feeds;
        self
    }

    #[instrument(skip(self, uploads), fields(documents = uploads.len()))]
    pub async fn build(&self, query: &str, uploads: &[UploadedDocument]) -> Result<Dossier> {
        let Resolution {
            exchange,
            base_symbol,
            quote,
            series,
        } = self.resolver.resolve(query).await?;

        let sector_news = self.sector_news(quote.sector.as_deref()).await;

        let mut news = Vec::with_capacity(self.publisher_feeds.len() + 1);
        news.push(
            self.feed_section(NewsFeed::GoogleSearch(base_symbol.clone()), COMPANY_NEWS_ITEMS)
                .await,
        );
        for feed in &self.publisher_feeds {
            news.push(self.feed_section(feed.clone(), PUBLISHER_NEWS_ITEMS).await);
        }

        let financials = self.financials(&base_symbol).await;

        let management = Section::from_result(
            self.screener.management(&base_symbol).await,
            "Management",
        );

        let valuepickr_threads = Section::from_result(
            self.forums.valuepickr_threads(THREAD_LIMIT).await,
            "ValuePickr threads",
        );
        let reddit_threads = Section::from_result(
            self.forums.reddit_threads(&SUBREDDITS, THREAD_LIMIT).await,
            "Reddit threads",
        );

        let documents = self.analyst.analyze(uploads).await;

        info!(symbol = %quote.symbol, "Dossier assembled");

        Ok(Dossier {
            dossier_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            query: query.trim().to_string(),
            symbol: quote.symbol.clone(),
            forum_search_url: valuepickr_search_url(&base_symbol),
            base_symbol,
            exchange,
            quote,
            history: series,
            sector_news,
            news,
            financials,
            management,
            valuepickr_threads,
            reddit_threads,
            documents,
        })
    }

    async fn sector_news(&self, sector: Option<&str>) -> Section<Vec<NewsItem>> {
        match sector {
            Some(sector) => Section::from_result(
                self.news
                    .fetch(&NewsFeed::GoogleSearch(sector.to_string()), SECTOR_NEWS_ITEMS)
                    .await,
                "Sector news",
            ),
            None => Section::Unavailable("Sector news unavailable: no sector reported".to_string()),
        }
    }

    async fn feed_section(&self, feed: NewsFeed, max_items: usize) -> NewsFeedSection {
        let label = feed.label();
        let items = Section::from_result(self.news.fetch(&feed, max_items).await, &label);
        NewsFeedSection {
            source: label,
            items,
        }
    }

    /// All statement tables come from one page fetch.
    async fn financials(&self, base_symbol: &str) -> Vec<FinancialSection> {
        match self.screener.consolidated_page(base_symbol).await {
            Ok(page) => StatementKind::ALL
                .iter()
                .map(|kind| FinancialSection {
                    kind: *kind,
                    table: Section::from_result(parse_statement_table(&page, *kind), kind.title()),
                })
                .collect(),
            Err(e) => {
                let section = Section::from_result(Err(e), "Financial statements");
                StatementKind::ALL
                    .iter()
                    .map(|kind| FinancialSection {
                        kind: *kind,
                        table: section.clone(),
                    })
                    .collect()
            }
        }
    }
}
