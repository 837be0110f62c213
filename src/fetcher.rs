use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{FeedConfig, NewsConfig};

const EXCERPT_MAX_CHARS: usize = 300;

/// A feed entry reduced to the fields the news pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub source: String,
    /// `None` when the feed gives no usable title
    pub title: Option<String>,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    /// Plain-text summary from the feed, tags stripped
    pub excerpt: String,
}

impl Article {
    /// Title for display and prompts; placeholder when the feed gave none.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}

pub struct Fetcher {
    client: Client,
    feeds: Vec<FeedConfig>,
    per_feed_limit: usize,
    max_concurrent: usize,
}

impl Fetcher {
    pub fn new(config: &NewsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("AiPmDashboard/1.0 (News Aggregator)")
            .build()?;

        Ok(Self {
            client,
            feeds: config.feeds.clone(),
            per_feed_limit: config.per_feed_limit,
            max_concurrent: config.max_concurrent_fetches.max(1),
        })
    }

    /// Fetch every configured feed with bounded concurrency.
    ///
    /// Failing feeds are logged and skipped. Articles come back grouped in
    /// feed configuration order, independent of which request finished first.
    pub async fn fetch_all(&self) -> Vec<Article> {
        info!("Fetching {} feeds", self.feeds.len());

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (index, feed) in self.feeds.iter().cloned().enumerate() {
            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let limit = self.per_feed_limit;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = Self::fetch_feed(&client, &feed, limit).await;
                (index, feed.name, result)
            });
        }

        let mut per_feed: Vec<Vec<Article>> = vec![Vec::new(); self.feeds.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(articles))) => per_feed[index] = articles,
                Ok((_, name, Err(e))) => error!("Failed to fetch feed '{}': {}", name, e),
                Err(e) => error!("Feed fetch task failed: {}", e),
            }
        }

        let articles: Vec<Article> = per_feed.into_iter().flatten().collect();
        info!("Fetched {} articles", articles.len());
        articles
    }

    async fn fetch_feed(
        client: &Client,
        feed: &FeedConfig,
        limit: usize,
    ) -> anyhow::Result<Vec<Article>> {
        info!("Fetching feed: {} ({})", feed.name, feed.url);

        let response = client.get(&feed.url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        let articles = Self::parse_entries(&feed.name, &bytes, limit)?;
        info!("Parsed {} articles from '{}'", articles.len(), feed.name);
        Ok(articles)
    }

    /// Parse an RSS or Atom document, keeping the first `limit` entries that have a link.
    pub fn parse_entries(source: &str, bytes: &[u8], limit: usize) -> anyhow::Result<Vec<Article>> {
        let parsed = parser::parse(bytes)?;

        let mut articles = Vec::new();
        for entry in parsed.entries {
            if articles.len() >= limit {
                break;
            }

            let title = entry
                .title
                .as_ref()
                .map(|t| strip_html(&t.content))
                .filter(|t| !t.is_empty());

            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();

            if link.is_empty() {
                warn!(
                    "Skipping entry with no link: {}",
                    title.as_deref().unwrap_or("(untitled)")
                );
                continue;
            }

            let raw_excerpt = entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
                .unwrap_or_default();
            let excerpt = truncate_chars(&strip_html(&raw_excerpt), EXCERPT_MAX_CHARS);

            let published = entry.published.or(entry.updated);

            articles.push(Article {
                source: source.to_string(),
                title,
                link,
                published,
                excerpt,
            });
        }

        Ok(articles)
    }
}

/// Reduce an HTML fragment to plain text: drop tags, decode common
/// entities, collapse whitespace.
pub fn strip_html(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    let mut chars = fragment.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            // A bare "<" (as in "5 < 6") is text, not a tag
            '<' if !in_tag && starts_tag(chars.peek().copied()) => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = decode_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_tag(next: Option<char>) -> bool {
    matches!(next, Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?')
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&#8217;", "\u{2019}")
        .replace("&#8220;", "\u{201C}")
        .replace("&#8221;", "\u{201D}")
        .replace("&amp;", "&")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}…", text[..byte_index].trim_end()),
        None => text.to_string(),
    }
}
