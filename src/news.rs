//! News pipeline: dedupe, rank by recency, categorize, summarize.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CategoryRule, NewsConfig};
use crate::fetcher::{Article, Fetcher};
use crate::gemini::GeminiClient;

/// Returned in place of a summary when generation fails.
pub const SUMMARY_FALLBACK: &str = "要約を生成できませんでした。";

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("Failed to fetch news articles")]
    NoArticles,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub category: String,
    pub summary: String,
}

#[derive(Template)]
#[template(path = "news_summary.txt")]
struct SummaryPrompt<'a> {
    title: &'a str,
    source: &'a str,
    category: &'a str,
    excerpt: &'a str,
}

/// Tags articles using keyword rules; the first matching rule wins.
pub struct Categorizer {
    rules: Vec<CategoryRule>,
    default_category: String,
}

impl Categorizer {
    pub fn new(rules: Vec<CategoryRule>, default_category: String) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CategoryRule {
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
                name: rule.name,
            })
            .collect();

        Self {
            rules,
            default_category,
        }
    }

    pub fn categorize(&self, article: &Article) -> String {
        let haystack = format!("{} {}", article.display_title(), article.excerpt).to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| self.default_category.clone())
    }
}

fn normalize_link(link: &str) -> String {
    link.trim().trim_end_matches('/').to_lowercase()
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Drop articles whose link or title was already seen. First occurrence wins.
/// Untitled articles are compared by link only.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let mut seen_links = HashSet::new();
    let mut seen_titles = HashSet::new();

    articles
        .into_iter()
        .filter(|article| {
            let link = normalize_link(&article.link);
            let title = article.title.as_deref().map(normalize_title);
            let title_seen = title.as_ref().is_some_and(|t| seen_titles.contains(t));
            if seen_links.contains(&link) || title_seen {
                return false;
            }
            seen_links.insert(link);
            if let Some(title) = title {
                seen_titles.insert(title);
            }
            true
        })
        .collect()
}

/// Dedupe, order newest first (undated last, ties keep input order) and keep `k`.
pub fn select_latest(articles: Vec<Article>, k: usize) -> Vec<Article> {
    let mut articles = dedupe(articles);
    articles.sort_by(|a, b| b.published.cmp(&a.published));
    articles.truncate(k);
    articles
}

pub struct NewsService {
    fetcher: Fetcher,
    gemini: Arc<GeminiClient>,
    categorizer: Categorizer,
    top_k: usize,
    summary_delay: Duration,
}

impl NewsService {
    pub fn new(config: &NewsConfig, gemini: Arc<GeminiClient>) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
            gemini,
            categorizer: Categorizer::new(
                config.categories.clone(),
                config.default_category.clone(),
            ),
            top_k: config.top_k,
            summary_delay: Duration::from_millis(config.summary_delay_ms),
        })
    }

    /// Fetch, rank and annotate the latest articles.
    ///
    /// Summaries are requested one at a time with a fixed pause between
    /// calls; a failed call leaves [`SUMMARY_FALLBACK`] on that item.
    pub async fn latest(&self) -> Result<Vec<NewsItem>, NewsError> {
        let articles = self.fetcher.fetch_all().await;
        if articles.is_empty() {
            return Err(NewsError::NoArticles);
        }

        let selected = select_latest(articles, self.top_k);
        info!("Summarizing {} articles", selected.len());

        // Without a key no request is made, so there is nothing to pace
        let pace = self.gemini.has_api_key() && !self.summary_delay.is_zero();

        let mut items = Vec::with_capacity(selected.len());
        for (index, article) in selected.into_iter().enumerate() {
            if index > 0 && pace {
                tokio::time::sleep(self.summary_delay).await;
            }

            let category = self.categorizer.categorize(&article);
            let summary = self.summarize(&article, &category).await;
            let title = article.display_title().to_string();

            items.push(NewsItem {
                source: article.source,
                title,
                link: article.link,
                published: article.published,
                category,
                summary,
            });
        }

        Ok(items)
    }

    async fn summarize(&self, article: &Article, category: &str) -> String {
        let prompt = SummaryPrompt {
            title: article.display_title(),
            source: &article.source,
            category,
            excerpt: &article.excerpt,
        };

        let prompt = match prompt.render() {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(
                    "Failed to render summary prompt for '{}': {}",
                    article.display_title(),
                    e
                );
                return SUMMARY_FALLBACK.to_string();
            }
        };

        match self.gemini.generate(&prompt).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to summarize '{}': {}", article.display_title(), e);
                SUMMARY_FALLBACK.to_string()
            }
        }
    }
}
