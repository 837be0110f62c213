use anyhow::bail;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Upper bound on items returned by the news endpoint
pub const MAX_TOP_K: usize = 5;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Listen port; the `PORT` env var takes precedence at startup
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional TOML file replacing the built-in tool catalog
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub gemini: GeminiConfig,
    pub news: NewsConfig,
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    /// Entries taken from the head of each feed
    #[serde(default = "default_per_feed_limit")]
    pub per_feed_limit: usize,
    /// Items returned by the news endpoint
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Pause between consecutive summary requests, in milliseconds
    #[serde(default = "default_summary_delay_ms")]
    pub summary_delay_ms: u64,
    #[serde(default = "default_category")]
    pub default_category: String,
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
}

fn default_per_feed_limit() -> usize {
    5
}

fn default_top_k() -> usize {
    5
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_summary_delay_ms() -> u64 {
    1000
}

fn default_category() -> String {
    "一般".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

/// Keyword rule used to tag news items with a category
#[derive(Debug, Deserialize, Clone)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let top_k = self.news.top_k;
        if top_k == 0 || top_k > MAX_TOP_K {
            bail!("news.top_k must be between 1 and {}, got {}", MAX_TOP_K, top_k);
        }
        Ok(())
    }

    /// Read the Gemini API key from the configured environment variable.
    /// Empty values count as missing.
    pub fn gemini_api_key(&self) -> Option<String> {
        std::env::var(&self.gemini.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}
