//! The static AI tool catalog served by `GET /`.

use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.toml");

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Tool {
    pub name: String,
    pub company: String,
    pub summary: String,
    pub use_case: String,
    pub link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub name: String,
    /// Substrings that route a chat question to this category
    #[serde(default)]
    pub keywords: Vec<String>,
    pub tools: Vec<Tool>,
}

impl Category {
    /// Whether the lowercased question mentions this category
    fn is_mentioned_in(&self, question_lower: &str) -> bool {
        std::iter::once(&self.name)
            .chain(self.keywords.iter())
            .map(|keyword| keyword.trim().to_lowercase())
            .any(|keyword| !keyword.is_empty() && question_lower.contains(&keyword))
    }
}

/// Categories in file order. Serializes as `{ category: [tool, ...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_str(BUILTIN_CATALOG)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        Ok(catalog)
    }

    /// Categories whose name or keywords occur in the question, case-insensitively.
    pub fn match_categories(&self, question: &str) -> Vec<&Category> {
        let question_lower = question.to_lowercase();
        self.categories
            .iter()
            .filter(|category| category.is_mentioned_in(&question_lower))
            .collect()
    }

    pub fn tool_count(&self) -> usize {
        self.categories.iter().map(|c| c.tools.len()).sum()
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.name, &category.tools)?;
        }
        map.end()
    }
}
