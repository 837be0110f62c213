use askama::Template;
use thiserror::Error;
use tracing::info;

use crate::catalog::{Catalog, Category};
use crate::gemini::{GeminiClient, GeminiError};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Question is required")]
    EmptyQuestion,

    #[error("Failed to build prompt: {0}")]
    Prompt(#[from] askama::Error),

    #[error(transparent)]
    Generation(#[from] GeminiError),
}

#[derive(Template)]
#[template(path = "chat.txt")]
struct ChatPrompt<'a> {
    question: &'a str,
    categories: &'a [&'a Category],
}

/// Render the chat prompt. The tool context block is present only when
/// `categories` is non-empty.
pub fn build_prompt(question: &str, categories: &[&Category]) -> Result<String, askama::Error> {
    ChatPrompt {
        question,
        categories,
    }
    .render()
}

pub async fn answer(
    gemini: &GeminiClient,
    catalog: &Catalog,
    question: &str,
) -> Result<String, ChatError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(ChatError::EmptyQuestion);
    }

    let matched = catalog.match_categories(question);
    info!(
        "Chat question matched {} catalog categories",
        matched.len()
    );

    let prompt = build_prompt(question, &matched)?;
    Ok(gemini.generate(&prompt).await?)
}
