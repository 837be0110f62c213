use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::catalog::Catalog;
use crate::chat::{self, ChatError};
use crate::gemini::{GeminiClient, GeminiError};
use crate::news::{NewsError, NewsItem, NewsService};

pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub news: NewsService,
    pub gemini: Arc<GeminiClient>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/news", get(news))
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// Error body is always `{"error": "..."}`
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<NewsError> for AppError {
    fn from(err: NewsError) -> Self {
        error!("News request failed: {}", err);
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyQuestion => AppError::new(StatusCode::BAD_REQUEST, err.to_string()),
            ChatError::Prompt(e) => {
                error!("Failed to render chat prompt: {}", e);
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build prompt")
            }
            ChatError::Generation(GeminiError::MissingApiKey) => {
                error!("Chat request rejected: Gemini API key not configured");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Gemini API key not found",
                )
            }
            ChatError::Generation(e) => {
                error!("Chat generation failed: {}", e);
                AppError::new(StatusCode::BAD_GATEWAY, "Failed to generate answer")
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected chat body: {}", rejection.body_text());
        AppError::new(
            StatusCode::BAD_REQUEST,
            "Request body must be JSON with a \"question\" field",
        )
    }
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    Json(state.catalog.as_ref()).into_response()
}

pub async fn news(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NewsResponse>, AppError> {
    let news = state.news.latest().await?;
    Ok(Json(NewsResponse { news }))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = body?;
    let answer = chat::answer(&state.gemini, &state.catalog, &request.question).await?;
    Ok(Json(ChatResponse { answer }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
