use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai_pm_dashboard::catalog::Catalog;
use ai_pm_dashboard::config::Config;
use ai_pm_dashboard::gemini::GeminiClient;
use ai_pm_dashboard::news::NewsService;
use ai_pm_dashboard::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_pm_dashboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} feeds from {}",
        config.news.feeds.len(),
        config_path
    );

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin()?,
    };
    info!(
        "Catalog ready: {} categories, {} tools",
        catalog.categories.len(),
        catalog.tool_count()
    );

    let gemini = Arc::new(GeminiClient::new(&config.gemini, config.gemini_api_key())?);
    if !gemini.has_api_key() {
        warn!(
            "{} is not set; summaries will fall back and chat will return errors",
            config.gemini.api_key_env
        );
    }

    let news = NewsService::new(&config.news, gemini.clone())?;

    // Create app state
    let state = Arc::new(AppState {
        catalog: Arc::new(catalog),
        news,
        gemini,
    });

    let app = routes::router(state);

    // Start server
    let port = match std::env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => config.port,
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server starting on http://localhost:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
