mod config;
mod errors;
mod extraction;
mod llm_client;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::extraction::catalog::CatalogSet;
use crate::extraction::extractor::{check_currency_catalog, Extractor, ExtractorSettings};
use crate::extraction::schema::ExtractionSchema;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting listing extraction API v{}", env!("CARGO_PKG_VERSION"));

    // Catalogs and schema are loaded once and shared read-only
    let catalogs = Arc::new(
        CatalogSet::load(config.catalog_path.as_deref()).context("Failed to load catalogs")?,
    );
    let schema = Arc::new(
        ExtractionSchema::listing(&catalogs).context("Catalogs do not cover the listing schema")?,
    );
    info!("Extraction schema ready ({} fields)", schema.fields().len());

    // Initialize LLM client
    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.max_tokens,
        Duration::from_secs(config.llm_timeout_secs),
    )
    .context("Failed to build HTTP client")?;
    info!(
        "LLM client initialized (primary: {}, fallback: {}, strict schema: {})",
        config.primary_model, config.fallback_model, config.strict_schema
    );
    check_currency_catalog(&catalogs, config.gs_per_usd)
        .context("GS_PER_USD is set but the divisa catalog cannot express the conversion")?;
    if let Some(rate) = config.gs_per_usd {
        info!("Guaraní prices will be converted to USD at {rate} GS/USD");
    }

    let extractor = Extractor::new(
        Arc::new(llm),
        schema,
        catalogs,
        ExtractorSettings::from(&config),
    );

    // Build app state
    let state = AppState { extractor };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
