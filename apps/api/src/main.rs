mod classifier;
mod config;
mod enrichment;
mod errors;
mod github;
mod import;
mod llm_client;
mod models;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::enrichment::{Enricher, LlmEnricher, TemplateEnricher};
use crate::github::GithubClient;
use crate::import::{scheduler, ImportSettings, Importer};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{JsonFileStore, WorkflowStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Flowscout v{}", env!("CARGO_PKG_VERSION"));

    // Workflow cache
    let store = Arc::new(JsonFileStore::open(&config.cache_path).await?);
    info!("Workflow cache at {}", store.path().display());

    // Enrichment backend: LLM when a key is configured, filename template otherwise
    let enricher: Arc<dyn Enricher> = match LlmClient::new(&config) {
        Some(llm) => {
            info!("LLM enrichment enabled (model: {})", llm.model());
            Arc::new(LlmEnricher(llm))
        }
        None => {
            info!("LLM_API_KEY not set, using template enrichment");
            Arc::new(TemplateEnricher)
        }
    };

    if config.github_token().is_none() {
        info!("GITHUB_TOKEN not set, searches use the unauthenticated rate limit");
    }
    let github = GithubClient::new(&config);

    let store_handle: Arc<dyn WorkflowStore> = store;
    let importer = Arc::new(Importer::new(
        github,
        enricher,
        store_handle.clone(),
        ImportSettings::from(&config),
    ));

    // Scheduled imports (no-op unless AUTO_IMPORT is on)
    let _scheduled = scheduler::spawn(importer.clone(), &config);

    let state = AppState {
        config: config.clone(),
        store: store_handle,
        importer,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
