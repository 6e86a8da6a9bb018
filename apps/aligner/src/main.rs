mod alignment;
mod config;
mod embedding;
mod errors;
mod ingest;
mod llm_client;
mod routes;
mod state;
mod storage;
mod tailoring;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::embedding::{registry, HashingEmbedder};
use crate::llm_client::{LlmClient, TextGenerator};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{DocumentStore, InMemoryStore, S3Store};
use crate::tailoring::pipeline::{RetryPolicy, TailoringEngine};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Aligner v{}", env!("CARGO_PKG_VERSION"));

    // Load the embedding model once; every request shares the handle
    let dimension = config.alignment.embedding_dimension;
    let embedder = registry::get_or_init(|| Arc::new(HashingEmbedder::new(dimension)))?;

    let engine = TailoringEngine::new(config.alignment.clone(), embedder)?;

    // Initialize document storage
    let store: Arc<dyn DocumentStore> = match &config.s3 {
        Some(settings) => Arc::new(S3Store::connect(settings).await),
        None => {
            warn!("S3_BUCKET not set; documents are kept in memory and lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };
    info!("Document store initialized ({})", store.backend());

    // Initialize LLM client
    let generator: Option<Arc<dyn TextGenerator>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(Arc::new(llm))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; suggestions will be returned pending");
            None
        }
    };

    let state = AppState {
        engine: Arc::new(engine),
        store,
        generator,
        retry: RetryPolicy::with_max_retries(config.generation_max_retries),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry::teardown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
