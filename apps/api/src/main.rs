mod analysis;
mod config;
mod errors;
mod files;
mod jobs;
mod llm_client;
mod persistence;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::pipeline::AnalysisRegistry;
use crate::config::Config;
use crate::files::store::FileStore;
use crate::jobs::store::JobStore;
use crate::llm_client::chat::ChatClient;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobCraft API v{}", env!("CARGO_PKG_VERSION"));

    // Persistence and stores
    let persistence = persistence::connect(&config.storage).await?;
    let jobs = JobStore::load(persistence.clone()).await?;
    let files = FileStore::load(persistence).await?;

    // AI clients
    let ai = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_api_url.clone())?;
    info!("Gemini client initialized (model: {})", llm_client::MODEL);

    let chat = match &config.openai_api_key {
        Some(key) => {
            let client = ChatClient::new(key.clone(), config.openai_api_url.clone())?;
            info!("Chat client initialized (model: {})", llm_client::chat::CHAT_MODEL);
            Some(client)
        }
        None => {
            warn!("OPENAI_API_KEY not set; /api/chat will answer 503");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        ai: Arc::new(ai),
        chat,
        jobs,
        files,
        analyses: AnalysisRegistry::default(),
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
