//! HTTP control surface for the pipeline.

pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::OrchestratorConfig;
use crate::pipeline::Orchestrator;
use crate::poller::Poller;
use crate::providers::{
    ConcatClient, DalleImageGenerator, GeminiTextGenerator, Providers, VeoVideoGenerator,
};
use crate::store::{ProjectStore, StoreHandle};

use api::AppState;

/// Configuration for the orchestrator server.
pub struct ServerConfig {
    pub port: u16,
    pub db_path: std::path::PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4170,
            db_path: std::path::PathBuf::from(".reelsmith/projects.db"),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build the real provider set from environment configuration. Fails fast on
/// any missing credential rather than at the first step that needs it.
pub fn providers_from_config(config: &OrchestratorConfig) -> Result<Providers> {
    let gemini_key = config.require_gemini_key()?;
    let openai_key = config.require_openai_key()?;
    let fal_key = config.require_fal_key()?;
    let concat_endpoint = config.require_concat_endpoint()?;

    Ok(Providers {
        text: Arc::new(GeminiTextGenerator::new(gemini_key)),
        image: Arc::new(DalleImageGenerator::new(openai_key)),
        video: Arc::new(VeoVideoGenerator::new(fal_key)),
        concat: Arc::new(ConcatClient::new(concat_endpoint)),
    })
}

/// Start the orchestrator server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let env_config = OrchestratorConfig::from_env();
    let providers = providers_from_config(&env_config)?;
    let store = ProjectStore::new(&config.db_path).context("Failed to initialize project store")?;
    let orchestrator = Orchestrator::new(StoreHandle::new(store), providers, Poller::default());
    let state = Arc::new(AppState { orchestrator });

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!("reelsmith orchestrator listening at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("shutting down...");
}
