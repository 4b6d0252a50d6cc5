//! drdx-engine - Diabetic Retinopathy Diagnosis Workflow Engine
//!
//! HTTP service wrapping the supervisor-driven diagnosis workflow:
//! grading intake, vision consultation, ensemble fusion, recommendation
//! lookup, and report assembly.

use anyhow::{Context, Result};
use clap::Parser;
use drdx_common::events::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use drdx_engine::checkpoint::MemoryCheckpointStore;
use drdx_engine::llm::HttpVisionClient;
use drdx_engine::AppState;

#[derive(Debug, Parser)]
#[command(name = "drdx-engine", about = "Diabetic retinopathy diagnosis workflow engine")]
struct Args {
    /// Configuration file path (default: ~/.config/drdx/drdx.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding configuration
    #[arg(long, env = "DRDX_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = drdx_common::config::load_config(args.config.as_deref())
        .context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting drdx-engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let bind = args.bind.unwrap_or_else(|| config.service.bind.clone());

    let vision_client = HttpVisionClient::new(&config.llm)
        .context("failed to build vision model client")?;
    info!("Vision model endpoint: {}", config.llm.endpoint);

    let event_bus = EventBus::new(config.service.event_capacity);
    let store = Arc::new(MemoryCheckpointStore::new());

    let state = AppState::new(
        store,
        event_bus,
        Arc::new(vision_client),
        Duration::from_secs(config.llm.timeout_seconds),
    );

    let app = drdx_engine::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
