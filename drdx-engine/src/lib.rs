//! drdx-engine - Diabetic Retinopathy Diagnosis Workflow Engine
//!
//! Routes one diagnostic request through a fixed sequence of analysis
//! stages, fuses the numeric classifier grade with a vision-LLM opinion,
//! and assembles a structured report. Exposed over HTTP REST + SSE.

pub mod api;
pub mod checkpoint;
pub mod error;
pub mod llm;
pub mod models;
pub mod stages;

pub use crate::error::{ApiError, ApiResult};

use crate::checkpoint::CheckpointStore;
use crate::llm::VisionModel;
use crate::stages::orchestrator::Orchestrator;
use axum::Router;
use chrono::{DateTime, Utc};
use drdx_common::events::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session checkpoint store
    pub store: Arc<dyn CheckpointStore>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// External vision model boundary
    pub vision_model: Arc<dyn VisionModel>,
    /// Whole-call budget for one vision consultation
    pub llm_budget: Duration,
    /// Cancellation tokens for active sessions
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last workflow error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        event_bus: EventBus,
        vision_model: Arc<dyn VisionModel>,
        llm_budget: Duration,
    ) -> Self {
        Self {
            store,
            event_bus,
            vision_model,
            llm_budget,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Build an orchestrator over this state's collaborators
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.store),
            self.event_bus.clone(),
            Arc::clone(&self.vision_model),
            self.llm_budget,
        )
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::diagnosis_routes())
        .route("/diagnosis/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
