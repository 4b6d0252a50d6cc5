//! Diagnosis workflow API handlers
//!
//! POST /diagnosis/start, GET /diagnosis/status/:id,
//! GET /diagnosis/report/:id, POST /diagnosis/cancel/:id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{DiagnosisReport, DiagnosisStage};
use crate::AppState;

/// POST /diagnosis/start response
#[derive(Debug, Serialize)]
pub struct StartDiagnosisResponse {
    pub session_id: Uuid,
    /// `null` until the first supervisor decision is checkpointed
    pub stage: Option<DiagnosisStage>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /diagnosis/status response
#[derive(Debug, Serialize)]
pub struct DiagnosisStatusResponse {
    pub session_id: Uuid,
    pub stage: Option<DiagnosisStage>,
    pub message_count: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /diagnosis/report response
#[derive(Debug, Serialize)]
pub struct DiagnosisReportResponse {
    pub session_id: Uuid,
    /// Structured report for programmatic consumers
    pub report: DiagnosisReport,
    /// Human-readable rendering
    pub rendered: String,
}

/// POST /diagnosis/cancel response
#[derive(Debug, Serialize)]
pub struct CancelDiagnosisResponse {
    pub session_id: Uuid,
    pub cancelled_at: chrono::DateTime<chrono::Utc>,
}

/// POST /diagnosis/start
///
/// Accepts the bootstrap payload as arbitrary JSON: intake is lenient by
/// contract, so malformed fields default at the grading stage rather than
/// being rejected here. The workflow runs as a background task; 202 with
/// the session id is returned immediately.
pub async fn start_diagnosis(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<StartDiagnosisResponse>)> {
    let orchestrator = state.orchestrator();
    let session = orchestrator.create_session(payload.to_string()).await?;
    let session_id = session.session_id;

    let cancel = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session_id, cancel.clone());

    let task_state = state.clone();
    tokio::spawn(async move {
        let result = task_state.orchestrator().run(session_id, cancel).await;
        task_state.cancellation_tokens.write().await.remove(&session_id);
        if let Err(e) = result {
            error!(session_id = %session_id, error = %e, "Diagnosis workflow task failed");
            *task_state.last_error.write().await = Some(e.to_string());
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartDiagnosisResponse {
            session_id,
            stage: session.current_stage,
            started_at: session.started_at,
        }),
    ))
}

/// GET /diagnosis/status/:session_id
pub async fn diagnosis_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<DiagnosisStatusResponse>> {
    let session = state
        .store
        .get(session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))?;

    Ok(Json(DiagnosisStatusResponse {
        session_id,
        stage: session.current_stage,
        message_count: session.messages.len(),
        started_at: session.started_at,
        ended_at: session.ended_at,
    }))
}

/// GET /diagnosis/report/:session_id
///
/// 404 until the session has produced its final report.
pub async fn diagnosis_report(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<DiagnosisReportResponse>> {
    let session = state
        .store
        .get(session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))?;

    let report = session
        .final_report
        .clone()
        .ok_or_else(|| ApiError::NotFound(format!("report for session {} not ready", session_id)))?;

    let rendered = crate::stages::report::render(&report);
    Ok(Json(DiagnosisReportResponse {
        session_id,
        report,
        rendered,
    }))
}

/// POST /diagnosis/cancel/:session_id
///
/// Triggers the session's cancellation token. 409 if the session is
/// already terminal, 404 if it does not exist.
pub async fn cancel_diagnosis(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CancelDiagnosisResponse>> {
    let token = state
        .cancellation_tokens
        .read()
        .await
        .get(&session_id)
        .cloned();

    match token {
        Some(token) => {
            token.cancel();
            Ok(Json(CancelDiagnosisResponse {
                session_id,
                cancelled_at: chrono::Utc::now(),
            }))
        }
        None => {
            // No active token: either the session finished or never existed
            let session = state
                .store
                .get(session_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))?;
            Err(ApiError::Conflict(format!(
                "session {} is already terminal ({})",
                session_id,
                session
                    .current_stage
                    .map(|s| s.as_str())
                    .unwrap_or("START")
            )))
        }
    }
}

/// Build diagnosis workflow routes
pub fn diagnosis_routes() -> Router<AppState> {
    Router::new()
        .route("/diagnosis/start", post(start_diagnosis))
        .route("/diagnosis/status/:session_id", get(diagnosis_status))
        .route("/diagnosis/report/:session_id", get(diagnosis_report))
        .route("/diagnosis/cancel/:session_id", post(cancel_diagnosis))
}
