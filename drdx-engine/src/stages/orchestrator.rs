//! Workflow orchestrator
//!
//! **[DRX-WF-040]** Drives the hub-and-spoke loop: consult the supervisor,
//! run the decided stage, apply its output and the stage advance to the
//! in-memory session, persist both in one checkpoint, emit the progress
//! event, repeat. Honors the session's cancellation token between stages
//! and at the LLM-call suspension point.

use crate::checkpoint::CheckpointStore;
use crate::llm::VisionModel;
use crate::models::{DiagnosisSession, DiagnosisStage, SessionMessage};
use crate::stages::{grading_intake, integration, knowledge, report, supervisor, vision_consultation};
use chrono::Utc;
use drdx_common::events::{DiagnosisEvent, EventBus};
use drdx_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Notice appended to the message log when routing falls into OTHER
const CANNOT_PROCESS_NOTICE: &str = "The diagnosis system cannot process this request";

enum StageOutcome {
    Completed,
    Cancelled,
}

/// Drives diagnosis sessions through the stage sequence
pub struct Orchestrator {
    store: Arc<dyn CheckpointStore>,
    event_bus: EventBus,
    vision_model: Arc<dyn VisionModel>,
    llm_budget: Duration,
}

impl Orchestrator {
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
        }
    }

    /// Create a session from the bootstrap payload and checkpoint it
    pub async fn create_session(&self, bootstrap_payload: String) -> Result<DiagnosisSession> {
        let session = DiagnosisSession::new(bootstrap_payload);
        self.store.put(&session).await?;
        Ok(session)
    }

    /// Run the session until it reaches a terminal stage
    ///
    /// Idempotent over finished sessions: a populated `final_report` routes
    /// straight to DONE without re-running any stage. Returns the terminal
    /// session state; an `Err` means the session was marked FAILED.
    pub async fn run(
        &self,
        session_id: Uuid,
        cancel: CancellationToken,
    ) -> Result<DiagnosisSession> {
        let mut session = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

        if session.current_stage.is_none() {
            info!(session_id = %session_id, "Starting diagnosis workflow");
            self.event_bus.emit_lossy(DiagnosisEvent::DiagnosisStarted {
                session_id,
                timestamp: Utc::now(),
            });
        }

        loop {
            if cancel.is_cancelled() {
                return self.finish_cancelled(session).await;
            }

            match supervisor::decide_next(&session) {
                DiagnosisStage::Done => {
                    if session.current_stage != Some(DiagnosisStage::Done) {
                        session.advance_to(DiagnosisStage::Done);
                        self.store.put(&session).await?;
                        if let Some(report) = &session.final_report {
                            self.event_bus.emit_lossy(DiagnosisEvent::DiagnosisCompleted {
                                session_id,
                                final_grade: report.summary.grade,
                                agreement: report.model_analysis.agreement,
                                timestamp: Utc::now(),
                            });
                        }
                        info!(session_id = %session_id, "Diagnosis workflow completed");
                    }
                    return Ok(session);
                }
                DiagnosisStage::Other => {
                    // Terminal by design: re-entering the loop from OTHER
                    // would never make progress
                    warn!(
                        session_id = %session_id,
                        stage = ?session.current_stage,
                        "Unrecognized workflow stage, terminating session"
                    );
                    session.append_messages(vec![SessionMessage::engine(CANNOT_PROCESS_NOTICE)]);
                    session.advance_to(DiagnosisStage::Other);
                    self.store.put(&session).await?;
                    self.event_bus.emit_lossy(DiagnosisEvent::DiagnosisFailed {
                        session_id,
                        error: CANNOT_PROCESS_NOTICE.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Ok(session);
                }
                stage => match self.run_stage(&mut session, stage, &cancel).await {
                    Ok(StageOutcome::Completed) => {
                        session.advance_to(stage);
                        self.store.put(&session).await?;
                        info!(session_id = %session_id, stage = %stage.as_str(), "Stage completed");
                        self.event_bus.emit_lossy(DiagnosisEvent::StageCompleted {
                            session_id,
                            stage: stage.as_str().to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                    Ok(StageOutcome::Cancelled) => {
                        return self.finish_cancelled(session).await;
                    }
                    Err(e) => {
                        return self.finish_failed(session, e).await;
                    }
                },
            }
        }
    }

    /// Run one non-terminal stage against the session
    ///
    /// On success the stage's output is recorded (write-once); on failure
    /// the session is left unchanged at that field.
    async fn run_stage(
        &self,
        session: &mut DiagnosisSession,
        stage: DiagnosisStage,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome> {
        let session_id = session.session_id;
        match stage {
            DiagnosisStage::GradingAnalysis => {
                let payload = session.bootstrap_payload().unwrap_or_default().to_string();
                let outcome = grading_intake::ingest(&payload);
                if let Some(reason) = outcome.defaulted {
                    self.event_bus.emit_lossy(DiagnosisEvent::IntakeDefaulted {
                        session_id,
                        reason,
                        timestamp: Utc::now(),
                    });
                }
                session.record_grading(outcome.result)?;
            }

            DiagnosisStage::VisionAnalysis => {
                let grading = session.grading_result.clone().ok_or_else(|| {
                    Error::Internal("vision consultation requires a grading result".to_string())
                })?;
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => return Ok(StageOutcome::Cancelled),
                    outcome = vision_consultation::consult(
                        self.vision_model.as_ref(),
                        &grading,
                        self.llm_budget,
                    ) => outcome,
                };
                if let Some(reason) = outcome.fell_back {
                    self.event_bus.emit_lossy(DiagnosisEvent::VisionFallback {
                        session_id,
                        reason,
                        timestamp: Utc::now(),
                    });
                }
                session.record_vision(outcome.result)?;
            }

            DiagnosisStage::Integration => {
                let grading = session.grading_result.clone().ok_or_else(|| {
                    Error::Internal("fusion requires a grading result".to_string())
                })?;
                let vision = session.vision_result.clone().ok_or_else(|| {
                    Error::Internal("fusion requires a vision result".to_string())
                })?;
                session.record_integration(integration::fuse(&grading, &vision))?;
            }

            DiagnosisStage::KnowledgeQuery => {
                let final_grade = session
                    .integrated_result
                    .as_ref()
                    .map(|r| r.final_grade)
                    .ok_or_else(|| {
                        Error::Internal("recommendation lookup requires a fused grade".to_string())
                    })?;
                session.record_recommendations(knowledge::recommend(final_grade))?;
            }

            DiagnosisStage::ReportGeneration => {
                let integrated = session.integrated_result.clone().ok_or_else(|| {
                    Error::Internal("report assembly requires a fused result".to_string())
                })?;
                let recommendations = session.recommendations.clone().ok_or_else(|| {
                    Error::Internal("report assembly requires recommendations".to_string())
                })?;
                let assembled =
                    report::assemble(&integrated, session.patient_info.clone(), recommendations);
                let rendered = report::render(&assembled);
                session.append_messages(vec![SessionMessage::engine(rendered)]);
                session.record_report(assembled)?;
            }

            DiagnosisStage::Done
            | DiagnosisStage::Other
            | DiagnosisStage::Cancelled
            | DiagnosisStage::Failed => {
                return Err(Error::Internal(format!(
                    "terminal stage {} cannot be executed",
                    stage.as_str()
                )));
            }
        }
        Ok(StageOutcome::Completed)
    }

    async fn finish_cancelled(&self, mut session: DiagnosisSession) -> Result<DiagnosisSession> {
        let session_id = session.session_id;
        info!(session_id = %session_id, "Diagnosis workflow cancelled");
        session.advance_to(DiagnosisStage::Cancelled);
        self.store.put(&session).await?;
        self.event_bus.emit_lossy(DiagnosisEvent::DiagnosisCancelled {
            session_id,
            timestamp: Utc::now(),
        });
        Ok(session)
    }

    async fn finish_failed(
        &self,
        mut session: DiagnosisSession,
        error: Error,
    ) -> Result<DiagnosisSession> {
        let session_id = session.session_id;
        warn!(session_id = %session_id, error = %error, "Diagnosis workflow failed");
        session.advance_to(DiagnosisStage::Failed);
        if let Err(put_err) = self.store.put(&session).await {
            warn!(session_id = %session_id, error = %put_err, "Failed to checkpoint FAILED state");
        }
        self.event_bus.emit_lossy(DiagnosisEvent::DiagnosisFailed {
            session_id,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
        Err(error)
    }
}
