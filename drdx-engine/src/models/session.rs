//! Diagnosis session state machine record
//!
//! **[DRX-WF-010]** A session progresses through the fixed stage sequence:
//! GRADING_ANALYSIS → VISION_ANALYSIS → INTEGRATION → KNOWLEDGE_QUERY →
//! REPORT_GENERATION → DONE, with OTHER / CANCELLED / FAILED as terminal
//! off-ramps.

use super::{
    DiagnosisReport, GradingResult, IntegratedResult, PatientInfo, RecommendationSet, VisionResult,
};
use chrono::{DateTime, Utc};
use drdx_common::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// **[DRX-WF-010]** Workflow stage
///
/// `START` is represented by `DiagnosisSession::current_stage == None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosisStage {
    /// Parse and normalize the upstream classifier payload
    GradingAnalysis,
    /// Consult the external vision LLM
    VisionAnalysis,
    /// Fuse the two grade estimates
    Integration,
    /// Look up treatment recommendations
    KnowledgeQuery,
    /// Assemble and render the final report
    ReportGeneration,
    /// Workflow finished successfully
    Done,
    /// Routing fallback for an unrecognized stage; terminal
    Other,
    /// Cancelled by the user
    Cancelled,
    /// Failed with an unrecoverable error
    Failed,
}

impl DiagnosisStage {
    /// Whether the stage ends the workflow
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DiagnosisStage::Done
                | DiagnosisStage::Other
                | DiagnosisStage::Cancelled
                | DiagnosisStage::Failed
        )
    }

    /// Wire name, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosisStage::GradingAnalysis => "GRADING_ANALYSIS",
            DiagnosisStage::VisionAnalysis => "VISION_ANALYSIS",
            DiagnosisStage::Integration => "INTEGRATION",
            DiagnosisStage::KnowledgeQuery => "KNOWLEDGE_QUERY",
            DiagnosisStage::ReportGeneration => "REPORT_GENERATION",
            DiagnosisStage::Done => "DONE",
            DiagnosisStage::Other => "OTHER",
            DiagnosisStage::Cancelled => "CANCELLED",
            DiagnosisStage::Failed => "FAILED",
        }
    }
}

/// Who produced a session message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Caller-supplied content (the bootstrap payload)
    User,
    /// Engine-produced content (rendered report, routing notices)
    Engine,
}

/// One entry in the append-only message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Message origin
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// When the message was appended
    pub timestamp: DateTime<Utc>,
}

impl SessionMessage {
    /// Caller-supplied message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Engine-produced message
    pub fn engine(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Engine,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One diagnostic run
///
/// **[DRX-WF-020]** Owned exclusively by the engine for the session's
/// lifetime. Each stage-produced field is written exactly once; recording
/// into an already-populated field is an internal error and leaves the
/// session unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisSession {
    /// Unique session identifier (checkpoint key)
    pub session_id: Uuid,

    /// Current workflow stage; `None` until the first supervisor decision
    pub current_stage: Option<DiagnosisStage>,

    /// Append-only message log; entry 0 is the bootstrap payload
    pub messages: Vec<SessionMessage>,

    /// Patient fields, copied from the intake payload
    pub patient_info: PatientInfo,

    /// Grading intake output
    pub grading_result: Option<GradingResult>,

    /// Vision consultation output
    pub vision_result: Option<VisionResult>,

    /// Ensemble fusion output
    pub integrated_result: Option<IntegratedResult>,

    /// Recommendation lookup output
    pub recommendations: Option<RecommendationSet>,

    /// Terminal report artifact
    pub final_report: Option<DiagnosisReport>,

    /// Session start time
    pub started_at: DateTime<Utc>,

    /// Session end time, set when a terminal stage is reached
    pub ended_at: Option<DateTime<Utc>>,
}

impl DiagnosisSession {
    /// Create a new session from the bootstrap payload text
    pub fn new(bootstrap_payload: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            current_stage: None,
            messages: vec![SessionMessage::user(bootstrap_payload)],
            patient_info: PatientInfo::default(),
            grading_result: None,
            vision_result: None,
            integrated_result: None,
            recommendations: None,
            final_report: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// The raw payload the session was started with
    pub fn bootstrap_payload(&self) -> Option<&str> {
        self.messages.first().map(|m| m.content.as_str())
    }

    /// Append messages to the log; existing entries are never replaced
    pub fn append_messages(&mut self, incoming: Vec<SessionMessage>) {
        self.messages.extend(incoming);
    }

    /// Advance to a new stage, stamping `ended_at` on terminal stages
    pub fn advance_to(&mut self, stage: DiagnosisStage) {
        self.current_stage = Some(stage);
        if stage.is_terminal() && self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    /// Whether the session has reached a terminal stage
    pub fn is_terminal(&self) -> bool {
        self.current_stage.is_some_and(|s| s.is_terminal())
    }

    /// Record the grading intake output (write-once)
    ///
    /// Also copies the payload's patient fields onto the session, the one
    /// place `patient_info` is populated.
    pub fn record_grading(&mut self, result: GradingResult) -> Result<()> {
        if self.grading_result.is_some() {
            return Err(Error::Internal(
                "grading_result already recorded".to_string(),
            ));
        }
        self.patient_info = result.patient_info.clone();
        self.grading_result = Some(result);
        Ok(())
    }

    /// Record the vision consultation output (write-once)
    pub fn record_vision(&mut self, result: VisionResult) -> Result<()> {
        if self.vision_result.is_some() {
            return Err(Error::Internal("vision_result already recorded".to_string()));
        }
        self.vision_result = Some(result);
        Ok(())
    }

    /// Record the fusion output (write-once)
    pub fn record_integration(&mut self, result: IntegratedResult) -> Result<()> {
        if self.integrated_result.is_some() {
            return Err(Error::Internal(
                "integrated_result already recorded".to_string(),
            ));
        }
        self.integrated_result = Some(result);
        Ok(())
    }

    /// Record the recommendation lookup output (write-once)
    pub fn record_recommendations(&mut self, result: RecommendationSet) -> Result<()> {
        if self.recommendations.is_some() {
            return Err(Error::Internal(
                "recommendations already recorded".to_string(),
            ));
        }
        self.recommendations = Some(result);
        Ok(())
    }

    /// Record the terminal report (write-once)
    pub fn record_report(&mut self, report: DiagnosisReport) -> Result<()> {
        if self.final_report.is_some() {
            return Err(Error::Internal("final_report already recorded".to_string()));
        }
        self.final_report = Some(report);
        Ok(())
    }
}
