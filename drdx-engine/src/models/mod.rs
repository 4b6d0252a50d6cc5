//! Data model for the diagnosis workflow
//!
//! One `DiagnosisSession` per run, plus the stage-produced result records.
//! Stage outputs are write-once: each record is produced by exactly one
//! stage and never overwritten afterwards.

mod patient;
mod results;
mod session;

pub use patient::PatientInfo;
pub use results::{
    ClinicalTargets, ConfidenceScores, DiagnosisReport, DiagnosisSummary, GradingResult,
    IntegratedResult, ModelAnalysis, ModelWeights, RecommendationSet, VisionReply, VisionResult,
};
pub use session::{DiagnosisSession, DiagnosisStage, MessageRole, SessionMessage};
