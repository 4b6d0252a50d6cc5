//! Stage-produced result records
//!
//! Each record is produced by exactly one workflow stage and is immutable
//! once recorded on the session.

use super::PatientInfo;
use chrono::{DateTime, Utc};
use drdx_common::{Grade, Severity};
use serde::{Deserialize, Serialize};

/// Output of the grading intake stage
///
/// Normalized form of the upstream classifier payload. Always well-formed:
/// intake substitutes `{grade: 0, confidence: 0}` on parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    /// Classifier grade on the 0-4 scale
    pub grade: Grade,
    /// Classifier confidence as a percentage, clamped to [0, 100]
    pub confidence: f64,
    /// Path of the analyzed fundus image (informational)
    pub image_path: String,
    /// Patient fields carried in the same payload
    pub patient_info: PatientInfo,
}

/// Wire shape of a structured vision-LLM reply
///
/// Field names match the JSON contract the prompt asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionReply {
    /// Grade predicted by the vision model
    pub predicted_grade: Grade,
    /// Self-reported confidence in [0, 1]
    pub confidence: f64,
    /// Key clinical findings
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Free-text reasoning
    #[serde(default)]
    pub rationale: String,
}

/// Output of the vision consultation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionResult {
    /// Grade from the vision opinion (or the mirrored fallback)
    pub predicted_grade: Grade,
    /// Self-reported confidence in [0, 1] (0.7 for the fallback)
    pub confidence: f64,
    /// Findings list
    pub findings: Vec<String>,
    /// Reasoning text
    pub rationale: String,
}

/// Per-model confidences carried into fusion and the report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScores {
    /// Grading-model confidence, normalized to [0, 1]
    pub grading: f64,
    /// Vision confidence used by fusion (fixed, see the fusion engine)
    pub vision: f64,
}

/// Named ensemble weight pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    /// Weight of the numeric grading model
    pub grading: f64,
    /// Weight of the vision opinion
    pub vision: f64,
}

/// Output of the ensemble fusion stage
///
/// Carries both raw grades, both confidences, the weighted score and the
/// weights for audit purposes. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedResult {
    /// Fused final grade
    pub final_grade: Grade,
    /// Raw grade from the grading model
    pub grading_grade: Grade,
    /// Raw grade from the vision opinion
    pub vision_grade: Grade,
    /// Confidences that entered the weighted score
    pub confidence_scores: ConfidenceScores,
    /// The unrounded weighted score
    pub weighted_score: f64,
    /// Weights that produced the score
    pub model_weights: ModelWeights,
    /// Whether the two raw grades were identical before fusion
    pub agreement: bool,
}

/// Grade-independent clinical targets attached to every recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalTargets {
    /// Glycemic target
    pub hba1c: String,
    /// Blood pressure target
    pub blood_pressure: String,
}

/// Treatment guidance for one final grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    /// Medication recommendations (may be empty)
    pub medications: Vec<String>,
    /// Procedural recommendations (may be empty)
    pub procedures: Vec<String>,
    /// Lifestyle guidance (may be empty)
    pub lifestyle: Vec<String>,
    /// Follow-up interval description; tightens with severity
    pub followup_interval: String,
    /// Next examinations to schedule (grade-independent)
    pub next_exams: Vec<String>,
    /// Clinical targets (grade-independent)
    pub targets: ClinicalTargets,
    /// Patient education points (may be empty)
    pub patient_education: Vec<String>,
    /// Warning signs requiring immediate attention (grade-independent)
    pub warning_signs: Vec<String>,
}

/// Diagnosis summary section of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisSummary {
    /// Final grade
    pub grade: Grade,
    /// Fixed clinical description for the grade
    pub description: String,
    /// Severity band
    pub severity: Severity,
}

/// Model analysis section of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAnalysis {
    /// Grade from the numeric grading model
    pub grading_grade: Grade,
    /// Grade from the vision opinion
    pub vision_grade: Grade,
    /// Whether the two grades agreed before fusion
    pub agreement: bool,
    /// Confidences used by fusion
    pub confidence_scores: ConfidenceScores,
}

/// Terminal report artifact; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    /// Diagnosis summary
    pub summary: DiagnosisSummary,
    /// Model analysis with agreement flag
    pub model_analysis: ModelAnalysis,
    /// Treatment recommendations for the final grade
    pub recommendations: RecommendationSet,
    /// Patient information echoed from intake
    pub patient_info: PatientInfo,
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
}
