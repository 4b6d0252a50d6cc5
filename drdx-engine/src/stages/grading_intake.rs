//! Grading intake stage
//!
//! **[DRX-INTAKE-010]** Parses the session's bootstrap payload into a
//! normalized `GradingResult`. Intake failures are recoverable, never
//! fatal: any parse problem yields the zero-grade default so the workflow
//! continues, with a diagnostic recorded for observability.

use crate::models::{GradingResult, PatientInfo};
use drdx_common::Grade;
use serde::Deserialize;
use tracing::warn;

/// Wire shape of the upstream classifier payload
#[derive(Debug, Deserialize)]
struct IntakePayload {
    model_grade: Grade,
    confidence: f64,
    #[serde(default)]
    image_path: String,
    #[serde(default)]
    patient_info: PatientInfo,
}

/// Outcome of intake: the result plus the parse diagnostic, if any
#[derive(Debug)]
pub struct IntakeOutcome {
    /// Always well-formed; the default on parse failure
    pub result: GradingResult,
    /// Why the default was substituted, when it was
    pub defaulted: Option<String>,
}

/// Parse the bootstrap payload; never fails past this boundary
pub fn ingest(payload: &str) -> IntakeOutcome {
    match serde_json::from_str::<IntakePayload>(payload) {
        Ok(parsed) => IntakeOutcome {
            result: GradingResult {
                grade: parsed.model_grade,
                confidence: parsed.confidence.clamp(0.0, 100.0),
                image_path: parsed.image_path,
                patient_info: parsed.patient_info,
            },
            defaulted: None,
        },
        Err(e) => {
            let reason = format!("intake payload rejected: {}", e);
            warn!(error = %e, "Grading intake parse failed, using zero-grade default");
            IntakeOutcome {
                result: default_result(),
                defaulted: Some(reason),
            }
        }
    }
}

/// The recovery default: grade 0, confidence 0, empty patient fields
fn default_result() -> GradingResult {
    GradingResult {
        grade: Grade::None,
        confidence: 0.0,
        image_path: String::new(),
        patient_info: PatientInfo::default(),
    }
}
