//! Patient demographic and clinical fields

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Patient information carried through the workflow and into the report
///
/// The upstream payload is free-form; the known fields are typed and any
/// extra keys are preserved in `extra` so they survive into the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    /// Age in years
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    /// Diabetes type, e.g. "type 2"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diabetes_type: Option<String>,

    /// Years since diabetes diagnosis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diabetes_duration: Option<u32>,

    /// Most recent HbA1c percentage
    #[serde(rename = "hbA1c", skip_serializing_if = "Option::is_none")]
    pub hba1c: Option<f64>,

    /// Comorbidities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_conditions: Vec<String>,

    /// Any additional free-form fields from the upstream payload
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
