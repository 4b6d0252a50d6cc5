//! Shared test fixtures: mock vision models and bootstrap payloads
#![allow(dead_code)] // not every test binary uses every fixture

use async_trait::async_trait;
use drdx_engine::llm::{VisionModel, VisionModelError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Vision model that always returns the same scripted reply and counts calls
pub struct ScriptedVision {
    reply: String,
    calls: Arc<AtomicUsize>,
}

impl ScriptedVision {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    async fn consult(&self, _prompt: &str) -> Result<String, VisionModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Vision model that always fails at the transport boundary
pub struct FailingVision;

#[async_trait]
impl VisionModel for FailingVision {
    async fn consult(&self, _prompt: &str) -> Result<String, VisionModelError> {
        Err(VisionModelError::Status(503))
    }
}

/// Vision model that never answers within any reasonable budget
pub struct HangingVision;

#[async_trait]
impl VisionModel for HangingVision {
    async fn consult(&self, _prompt: &str) -> Result<String, VisionModelError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Err(VisionModelError::EmptyReply)
    }
}

/// Well-formed bootstrap payload: grade 2 at 85% confidence
pub fn moderate_payload() -> String {
    r#"{
        "model_grade": 2,
        "confidence": 85,
        "image_path": "/data/retina/sample.jpg",
        "patient_info": {
            "age": 58,
            "diabetes_type": "type 2",
            "diabetes_duration": 10,
            "hbA1c": 7.5,
            "other_conditions": []
        }
    }"#
    .to_string()
}

/// Scripted reply agreeing with the moderate payload
pub fn agreeing_vision_reply() -> String {
    r#"{"predicted_grade": 2, "confidence": 0.9, "key_findings": ["dot hemorrhages", "hard exudates"], "rationale": "typical moderate NPDR features"}"#
        .to_string()
}
