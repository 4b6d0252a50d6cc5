//! External vision LLM boundary

mod client;

pub use client::{HttpVisionClient, VisionModel, VisionModelError};
