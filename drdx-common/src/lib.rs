//! # DRDX Common Library
//!
//! Shared code for the DRDX diagnosis workflow service:
//! - Grading scale vocabulary (Grade, Severity)
//! - Event types (DiagnosisEvent enum) and EventBus
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod grade;

pub use error::{Error, Result};
pub use grade::{Grade, Severity};
