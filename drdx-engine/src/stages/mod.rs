//! Workflow stages and the supervisor that sequences them
//!
//! Control flow is hub-and-spoke: every stage hands control back to the
//! supervisor, which consults the fixed successor table to decide the next
//! hop. The orchestrator drives that loop, checkpointing after every stage.

pub mod grading_intake;
pub mod integration;
pub mod knowledge;
pub mod orchestrator;
pub mod report;
pub mod supervisor;
pub mod vision_consultation;
