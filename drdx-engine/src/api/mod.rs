//! HTTP API handlers

mod diagnosis;
mod health;
mod sse;

pub use diagnosis::diagnosis_routes;
pub use health::health_routes;
pub use sse::event_stream;
