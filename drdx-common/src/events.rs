//! Event types for the DRDX event system
//!
//! Provides the shared `DiagnosisEvent` enum and `EventBus` used by the
//! workflow engine and the SSE endpoint. Events are broadcast via the bus
//! and serialized for SSE transmission.

use crate::grade::Grade;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// DRDX workflow events
///
/// **[DRX-EVT-010]** Every observable workflow hop emits one of these; the
/// SSE stream forwards them to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiagnosisEvent {
    /// Diagnosis session created and bootstrap payload accepted
    DiagnosisStarted {
        /// Session UUID
        session_id: Uuid,
        /// When the session started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One workflow stage finished and handed control back to the supervisor
    StageCompleted {
        /// Session UUID
        session_id: Uuid,
        /// Name of the stage that completed (wire form, e.g. "VISION_ANALYSIS")
        stage: String,
        /// When the stage completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Grading intake could not parse the bootstrap payload and substituted
    /// the zero-grade default
    IntakeDefaulted {
        /// Session UUID
        session_id: Uuid,
        /// Parse failure description (diagnostic only)
        reason: String,
        /// When the default was substituted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Vision consultation fell back to the grading-mirroring default
    /// (transport failure, timeout, or unparseable reply)
    VisionFallback {
        /// Session UUID
        session_id: Uuid,
        /// Failure description (diagnostic only)
        reason: String,
        /// When the fallback engaged
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session reached DONE with a final report
    DiagnosisCompleted {
        /// Session UUID
        session_id: Uuid,
        /// Fused final grade
        final_grade: Grade,
        /// Whether the two model opinions agreed
        agreement: bool,
        /// When the report was produced
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session was cancelled by the user
    DiagnosisCancelled {
        /// Session UUID
        session_id: Uuid,
        /// When cancellation took effect
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session failed with an unrecoverable error
    DiagnosisFailed {
        /// Session UUID
        session_id: Uuid,
        /// Error description
        error: String,
        /// When the failure occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DiagnosisEvent {
    /// Event type name for SSE `event:` fields and filtering
    pub fn event_type(&self) -> &str {
        match self {
            DiagnosisEvent::DiagnosisStarted { .. } => "DiagnosisStarted",
            DiagnosisEvent::StageCompleted { .. } => "StageCompleted",
            DiagnosisEvent::IntakeDefaulted { .. } => "IntakeDefaulted",
            DiagnosisEvent::VisionFallback { .. } => "VisionFallback",
            DiagnosisEvent::DiagnosisCompleted { .. } => "DiagnosisCompleted",
            DiagnosisEvent::DiagnosisCancelled { .. } => "DiagnosisCancelled",
            DiagnosisEvent::DiagnosisFailed { .. } => "DiagnosisFailed",
        }
    }

    /// Session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            DiagnosisEvent::DiagnosisStarted { session_id, .. }
            | DiagnosisEvent::StageCompleted { session_id, .. }
            | DiagnosisEvent::IntakeDefaulted { session_id, .. }
            | DiagnosisEvent::VisionFallback { session_id, .. }
            | DiagnosisEvent::DiagnosisCompleted { session_id, .. }
            | DiagnosisEvent::DiagnosisCancelled { session_id, .. }
            | DiagnosisEvent::DiagnosisFailed { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast bus for diagnosis events
///
/// Cloning the bus shares the underlying channel; every subscriber receives
/// every event emitted after its subscription.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DiagnosisEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use drdx_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosisEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DiagnosisEvent,
    ) -> Result<usize, broadcast::error::SendError<DiagnosisEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Workflow progress events are non-critical; it is acceptable for no
    /// SSE client to be connected.
    pub fn emit_lossy(&self, event: DiagnosisEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let session_id = Uuid::new_v4();
        bus.emit_lossy(DiagnosisEvent::DiagnosisStarted {
            session_id,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "DiagnosisStarted");
        assert_eq!(event.session_id(), session_id);
    }

    #[test]
    fn emit_without_subscribers_reports_error_and_lossy_does_not_panic() {
        let bus = EventBus::new(16);
        let event = DiagnosisEvent::DiagnosisCancelled {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = DiagnosisEvent::DiagnosisCompleted {
            session_id: Uuid::new_v4(),
            final_grade: Grade::Moderate,
            agreement: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DiagnosisCompleted");
        assert_eq!(json["final_grade"], 2);
        assert_eq!(json["agreement"], true);
    }
}
