//! Session checkpoint store boundary
//!
//! **[DRX-CKPT-010]** Keyed by session id, isolated per id, no cross-key
//! transactions. The orchestrator applies a stage's output and its
//! `current_stage` advance to the in-memory session first, then persists
//! both in a single `put`, so a crash between them cannot leave a stage
//! recorded without its data (or vice versa).

use crate::models::DiagnosisSession;
use async_trait::async_trait;
use drdx_common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keyed session persistence boundary
///
/// Durable stores plug in behind this trait; the engine ships with the
/// in-memory implementation below.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Fetch the session for `session_id`, if one exists
    async fn get(&self, session_id: Uuid) -> Result<Option<DiagnosisSession>>;

    /// Persist the session under its id, replacing any previous checkpoint
    async fn put(&self, session: &DiagnosisSession) -> Result<()>;

    /// Remove the checkpoint for `session_id`; absent ids are a no-op
    async fn delete(&self, session_id: Uuid) -> Result<()>;
}

/// In-memory checkpoint store
///
/// Each `put` stores a deep copy, so callers cannot mutate a checkpoint
/// after persisting it.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    sessions: Arc<RwLock<HashMap<Uuid, DiagnosisSession>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpointed sessions (diagnostics)
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, session_id: Uuid) -> Result<Option<DiagnosisSession>> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn put(&self, session: &DiagnosisSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: Uuid) -> Result<()> {
        self.sessions.write().await.remove(&session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiagnosisStage;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryCheckpointStore::new();
        let session = DiagnosisSession::new("payload");
        let id = session.session_id;

        store.put(&session).await.unwrap();
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.session_id, id);
        assert_eq!(loaded.bootstrap_payload(), Some("payload"));
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_id() {
        let store = MemoryCheckpointStore::new();
        let a = DiagnosisSession::new("a");
        let b = DiagnosisSession::new("b");
        store.put(&a).await.unwrap();
        store.put(&b).await.unwrap();

        let loaded_a = store.get(a.session_id).await.unwrap().unwrap();
        assert_eq!(loaded_a.bootstrap_payload(), Some("a"));
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_is_a_copy_not_a_reference() {
        let store = MemoryCheckpointStore::new();
        let mut session = DiagnosisSession::new("payload");
        store.put(&session).await.unwrap();

        // Mutating the live session must not affect the stored checkpoint
        session.advance_to(DiagnosisStage::VisionAnalysis);
        let loaded = store.get(session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.current_stage, None);
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_session() {
        let store = MemoryCheckpointStore::new();
        let a = DiagnosisSession::new("a");
        let b = DiagnosisSession::new("b");
        store.put(&a).await.unwrap();
        store.put(&b).await.unwrap();

        store.delete(a.session_id).await.unwrap();
        assert!(store.get(a.session_id).await.unwrap().is_none());
        assert!(store.get(b.session_id).await.unwrap().is_some());
    }
}
