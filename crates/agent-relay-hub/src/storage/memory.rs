//! In-memory state store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use agent_relay_core::{SessionId, SessionState, StateStore, StoreError};
use async_trait::async_trait;

/// In-memory store implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<RwLock<HashMap<SessionId, SessionState>>>,
}

impl MemoryStateStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, id: SessionId) -> Result<Option<SessionState>, StoreError> {
        Ok(self
            .states
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .get(&id)
            .cloned())
    }

    async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        self.states
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .insert(state.id, state.clone());
        Ok(())
    }
}
