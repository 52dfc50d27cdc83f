//! Trait for the external persistent store.
//!
//! The store is a plain get/put resource holding canonical session state
//! between restarts; the hub is its only writer.

use async_trait::async_trait;
use thiserror::Error;

use crate::state::{SessionId, SessionState};

/// Store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("store error: {0}")]
    Internal(String),
}

/// Persistent store for canonical session state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load a session's state, if the store holds one.
    async fn load(&self, id: SessionId) -> Result<Option<SessionState>, StoreError>;

    /// Persist a session's state, replacing any prior value.
    async fn save(&self, state: &SessionState) -> Result<(), StoreError>;
}
