//! Wire protocol for observer connections.

use agent_relay_core::{SessionState, StreamEvent};
use agent_relay_hub::Envelope;
use serde::{Deserialize, Serialize};

/// Frame pushed to an observer. Observers send nothing back.
///
/// A `state` frame is sent once on (re)join; every accepted event after that
/// arrives as an `event` frame carrying the resulting state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Full snapshot, sent on join.
    State { data: SessionState },
    /// One accepted event plus the state it produced.
    Event {
        event: StreamEvent,
        state: SessionState,
    },
}

impl ServerFrame {
    /// Snapshot frame for a newly joined observer.
    #[must_use]
    pub const fn snapshot(state: SessionState) -> Self {
        Self::State { data: state }
    }
}

impl From<Envelope> for ServerFrame {
    fn from(envelope: Envelope) -> Self {
        Self::Event {
            event: envelope.event,
            state: envelope.state,
        }
    }
}
