//! Append-only per-session event log, used for replay and audit.

use serde::{Deserialize, Serialize};

use crate::event::StreamEvent;

/// Ordered log of every event accepted for a session.
///
/// Same lifetime as the session; retention is the caller's policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventHistory {
    events: Vec<StreamEvent>,
}

impl EventHistory {
    /// Empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an accepted event.
    pub fn push(&mut self, event: StreamEvent) {
        self.events.push(event);
    }

    /// Number of events logged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether any events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Snapshot of the full log.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StreamEvent> {
        self.events.clone()
    }

    /// Iterate the log in order.
    pub fn iter(&self) -> impl Iterator<Item = &StreamEvent> {
        self.events.iter()
    }
}
