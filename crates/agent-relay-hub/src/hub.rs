//! Registry of sessions with serialized per-session event application.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use agent_relay_core::{
    EventHistory, SessionConfig, SessionId, SessionState, StateStore, StoreError, StreamEvent,
    reduce,
};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, broadcast};

/// Per-observer buffering; an observer this far behind is lagged and gets
/// dropped by its transport rather than blocking the others.
pub const OBSERVER_CHANNEL_CAPACITY: usize = 1024;

/// Hub error.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What every observer receives for each accepted event: the event itself
/// plus the state that resulted from applying it.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub event: StreamEvent,
    pub state: SessionState,
}

/// Subscription handle: the state at join time plus a live tail containing
/// exactly the events accepted after that snapshot.
pub struct ObserverFeed {
    pub snapshot: SessionState,
    pub events: broadcast::Receiver<Envelope>,
}

struct SessionInner {
    state: SessionState,
    history: EventHistory,
    observers: broadcast::Sender<Envelope>,
}

struct SessionEntry {
    // Serializes apply + broadcast per session; sessions are independent.
    inner: Mutex<SessionInner>,
}

/// Owns one `SessionState` per session id. All mutation goes through
/// `handle_event` under the per-session lock; nothing else may touch the
/// state. Pass an instance explicitly to callers, never a global.
pub struct SessionHub<S: StateStore> {
    store: S,
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl<S: StateStore> SessionHub<S> {
    /// Create a hub backed by the given persistent store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session in `idle` state.
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the id is registered.
    pub async fn create_session(
        &self,
        id: SessionId,
        config: SessionConfig,
    ) -> Result<SessionState, HubError> {
        let state = SessionState::new(id, config);
        self.register(state.clone()).await?;
        if let Err(e) = self.store.save(&state).await {
            tracing::error!(%id, error = %e, "failed to persist initial session state");
        }
        Ok(state)
    }

    /// Re-register a session from the persistent store after a restart.
    ///
    /// # Errors
    /// Returns `NotFound` if the store holds no state for the id, or
    /// `AlreadyExists` if the session is live.
    pub async fn resume_session(&self, id: SessionId) -> Result<SessionState, HubError> {
        let state = self.store.load(id).await?.ok_or(HubError::NotFound(id))?;
        self.register(state.clone()).await?;
        Ok(state)
    }

    async fn register(&self, state: SessionState) -> Result<(), HubError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&state.id) {
            return Err(HubError::AlreadyExists(state.id));
        }
        let (observers, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        sessions.insert(
            state.id,
            Arc::new(SessionEntry {
                inner: Mutex::new(SessionInner {
                    state,
                    history: EventHistory::new(),
                    observers,
                }),
            }),
        );
        Ok(())
    }

    /// Accept one event: append to history, reduce, broadcast, persist.
    ///
    /// Runs as one atomic unit under the session's lock, so broadcast order
    /// equals application order equals history order. Events for different
    /// sessions proceed in parallel.
    ///
    /// # Errors
    /// Returns `NotFound` for an unregistered session.
    pub async fn handle_event(
        &self,
        id: SessionId,
        mut event: StreamEvent,
    ) -> Result<Envelope, HubError> {
        let entry = self.entry(id).await?;
        let mut inner = entry.inner.lock().await;

        event.stamp(now_ms());
        inner.history.push(event.clone());
        reduce(&mut inner.state, &event);

        let envelope = Envelope {
            event,
            state: inner.state.clone(),
        };
        // Best-effort fan-out; send only fails when no observer is registered.
        let delivered = inner.observers.send(envelope.clone()).unwrap_or(0);
        tracing::debug!(
            %id,
            kind = envelope.event.kind(),
            status = ?envelope.state.status,
            observers = delivered,
            "event applied"
        );

        if let Err(e) = self.store.save(&inner.state).await {
            // State stays authoritative in memory; staleness of the store is
            // surfaced here rather than failing the event.
            tracing::error!(%id, error = %e, "failed to persist session state");
        }

        Ok(envelope)
    }

    /// Subscribe an observer. The snapshot and the live tail are taken under
    /// the same lock as `handle_event`, so the tail starts exactly after the
    /// snapshot: no gap, no duplicate.
    ///
    /// Dropping the returned receiver unsubscribes.
    ///
    /// # Errors
    /// Returns `NotFound` for an unregistered session.
    pub async fn subscribe(&self, id: SessionId) -> Result<ObserverFeed, HubError> {
        let entry = self.entry(id).await?;
        let inner = entry.inner.lock().await;
        Ok(ObserverFeed {
            snapshot: inner.state.clone(),
            events: inner.observers.subscribe(),
        })
    }

    /// Current state of a session.
    ///
    /// # Errors
    /// Returns `NotFound` for an unregistered session.
    pub async fn session_state(&self, id: SessionId) -> Result<SessionState, HubError> {
        let entry = self.entry(id).await?;
        let inner = entry.inner.lock().await;
        Ok(inner.state.clone())
    }

    /// Full event log of a session.
    ///
    /// # Errors
    /// Returns `NotFound` for an unregistered session.
    pub async fn event_history(&self, id: SessionId) -> Result<Vec<StreamEvent>, HubError> {
        let entry = self.entry(id).await?;
        let inner = entry.inner.lock().await;
        Ok(inner.history.snapshot())
    }

    /// Ids of all live sessions.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }

    async fn entry(&self, id: SessionId) -> Result<Arc<SessionEntry>, HubError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(HubError::NotFound(id))
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use agent_relay_core::{SessionStatus, TokenUsage};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::storage::memory::MemoryStateStore;

    fn hub() -> SessionHub<MemoryStateStore> {
        SessionHub::new(MemoryStateStore::new())
    }

    fn assistant(n: usize) -> StreamEvent {
        StreamEvent::Assistant {
            message: format!("m{n}"),
            timestamp: Some(n as i64),
        }
    }

    fn tool_use(id: &str) -> StreamEvent {
        StreamEvent::ToolUse {
            id: id.into(),
            tool: "Read".into(),
            input: json!({}),
            timestamp: Some(1),
        }
    }

    #[tokio::test]
    async fn create_then_duplicate_is_rejected() {
        let hub = hub();
        let id = Uuid::new_v4();
        let state = hub.create_session(id, SessionConfig::default()).await.unwrap();
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(matches!(
            hub.create_session(id, SessionConfig::default()).await,
            Err(HubError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn handle_event_for_unknown_session_is_not_found() {
        let hub = hub();
        assert!(matches!(
            hub.handle_event(Uuid::new_v4(), assistant(1)).await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn events_are_stamped_and_logged_in_order() {
        let hub = hub();
        let id = Uuid::new_v4();
        hub.create_session(id, SessionConfig::default()).await.unwrap();

        let unstamped = StreamEvent::Assistant { message: "hi".into(), timestamp: None };
        let envelope = hub.handle_event(id, unstamped).await.unwrap();
        assert!(envelope.event.timestamp().is_some());

        hub.handle_event(id, tool_use("t1")).await.unwrap();
        let history = hub.event_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind(), "assistant");
        assert_eq!(history[1].kind(), "tool_use");
    }

    #[tokio::test]
    async fn snapshot_then_tail_has_no_gap_and_no_duplicate() {
        let hub = hub();
        let id = Uuid::new_v4();
        hub.create_session(id, SessionConfig::default()).await.unwrap();

        hub.handle_event(id, assistant(1)).await.unwrap();
        hub.handle_event(id, assistant(2)).await.unwrap();

        let mut feed = hub.subscribe(id).await.unwrap();
        assert_eq!(feed.snapshot.messages.len(), 2);

        hub.handle_event(id, assistant(3)).await.unwrap();
        hub.handle_event(id, assistant(4)).await.unwrap();

        let first = feed.events.recv().await.unwrap();
        let second = feed.events.recv().await.unwrap();
        assert_eq!(first.event, assistant(3));
        assert_eq!(second.event, assistant(4));
        assert_eq!(second.state.messages.len(), 4);
    }

    #[tokio::test]
    async fn all_observers_receive_identical_broadcasts() {
        let hub = hub();
        let id = Uuid::new_v4();
        hub.create_session(id, SessionConfig::default()).await.unwrap();

        let mut a = hub.subscribe(id).await.unwrap();
        let mut b = hub.subscribe(id).await.unwrap();

        hub.handle_event(id, tool_use("t1")).await.unwrap();
        hub.handle_event(id, assistant(2)).await.unwrap();

        for _ in 0..2 {
            let from_a = a.events.recv().await.unwrap();
            let from_b = b.events.recv().await.unwrap();
            assert_eq!(from_a.event, from_b.event);
            assert_eq!(from_a.state, from_b.state);
        }
    }

    #[tokio::test]
    async fn rejoin_gets_fresh_snapshot_and_only_later_events() {
        let hub = hub();
        let id = Uuid::new_v4();
        hub.create_session(id, SessionConfig::default()).await.unwrap();

        let first_join = hub.subscribe(id).await.unwrap();
        drop(first_join);

        hub.handle_event(id, assistant(1)).await.unwrap();

        let mut rejoined = hub.subscribe(id).await.unwrap();
        assert_eq!(rejoined.snapshot.messages.len(), 1);

        hub.handle_event(id, assistant(2)).await.unwrap();
        let tail = rejoined.events.recv().await.unwrap();
        assert_eq!(tail.event, assistant(2));
    }

    #[tokio::test]
    async fn interleaved_sessions_do_not_cross_contaminate() {
        let hub = Arc::new(hub());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        hub.create_session(a, SessionConfig::default()).await.unwrap();
        hub.create_session(b, SessionConfig::default()).await.unwrap();

        let feed_a = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for n in 0..20 {
                    hub.handle_event(a, tool_use(&format!("a{n}"))).await.unwrap();
                }
                hub.handle_event(
                    a,
                    StreamEvent::Result {
                        cost_usd: 0.01,
                        duration_ms: 5,
                        usage: TokenUsage::default(),
                        timestamp: Some(99),
                    },
                )
                .await
                .unwrap();
            })
        };
        let feed_b = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for n in 0..5 {
                    hub.handle_event(b, tool_use(&format!("b{n}"))).await.unwrap();
                }
                hub.handle_event(b, StreamEvent::synthetic_complete(1)).await.unwrap();
            })
        };
        feed_a.await.unwrap();
        feed_b.await.unwrap();

        let state_a = hub.session_state(a).await.unwrap();
        let state_b = hub.session_state(b).await.unwrap();
        assert_eq!(state_a.tools.len(), 20);
        assert_eq!(state_a.status, SessionStatus::Completed);
        assert_eq!(state_b.tools.len(), 5);
        assert_eq!(state_b.status, SessionStatus::Error);
        assert_eq!(hub.event_history(a).await.unwrap().len(), 21);
        assert_eq!(hub.event_history(b).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn state_is_persisted_and_resumable() {
        let store = MemoryStateStore::new();
        let id = Uuid::new_v4();
        {
            let hub = SessionHub::new(store.clone());
            hub.create_session(id, SessionConfig::default()).await.unwrap();
            hub.handle_event(id, tool_use("t1")).await.unwrap();
        }

        let hub = SessionHub::new(store);
        let resumed = hub.resume_session(id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Running);
        assert_eq!(resumed.tools.len(), 1);

        assert!(matches!(
            hub.resume_session(Uuid::new_v4()).await,
            Err(HubError::NotFound(_))
        ));
    }
}
