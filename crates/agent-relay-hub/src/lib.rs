//! Session hub: one canonical state per session, serialized event
//! application, and ordered fan-out to every observer.
//!
//! Provides:
//! - `SessionHub` - Registry of sessions with per-session serialized apply
//! - `ObserverFeed` - Snapshot-then-tail subscription handle
//! - Storage implementations (memory)

pub mod hub;
pub mod storage;

pub use hub::{Envelope, HubError, ObserverFeed, SessionHub};

#[cfg(feature = "memory")]
pub use storage::memory::MemoryStateStore;
