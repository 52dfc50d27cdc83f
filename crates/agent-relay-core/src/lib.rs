//! Core data model for agent session replication.
//!
//! This crate provides the fundamental building blocks:
//! - `StreamEvent` - Typed execution event enum (wire format)
//! - `SessionState` - Canonical reduced session state
//! - `reduce` - Pure event-fold state transition
//! - `EventHistory` - Append-only per-session event log
//! - `StateStore` trait for the external persistent store

pub mod event;
pub mod history;
pub mod reducer;
pub mod state;
pub mod store;

pub use event::{StreamEvent, TokenUsage};
pub use history::EventHistory;
pub use reducer::{TODO_TOOL, reduce};
pub use state::{
    DisplayMessage, MessageKind, SessionConfig, SessionId, SessionState, SessionStatus, TodoItem,
    TodoStatus, ToolExecution, ToolStatus,
};
pub use store::{StateStore, StoreError};
