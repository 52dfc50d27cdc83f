//! Transport layer: HTTP ingest/query routes and the WebSocket observer
//! endpoint implementing the snapshot-then-tail reconnection protocol.

pub mod http;
pub mod protocol;
pub mod websocket;

pub use http::{ApiState, router};
pub use protocol::ServerFrame;
