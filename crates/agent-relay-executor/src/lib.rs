//! Executor-side pipeline: decode an executor's line-delimited event stream
//! and deliver it reliably to a session's ingest endpoint.
//!
//! Provides:
//! - `EventDecoder` - Chunk-buffered newline-delimited JSON decoder
//! - `Reporter` - At-least-once event delivery with bounded retry

pub mod decoder;
pub mod reporter;

pub use decoder::EventDecoder;
pub use reporter::{ReportError, Reporter, ReporterConfig};
