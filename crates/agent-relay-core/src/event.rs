//! Execution events emitted by an agent executor.
//!
//! One JSON object per line on the wire; the `type` field selects the
//! variant. Lines with an unrecognized `type` fail deserialization and are
//! dropped by the decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token usage reported by the executor's terminal `result` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens consumed.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens produced.
    #[serde(default)]
    pub output_tokens: u64,
}

/// One execution event in a session's stream.
///
/// Timestamps are Unix epoch milliseconds. Executors may omit them; the hub
/// stamps missing timestamps at acceptance time so history and reduction stay
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Free-text assistant message.
    Assistant {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Tool invocation.
    ToolUse {
        id: String,
        tool: String,
        #[serde(default)]
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Output (or failure) of a prior `tool_use`, referenced by id.
    ToolResult {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Terminal success summary.
    Result {
        #[serde(default)]
        cost_usd: f64,
        #[serde(default)]
        duration_ms: u64,
        #[serde(default)]
        usage: TokenUsage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Failure message, terminal or not.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Executor process exit.
    Complete {
        exit_code: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

impl StreamEvent {
    /// Event type tag, for logs and delivery-failure reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Assistant { .. } => "assistant",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }

    /// Timestamp carried by the event, if any.
    #[must_use]
    pub const fn timestamp(&self) -> Option<i64> {
        match self {
            Self::Assistant { timestamp, .. }
            | Self::ToolUse { timestamp, .. }
            | Self::ToolResult { timestamp, .. }
            | Self::Result { timestamp, .. }
            | Self::Error { timestamp, .. }
            | Self::Complete { timestamp, .. } => *timestamp,
        }
    }

    /// Fill in the timestamp if the executor omitted one.
    pub fn stamp(&mut self, at: i64) {
        let ts = match self {
            Self::Assistant { timestamp, .. }
            | Self::ToolUse { timestamp, .. }
            | Self::ToolResult { timestamp, .. }
            | Self::Result { timestamp, .. }
            | Self::Error { timestamp, .. }
            | Self::Complete { timestamp, .. } => timestamp,
        };
        if ts.is_none() {
            *ts = Some(at);
        }
    }

    /// Synthetic terminal error, used by the reporter for close-out.
    #[must_use]
    pub fn synthetic_error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
            timestamp: None,
        }
    }

    /// Synthetic process-exit event, emitted once the executor stream ends.
    #[must_use]
    pub const fn synthetic_complete(exit_code: i32) -> Self {
        Self::Complete {
            exit_code,
            timestamp: None,
        }
    }
}
