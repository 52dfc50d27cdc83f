//! Canonical session state, the reduction target.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::event::TokenUsage;

/// Session identifier.
pub type SessionId = Uuid;

/// Session status. Transitions only move forward:
/// `idle → running → {completed | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is registered but no tool has run yet.
    Idle,
    /// Session is actively executing.
    Running,
    /// Session finished successfully.
    Completed,
    /// Session finished with a failure.
    Error,
}

impl SessionStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Status of a single tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Running,
    Success,
    Error,
}

/// One tool invocation and its eventual outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// Tool use id, referenced by the matching `tool_result`.
    pub id: String,
    /// Tool name.
    pub tool: String,
    /// Input payload.
    pub input: Value,
    /// Output, set when the result arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Current status.
    pub status: ToolStatus,
    /// When the invocation started (epoch ms).
    pub started_at: Option<i64>,
    /// When the result arrived (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// Todo item status, mirroring the todo-tracking tool's input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// One entry of the session's todo list.
///
/// The whole list is replaced wholesale on every todo-tool invocation;
/// items are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    /// Present-tense label shown while the item is in progress.
    #[serde(default, alias = "activeForm")]
    pub active_form: String,
    pub status: TodoStatus,
}

/// Kind of a display message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Assistant,
    ToolUse,
    ToolResult,
    Error,
}

/// Display message derived from assistant/tool/error events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Configuration supplied when a session is registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model identifier, if known up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Working directory of the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// Canonical state of one session, owned by the hub and mutated only by the
/// reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// Tool invocations in arrival order.
    #[serde(default)]
    pub tools: Vec<ToolExecution>,
    /// Current todo list (replaced wholesale, never merged).
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    /// Display messages in arrival order.
    #[serde(default)]
    pub messages: Vec<DisplayMessage>,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub usage: TokenUsage,
    /// Last recorded error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionState {
    /// Fresh `idle` state for a newly registered session.
    #[must_use]
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        Self {
            id,
            status: SessionStatus::Idle,
            model: config.model,
            working_dir: config.working_dir,
            started_at: None,
            completed_at: None,
            tools: Vec::new(),
            todos: Vec::new(),
            messages: Vec::new(),
            total_cost_usd: 0.0,
            duration_ms: 0,
            usage: TokenUsage::default(),
            error: None,
        }
    }

    /// Look up a tool execution by its tool-use id.
    #[must_use]
    pub fn tool_mut(&mut self, id: &str) -> Option<&mut ToolExecution> {
        self.tools.iter_mut().find(|t| t.id == id)
    }
}
