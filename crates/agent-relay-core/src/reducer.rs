//! Pure event-fold state transition.
//!
//! Events for one session arrive in order at a single reducer call site (the
//! hub's per-session lock); the reducer itself does no reordering, buffering,
//! or I/O, and never panics on unexpected shapes.

use serde_json::Value;

use crate::event::StreamEvent;
use crate::state::{
    DisplayMessage, MessageKind, SessionState, SessionStatus, TodoItem, ToolExecution, ToolStatus,
};

/// The designated todo-tracking tool. A `tool_use` for it whose input carries
/// a `todos` array replaces the session's todo list wholesale.
pub const TODO_TOOL: &str = "TodoWrite";

/// Apply one event to the session state.
pub fn reduce(state: &mut SessionState, event: &StreamEvent) {
    match event {
        StreamEvent::Assistant { message, timestamp } => {
            // Assistant-only sessions stay idle; only the first tool use
            // marks a session as running.
            state.messages.push(DisplayMessage {
                kind: MessageKind::Assistant,
                content: message.clone(),
                timestamp: *timestamp,
            });
        }
        StreamEvent::ToolUse { id, tool, input, timestamp } => {
            state.tools.push(ToolExecution {
                id: id.clone(),
                tool: tool.clone(),
                input: input.clone(),
                output: None,
                status: ToolStatus::Running,
                started_at: *timestamp,
                completed_at: None,
            });
            state.messages.push(DisplayMessage {
                kind: MessageKind::ToolUse,
                content: tool.clone(),
                timestamp: *timestamp,
            });
            if tool == TODO_TOOL {
                if let Some(todos) = input.get("todos") {
                    if let Ok(todos) = serde_json::from_value::<Vec<TodoItem>>(todos.clone()) {
                        state.todos = todos;
                    }
                }
            }
            if state.status == SessionStatus::Idle {
                state.status = SessionStatus::Running;
                state.started_at = *timestamp;
            }
        }
        StreamEvent::ToolResult { id, output, error, timestamp } => {
            if let Some(tool) = state.tool_mut(id) {
                tool.output = output.clone();
                tool.status = if error.is_some() {
                    ToolStatus::Error
                } else {
                    ToolStatus::Success
                };
                tool.completed_at = *timestamp;
            }
            // Orphaned results are tolerated: the message is appended even
            // when no matching tool_use was seen.
            let content = error
                .clone()
                .or_else(|| output.as_ref().map(render_value))
                .unwrap_or_default();
            state.messages.push(DisplayMessage {
                kind: MessageKind::ToolResult,
                content,
                timestamp: *timestamp,
            });
        }
        StreamEvent::Result { cost_usd, duration_ms, usage, timestamp } => {
            // Unconditional: a late result still refreshes terminal metrics.
            state.status = SessionStatus::Completed;
            state.completed_at = *timestamp;
            state.total_cost_usd = *cost_usd;
            state.duration_ms = *duration_ms;
            state.usage = *usage;
        }
        StreamEvent::Complete { exit_code, timestamp } => {
            if !state.status.is_terminal() {
                if *exit_code == 0 {
                    state.status = SessionStatus::Completed;
                } else {
                    state.status = SessionStatus::Error;
                    if state.error.is_none() {
                        state.error = Some(format!("executor exited with code {exit_code}"));
                    }
                }
                state.completed_at = *timestamp;
            }
        }
        StreamEvent::Error { message, timestamp, .. } => {
            // May override a premature `completed`.
            state.status = SessionStatus::Error;
            state.error = Some(message.clone());
            state.completed_at = *timestamp;
            state.messages.push(DisplayMessage {
                kind: MessageKind::Error,
                content: message.clone(),
                timestamp: *timestamp,
            });
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
