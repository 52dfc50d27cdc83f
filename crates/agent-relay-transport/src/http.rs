//! HTTP ingest and query routes.

use std::sync::Arc;

use agent_relay_core::{SessionConfig, SessionId, StateStore, StreamEvent};
use agent_relay_hub::{HubError, SessionHub};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::websocket::ws_handler;

/// Shared state for the API routes.
pub struct ApiState<S: StateStore> {
    pub hub: Arc<SessionHub<S>>,
    /// When set, ingest requests must carry `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
}

impl<S: StateStore> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            bearer_token: self.bearer_token.clone(),
        }
    }
}

/// Build the session API router.
///
/// Routes:
/// - `POST /sessions` - register a session
/// - `POST /sessions/{id}/events` - ingest one event (idempotent intent)
/// - `GET  /sessions/{id}` - snapshot poll
/// - `GET  /sessions/{id}/history` - full event log
/// - `GET  /sessions/{id}/ws` - observer WebSocket
#[must_use]
pub fn router<S: StateStore + 'static>(
    hub: Arc<SessionHub<S>>,
    bearer_token: Option<String>,
) -> Router {
    Router::new()
        .route("/sessions", post(create_session::<S>))
        .route("/sessions/{id}", get(get_session::<S>))
        .route("/sessions/{id}/events", post(ingest_event::<S>))
        .route("/sessions/{id}/history", get(get_history::<S>))
        .route("/sessions/{id}/ws", get(ws_handler::<S>))
        .with_state(ApiState { hub, bearer_token })
}

/// Body of `POST /sessions`.
#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    /// Caller-chosen id; generated when omitted.
    #[serde(default)]
    id: Option<SessionId>,
    #[serde(flatten)]
    config: SessionConfig,
}

async fn create_session<S: StateStore>(
    State(api): State<ApiState<S>>,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    let id = req.id.unwrap_or_else(Uuid::new_v4);
    match api.hub.create_session(id, req.config).await {
        Ok(state) => (StatusCode::CREATED, Json(state)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn ingest_event<S: StateStore>(
    State(api): State<ApiState<S>>,
    Path(id): Path<SessionId>,
    headers: HeaderMap,
    Json(event): Json<StreamEvent>,
) -> Response {
    if let Some(expected) = &api.bearer_token {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);
        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid bearer token"})),
            )
                .into_response();
        }
    }
    match api.hub.handle_event(id, event).await {
        Ok(envelope) => (StatusCode::ACCEPTED, Json(envelope.state)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_session<S: StateStore>(
    State(api): State<ApiState<S>>,
    Path(id): Path<SessionId>,
) -> Response {
    match api.hub.session_state(id).await {
        Ok(state) => Json(state).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_history<S: StateStore>(
    State(api): State<ApiState<S>>,
    Path(id): Path<SessionId>,
) -> Response {
    match api.hub.event_history(id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => error_response(&e),
    }
}

pub(crate) fn error_response(err: &HubError) -> Response {
    let status = match err {
        HubError::NotFound(_) => StatusCode::NOT_FOUND,
        HubError::AlreadyExists(_) => StatusCode::CONFLICT,
        HubError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": err.to_string()}))).into_response()
}
