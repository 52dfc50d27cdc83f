//! WebSocket observer endpoint.
//!
//! Implements the reconnection protocol: on (re)join the observer receives a
//! `state` snapshot frame, then `event` frames for exactly the events
//! accepted after that snapshot. Delivery is best-effort per observer; a
//! slow or dead socket is dropped without affecting the others.

use agent_relay_core::{SessionId, StateStore};
use agent_relay_hub::ObserverFeed;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::broadcast::error::RecvError;

use crate::http::{ApiState, error_response};
use crate::protocol::ServerFrame;

/// WebSocket upgrade handler for `GET /sessions/{id}/ws`.
///
/// The subscription is taken before the upgrade, so events accepted during
/// the handshake are buffered into the tail rather than lost.
pub async fn ws_handler<S: StateStore + 'static>(
    ws: WebSocketUpgrade,
    Path(id): Path<SessionId>,
    State(api): State<ApiState<S>>,
) -> Response {
    match api.hub.subscribe(id).await {
        Ok(feed) => ws.on_upgrade(move |socket| run_observer(socket, id, feed)),
        Err(e) => error_response(&e),
    }
}

async fn run_observer(socket: WebSocket, id: SessionId, feed: ObserverFeed) {
    let (mut sender, mut receiver) = socket.split();
    let ObserverFeed { snapshot, mut events } = feed;

    if send_frame(&mut sender, &ServerFrame::snapshot(snapshot))
        .await
        .is_err()
    {
        return;
    }
    tracing::debug!(%id, "observer joined");

    loop {
        tokio::select! {
            envelope = events.recv() => match envelope {
                Ok(envelope) => {
                    if send_frame(&mut sender, &ServerFrame::from(envelope)).await.is_err() {
                        tracing::debug!(%id, "observer send failed, dropping connection");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%id, skipped, "observer lagged behind broadcast, dropping connection");
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                // Pure push protocol: anything else the client sends is ignored.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%id, error = %e, "observer socket error");
                    break;
                }
            },
        }
    }

    tracing::debug!(%id, "observer disconnected");
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize frame");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}
