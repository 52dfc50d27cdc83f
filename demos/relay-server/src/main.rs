//! Runnable relay server: in-memory store + session hub + HTTP/WS routes.
//!
//! Run with: cargo run -p relay-server-demo
//!
//! Environment:
//! - `RELAY_BIND` - listen address (default `127.0.0.1:3000`)
//! - `RELAY_INGEST_TOKEN` - when set, required as a bearer token on ingest

use std::net::SocketAddr;
use std::sync::Arc;

use agent_relay_hub::{MemoryStateStore, SessionHub};
use agent_relay_transport::router;
use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bind: SocketAddr = std::env::var("RELAY_BIND")
        .unwrap_or_else(|_| "127.0.0.1:3000".into())
        .parse()
        .context("invalid RELAY_BIND address")?;
    let bearer_token = std::env::var("RELAY_INGEST_TOKEN").ok();
    if bearer_token.is_some() {
        tracing::info!("ingest bearer token enabled");
    }

    let hub = Arc::new(SessionHub::new(MemoryStateStore::new()));
    let app = router(hub, bearer_token)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("relay server listening on http://{bind}");
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
