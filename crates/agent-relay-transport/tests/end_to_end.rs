//! Full-pipeline test: executor stream → decoder → reporter → ingest route →
//! hub → reducer → observer tail.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agent_relay_core::{SessionConfig, SessionStatus, StreamEvent, ToolStatus};
use agent_relay_executor::{Reporter, ReporterConfig};
use agent_relay_hub::{MemoryStateStore, SessionHub};
use agent_relay_transport::router;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use uuid::Uuid;

async fn serve(hub: Arc<SessionHub<MemoryStateStore>>) -> SocketAddr {
    let app = router(hub, None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn executor_stream_reaches_observers_and_terminal_state() {
    let hub = Arc::new(SessionHub::new(MemoryStateStore::new()));
    let addr = serve(Arc::clone(&hub)).await;

    let session_id = Uuid::new_v4();
    hub.create_session(session_id, SessionConfig::default())
        .await
        .unwrap();

    // An observer joins before any event arrives.
    let mut feed = hub.subscribe(session_id).await.unwrap();
    assert_eq!(feed.snapshot.status, SessionStatus::Idle);

    let reporter = Reporter::new(
        format!("http://{addr}"),
        ReporterConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(5),
        },
    )
    .unwrap();

    let (mut writer, reader) = tokio::io::duplex(256);
    let feeder = tokio::spawn(async move {
        let lines: &[&str] = &[
            r#"{"type":"assistant","message":"hi"}"#,
            r#"{"type":"tool_use","id":"t1","tool":"Read","input":{"path":"/a.ts"}}"#,
            "this line is noise and must be dropped",
            r#"{"type":"tool_result","id":"t1","output":"data"}"#,
            r#"{"type":"result","cost_usd":0.01,"duration_ms":1200}"#,
        ];
        for line in lines {
            writer.write_all(line.as_bytes()).await.unwrap();
            writer.write_all(b"\n").await.unwrap();
        }
    });

    let (_keep, interrupt) = oneshot::channel();
    reporter
        .relay(session_id, reader, async { 0 }, interrupt)
        .await
        .unwrap();
    feeder.await.unwrap();

    // The tail contains exactly the decoded events, in order, plus the
    // synthetic complete; the noise line never reaches the hub.
    let kinds = ["assistant", "tool_use", "tool_result", "result", "complete"];
    let mut last_state = None;
    for expected in kinds {
        let envelope = feed.events.recv().await.unwrap();
        assert_eq!(envelope.event.kind(), expected);
        last_state = Some(envelope.state);
    }

    let final_state = last_state.unwrap();
    assert_eq!(final_state.status, SessionStatus::Completed);
    assert_eq!(final_state.tools.len(), 1);
    assert_eq!(final_state.tools[0].status, ToolStatus::Success);
    assert_eq!(final_state.total_cost_usd, 0.01);

    // The hub's canonical state and history agree with the broadcast.
    assert_eq!(hub.session_state(session_id).await.unwrap(), final_state);
    let history = hub.event_history(session_id).await.unwrap();
    assert_eq!(history.len(), 5);
    assert!(matches!(history[4], StreamEvent::Complete { exit_code: 0, .. }));
}
