//! At-least-once event delivery with bounded retry and backoff.

use std::future::Future;
use std::time::Duration;

use agent_relay_core::{SessionId, StreamEvent};
use futures::FutureExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;

use crate::decoder::EventDecoder;

const READ_CHUNK: usize = 8192;

/// Reporter error.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("delivery of {kind} event failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        kind: &'static str,
        attempts: u32,
        last_error: String,
    },
    #[error("executor stream error: {0}")]
    Stream(#[from] std::io::Error),
}

/// Retry and timeout configuration.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Retries after the first attempt (total attempts = retries + 1).
    pub max_retries: u32,
    /// Base backoff delay, doubled on each retry.
    pub base_delay: Duration,
    /// Per-request timeout; a timed-out request counts as a failed attempt.
    pub request_timeout: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Delivers decoded events to a session's ingest endpoint, in order,
/// at-least-once. Holds no state between events.
pub struct Reporter {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    config: ReporterConfig,
}

impl Reporter {
    /// Create a reporter for the given ingest base URL.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, config: ReporterConfig) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ReportError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            bearer_token: None,
            config,
        })
    }

    /// Attach a bearer token sent on every delivery attempt.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Deliver one event, retrying with exponential backoff.
    ///
    /// # Errors
    /// Returns `RetriesExhausted` naming the event and the last error once
    /// every attempt has failed; events are never silently dropped.
    pub async fn report(
        &self,
        session_id: SessionId,
        event: &StreamEvent,
    ) -> Result<(), ReportError> {
        let url = format!(
            "{}/sessions/{session_id}/events",
            self.base_url.trim_end_matches('/')
        );
        let attempts = self.config.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.base_delay * 2_u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }
            let mut request = self.client.post(&url).json(event);
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_error = format!("status {}", response.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
            tracing::warn!(
                %session_id,
                kind = event.kind(),
                attempt = attempt + 1,
                error = %last_error,
                "event delivery attempt failed"
            );
        }

        Err(ReportError::RetriesExhausted {
            kind: event.kind(),
            attempts,
            last_error,
        })
    }

    /// Relay one executor's full event lifecycle.
    ///
    /// Decodes `stream` chunk by chunk and reports every event in order. On
    /// end of stream the decoder is flushed, `exit` is awaited, and a
    /// synthetic `complete` event carries the exit code. If the loop itself
    /// fails, a synthetic `error` event is reported best-effort before the
    /// failure propagates. An interrupt signal stops reading and closes the
    /// session out with a terminal `error` event.
    ///
    /// # Errors
    /// Returns error if the stream fails or delivery retries exhaust.
    pub async fn relay<R, F>(
        &self,
        session_id: SessionId,
        stream: R,
        exit: F,
        interrupt: oneshot::Receiver<()>,
    ) -> Result<(), ReportError>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = i32>,
    {
        match self.pump(session_id, stream, exit, interrupt).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let close_out = StreamEvent::synthetic_error(format!("executor stream failed: {e}"));
                if let Err(report_err) = self.report(session_id, &close_out).await {
                    tracing::warn!(%session_id, error = %report_err, "failed to report close-out error");
                }
                Err(e)
            }
        }
    }

    async fn pump<R, F>(
        &self,
        session_id: SessionId,
        mut stream: R,
        exit: F,
        interrupt: oneshot::Receiver<()>,
    ) -> Result<(), ReportError>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = i32>,
    {
        let mut decoder = EventDecoder::new();
        let mut interrupt = interrupt.fuse();
        let mut armed = true;
        let mut chunk = [0_u8; READ_CHUNK];

        loop {
            tokio::select! {
                read = stream.read(&mut chunk) => {
                    let n = read?;
                    if n == 0 {
                        break; // EOF
                    }
                    for event in decoder.feed(&chunk[..n]) {
                        self.report(session_id, &event).await?;
                    }
                }
                res = &mut interrupt, if armed => {
                    if res.is_ok() {
                        tracing::info!(%session_id, "executor interrupted, closing out session");
                        let close_out = StreamEvent::synthetic_error("executor interrupted");
                        if let Err(e) = self.report(session_id, &close_out).await {
                            tracing::warn!(%session_id, error = %e, "failed to report interrupt close-out");
                        }
                        return Ok(());
                    }
                    // Sender dropped without firing; disarm the branch.
                    armed = false;
                }
            }
        }

        if let Some(event) = decoder.finish() {
            self.report(session_id, &event).await?;
        }

        let exit_code = exit.await;
        self.report(session_id, &StreamEvent::synthetic_complete(exit_code))
            .await?;
        Ok(())
    }
}
