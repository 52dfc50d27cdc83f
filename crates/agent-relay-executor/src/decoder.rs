//! Chunk-buffered decoder for newline-delimited JSON event streams.

use agent_relay_core::StreamEvent;

const EXCERPT_LEN: usize = 120;

/// Incremental decoder for an executor's output stream.
///
/// Bytes are fed in arbitrary chunks; complete lines are decoded as they
/// appear and the trailing partial line is retained. A line that fails to
/// decode is dropped with a warning, never aborting the stream.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: Vec<u8>,
}

impl EventDecoder {
    /// New decoder with an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append a chunk and decode every complete line it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush the remaining buffer once the stream has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest)
    }

    /// Bytes currently held as an incomplete line.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamEvent> {
    let line = match std::str::from_utf8(raw) {
        Ok(s) => s.trim(),
        Err(e) => {
            tracing::warn!(error = %e, "dropping non-utf8 event line");
            return None;
        }
    };
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, line = excerpt(line), "dropping undecodable event line");
            None
        }
    }
}

fn excerpt(line: &str) -> &str {
    let end = line
        .char_indices()
        .take_while(|(i, _)| *i < EXCERPT_LEN)
        .last()
        .map_or(0, |(i, c)| i + c.len_utf8());
    &line[..end]
}
