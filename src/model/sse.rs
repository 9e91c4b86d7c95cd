//! Incremental server-sent-events decoder.
//!
//! Network chunks do not align with event boundaries, so the decoder keeps
//! partial lines between calls and only emits complete events.

use crate::error::{GenerationError, Result};

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// A decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type from the `event:` field, if any.
    pub event: Option<String>,
    /// Payload from the `data:` field(s), joined with newlines.
    pub data: String,
}

/// Stateful decoder fed with raw response bytes.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to hold no newline
    scanned: usize,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes and returns every event it completes.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Malformed`] if a line grows beyond
    /// [`MAX_LINE_BYTES`] without a newline. The partial line is dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            // A complete line never splits a UTF-8 sequence
            let line = String::from_utf8_lossy(&buffer[start..end]);
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
            start = end + 1;
            from = start;
        }
        buffer.drain(..start);

        if buffer.len() > MAX_LINE_BYTES {
            self.scanned = 0;
            return Err(GenerationError::Malformed(format!(
                "event stream line exceeds {MAX_LINE_BYTES} bytes"
            ))
            .into());
        }
        self.scanned = buffer.len();
        self.buffer = buffer;
        Ok(events)
    }

    /// Flushes a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.scanned = 0;
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).into_owned();
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}
