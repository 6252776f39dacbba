//! Event-stream parser for answer bodies.
//!
//! The answer endpoint sends `data: <payload>` lines separated by blank
//! lines. Chunks from the transport split lines (and UTF-8 sequences)
//! arbitrarily, so bytes are buffered until a full line is available.
//!
//! A payload is one of:
//! - `[END]`, the end-of-answer sentinel
//! - a JSON object with a non-empty `error` field, a server-side failure
//! - anything else, appended verbatim to the answer text

use docchat_backend::decode_utf8_streaming;
use serde_json::Value;
use tracing::debug;

pub const DATA_PREFIX: &str = "data:";
pub const END_SENTINEL: &str = "[END]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    Text(String),
    Error(String),
    End,
}

#[derive(Debug, Default)]
pub struct StreamingParser {
    /// Bytes of an incomplete UTF-8 sequence
    byte_buffer: Vec<u8>,
    /// Text after the last complete line
    line_buffer: String,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a transport chunk, returning the records it completes.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.byte_buffer.extend_from_slice(chunk);
        if let Some(text) = decode_utf8_streaming(&mut self.byte_buffer) {
            self.line_buffer.push_str(&text);
        }

        let mut records = Vec::new();
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            records.extend(parse_line(&line[..newline]));
        }
        records
    }

    /// Flush whatever is left once the transport has closed.
    pub fn finish(&mut self) -> Vec<StreamRecord> {
        if !self.byte_buffer.is_empty() {
            debug!(
                "Answer stream ended inside a UTF-8 sequence ({} bytes)",
                self.byte_buffer.len()
            );
            let rest = String::from_utf8_lossy(&self.byte_buffer).into_owned();
            self.line_buffer.push_str(&rest);
            self.byte_buffer.clear();
        }
        let line = std::mem::take(&mut self.line_buffer);
        parse_line(&line).into_iter().collect()
    }
}

/// Parse one line of the event stream. Lines without the data prefix and
/// empty payloads produce nothing.
pub fn parse_line(line: &str) -> Option<StreamRecord> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload.is_empty() {
        return None;
    }
    if payload == END_SENTINEL {
        return Some(StreamRecord::End);
    }
    if let Some(message) = error_message(payload) {
        return Some(StreamRecord::Error(message));
    }
    Some(StreamRecord::Text(payload.to_string()))
}

fn error_message(payload: &str) -> Option<String> {
    if !payload.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(payload).ok()?;
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
