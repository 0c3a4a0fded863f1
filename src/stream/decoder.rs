//! Per-dialect line decoding.
//!
//! A [`LineDecoder`] turns complete body lines into [`Frame`]s. It holds no
//! timing information; [`super::capture`] stamps frames as they arrive.

use super::{Dialect, EventKind};
use serde_json::Value;

/// Payload of the end marker when the body closed without a sentinel.
pub const EOF_END: &str = "eof";
/// Payload of the end marker for the OpenAI `[DONE]` sentinel.
pub const DONE_SENTINEL: &str = "[DONE]";
/// Payload of the end marker for an Ollama `done: true` object.
pub const OLLAMA_DONE: &str = "done";

/// Decoded unit before it is stamped with an arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: EventKind,
    pub payload: String,
}

impl Frame {
    fn content(text: &str) -> Self {
        Self {
            kind: EventKind::Content,
            payload: text.to_string(),
        }
    }

    fn marker(event_type: &str) -> Self {
        Self {
            kind: EventKind::Marker,
            payload: event_type.to_string(),
        }
    }

    fn end(payload: &str) -> Self {
        Self {
            kind: EventKind::End,
            payload: payload.to_string(),
        }
    }
}

/// Stateful decoder for one response body.
///
/// Once an end frame has been produced every further line is ignored.
#[derive(Debug)]
pub struct LineDecoder {
    dialect: Dialect,
    finished: bool,
}

impl LineDecoder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode one complete line (without its terminator).
    pub fn push_line(&mut self, line: &str) -> Vec<Frame> {
        if self.finished {
            return Vec::new();
        }

        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return Vec::new();
        }

        let frames = match self.dialect {
            Dialect::OpenAiSse => decode_openai(line),
            Dialect::AnthropicSse => decode_anthropic(line),
            Dialect::OllamaNdjson => decode_ollama(line),
        };

        if frames.iter().any(|f| f.kind == EventKind::End) {
            self.finished = true;
        }
        frames
    }

    /// Close the body. Yields the end frame if no sentinel was seen.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(Frame::end(EOF_END))
    }
}

/// Payload of an SSE `data:` line, with or without the space after the colon.
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|d| d.strip_prefix(' ').unwrap_or(d))
}

fn parse_json(data: &str, dialect: Dialect) -> Option<Value> {
    match serde_json::from_str::<Value>(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(dialect = ?dialect, error = %e, "skipping malformed line");
            None
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn decode_openai(line: &str) -> Vec<Frame> {
    let Some(data) = sse_data(line) else {
        return Vec::new();
    };
    let data = data.trim();

    if data == DONE_SENTINEL {
        return vec![Frame::end(DONE_SENTINEL)];
    }

    let Some(value) = parse_json(data, Dialect::OpenAiSse) else {
        return Vec::new();
    };

    non_empty_str(value.pointer("/choices/0/delta/content"))
        .map(|text| vec![Frame::content(text)])
        .unwrap_or_default()
}

fn decode_anthropic(line: &str) -> Vec<Frame> {
    if let Some(event_type) = line.strip_prefix("event:") {
        let event_type = event_type.trim();
        if event_type.is_empty() {
            return Vec::new();
        }
        return vec![Frame::marker(event_type)];
    }

    let Some(data) = sse_data(line) else {
        return Vec::new();
    };
    let Some(value) = parse_json(data.trim(), Dialect::AnthropicSse) else {
        return Vec::new();
    };

    if value.get("type").and_then(Value::as_str) != Some("content_block_delta") {
        return Vec::new();
    }

    non_empty_str(value.pointer("/delta/text"))
        .map(|text| vec![Frame::content(text)])
        .unwrap_or_default()
}

fn decode_ollama(line: &str) -> Vec<Frame> {
    let Some(value) = parse_json(line.trim(), Dialect::OllamaNdjson) else {
        return Vec::new();
    };

    let mut frames = Vec::with_capacity(2);

    // `/api/generate` uses `response`, `/api/chat` nests under `message`.
    if let Some(text) = non_empty_str(value.get("response"))
        .or_else(|| non_empty_str(value.pointer("/message/content")))
    {
        frames.push(Frame::content(text));
    }

    if value.get("done").and_then(Value::as_bool) == Some(true) {
        frames.push(Frame::end(OLLAMA_DONE));
    }

    frames
}
