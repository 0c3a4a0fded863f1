//! Incremental response decoding
//!
//! Three wire dialects are decoded into one sequence of timestamped
//! [`StreamEvent`]s:
//!
//! - OpenAI SSE: `data: {json}` lines, terminated by `data: [DONE]`
//! - Anthropic SSE: `event: <type>` / `data: {json}` pairs, terminated by the
//!   transport closing
//! - Ollama NDJSON: one object per line, terminated by `"done": true`
//!
//! Every sequence ends with exactly one [`EventKind::End`] event. Transport
//! failures are not events; they abort the sequence with a [`ProbeError`].
//!
//! [`ProbeError`]: crate::gateway::ProbeError

pub mod capture;
pub mod decoder;

pub use capture::{capture, decode_response, decode_timed_lines};
pub use decoder::{Frame, LineDecoder};

use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Wire format of an incremental response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    OpenAiSse,
    AnthropicSse,
    OllamaNdjson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A fragment of generated text
    Content,
    /// An Anthropic event type name
    Marker,
    /// Sentinel or transport close
    End,
}

/// One decoded event, stamped with its offset from request start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamEvent {
    pub at: Duration,
    pub kind: EventKind,
    pub payload: String,
}

impl StreamEvent {
    pub fn at_secs(&self) -> f64 {
        self.at.as_secs_f64()
    }

    pub fn is_content(&self) -> bool {
        self.kind == EventKind::Content
    }
}

impl Frame {
    /// Stamp a decoded frame with its arrival offset.
    pub fn at(self, at: Duration) -> StreamEvent {
        StreamEvent {
            at,
            kind: self.kind,
            payload: self.payload,
        }
    }
}

/// A fully consumed response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCapture {
    pub dialect: Dialect,
    pub events: Vec<StreamEvent>,
    /// Request start to end of body
    pub total_time: Duration,
}

impl StreamCapture {
    pub fn content_events(&self) -> impl Iterator<Item = &StreamEvent> {
        self.events.iter().filter(|e| e.is_content())
    }

    pub fn content_count(&self) -> usize {
        self.content_events().count()
    }

    /// Concatenated content.
    pub fn text(&self) -> String {
        self.content_events().map(|e| e.payload.as_str()).collect()
    }

    /// Distinct marker payloads seen.
    pub fn marker_types(&self) -> BTreeSet<&str> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Marker)
            .map(|e| e.payload.as_str())
            .collect()
    }

    /// Arrival offsets of content events, in seconds.
    pub fn content_arrivals(&self) -> Vec<f64> {
        self.content_events().map(StreamEvent::at_secs).collect()
    }

    pub fn first_content_at(&self) -> Option<Duration> {
        self.content_events().next().map(|e| e.at)
    }

    pub fn end_payload(&self) -> Option<&str> {
        self.events
            .iter()
            .rev()
            .find(|e| e.kind == EventKind::End)
            .map(|e| e.payload.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ms: u64, kind: EventKind, payload: &str) -> StreamEvent {
        StreamEvent {
            at: Duration::from_millis(ms),
            kind,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_capture_accessors() {
        let capture = StreamCapture {
            dialect: Dialect::AnthropicSse,
            events: vec![
                event(10, EventKind::Marker, "message_start"),
                event(20, EventKind::Marker, "content_block_delta"),
                event(20, EventKind::Content, "Hel"),
                event(30, EventKind::Marker, "content_block_delta"),
                event(30, EventKind::Content, "lo"),
                event(40, EventKind::Marker, "message_stop"),
                event(40, EventKind::End, "eof"),
            ],
            total_time: Duration::from_millis(41),
        };

        assert_eq!(capture.content_count(), 2);
        assert_eq!(capture.text(), "Hello");
        assert_eq!(capture.marker_types().len(), 3);
        assert_eq!(capture.first_content_at(), Some(Duration::from_millis(20)));
        assert_eq!(capture.content_arrivals(), vec![0.02, 0.03]);
        assert_eq!(capture.end_payload(), Some("eof"));
    }
}
