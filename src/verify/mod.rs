//! Mode and structure verification
//!
//! Checks a gateway response against the contract for the backend's expected
//! mode. Only the mode header and the public response shape decide pass or
//! fail; endpoint and backend-type headers produce advisory notes, since any
//! healthy endpoint serving the model may legitimately answer.

pub mod stats;

pub use stats::{verify_translator_stats, TranslatorStats, TranslatorStatsResponse};

use crate::gateway::ResponseMeta;
use crate::reconciler::{BackendPlan, ExpectedMode};
use crate::report::CheckStatus;
use crate::stream::StreamCapture;
use serde_json::Value;
use std::collections::BTreeSet;

/// Event types every Anthropic stream must contain.
pub const REQUIRED_EVENTS: [&str; 3] = ["message_start", "message_delta", "message_stop"];

/// Full event vocabulary expected from passthrough streams.
pub const FULL_EVENTS: [&str; 6] = [
    "message_start",
    "content_block_start",
    "content_block_delta",
    "content_block_stop",
    "message_delta",
    "message_stop",
];

/// Result of one or more checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub status: CheckStatus,
    pub notes: Vec<String>,
}

impl Verification {
    pub fn pass() -> Self {
        Self {
            status: CheckStatus::Pass,
            notes: Vec::new(),
        }
    }

    pub fn fail(note: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            notes: vec![note.into()],
        }
    }

    pub fn skip(note: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Skip,
            notes: vec![note.into()],
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    /// Add a note without changing the status.
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Record a failed rule.
    pub fn fail_with(&mut self, note: impl Into<String>) {
        if self.status != CheckStatus::Skip {
            self.status = CheckStatus::Fail;
        }
        self.notes.push(note.into());
    }

    /// Combine two results: any failure fails, skip wins over pass.
    pub fn and(mut self, other: Verification) -> Self {
        self.status = match (self.status, other.status) {
            (CheckStatus::Fail, _) | (_, CheckStatus::Fail) => CheckStatus::Fail,
            (CheckStatus::Skip, _) | (_, CheckStatus::Skip) => CheckStatus::Skip,
            _ => CheckStatus::Pass,
        };
        self.notes.extend(other.notes);
        self
    }

    /// Notes joined for a one-line diagnostic.
    pub fn detail(&self) -> String {
        self.notes.join("; ")
    }
}

/// The decoded body handed to [`verify`].
#[derive(Debug, Clone, Copy)]
pub enum DecodedBody<'a> {
    /// Non-streaming JSON body
    Message(&'a Value),
    /// Anthropic SSE stream
    Stream(&'a StreamCapture),
}

/// Check the mode indicator against the expected mode.
pub fn verify_mode_header(expected: ExpectedMode, meta: &ResponseMeta) -> Verification {
    match expected {
        ExpectedMode::Passthrough if meta.is_passthrough() => Verification::pass(),
        ExpectedMode::Passthrough => Verification::fail(format!(
            "expected X-Olla-Mode=passthrough, got '{}'",
            meta.mode.as_deref().unwrap_or("")
        )),
        ExpectedMode::Translation if meta.is_passthrough() => {
            Verification::fail("unexpected X-Olla-Mode=passthrough for translation backend")
        }
        ExpectedMode::Translation => Verification::pass(),
        ExpectedMode::Untested => {
            Verification::skip("backend type is in neither mode table")
        }
    }
}

/// Check the public Messages response shape.
pub fn verify_message_body(body: &Value) -> Verification {
    let mut result = Verification::pass();

    match body.get("type").and_then(Value::as_str) {
        Some("message") => {}
        other => result.fail_with(format!(
            "field 'type' is {}, expected \"message\"",
            describe(other)
        )),
    }

    match body.get("role").and_then(Value::as_str) {
        Some("assistant") => {}
        other => result.fail_with(format!(
            "field 'role' is {}, expected \"assistant\"",
            describe(other)
        )),
    }

    match body.get("content") {
        Some(Value::Array(blocks)) => {
            let has_text = blocks
                .iter()
                .any(|b| b.get("type").and_then(Value::as_str) == Some("text"));
            if !has_text {
                result.note("content has no text block");
            }
        }
        Some(_) => result.fail_with("field 'content' is not a list"),
        None => result.fail_with("field 'content' is missing"),
    }

    if body.get("model").and_then(Value::as_str).is_none() {
        result.note("field 'model' is missing");
    }

    result
}

fn describe(value: Option<&str>) -> String {
    value
        .map(|v| format!("\"{}\"", v))
        .unwrap_or_else(|| "missing".to_string())
}

/// Check the observed Anthropic event vocabulary.
///
/// A stream must carry at least one text delta. The minimal set is required
/// in every mode. Passthrough streams are also expected to carry the full set;
/// gaps there are notes only.
pub fn verify_event_vocabulary(expected: ExpectedMode, capture: &StreamCapture) -> Verification {
    let observed = capture.marker_types();

    if capture.events.iter().all(|e| e.kind == crate::stream::EventKind::End) {
        return Verification::fail("no SSE events received");
    }
    if capture.content_count() == 0 {
        return Verification::fail("no SSE data lines with content received");
    }

    let mut result = Verification::pass();

    let missing = missing_events(&observed, &REQUIRED_EVENTS);
    if !missing.is_empty() {
        result.fail_with(format!("missing events: {}", missing.join(", ")));
    }

    if expected == ExpectedMode::Passthrough {
        let optional: Vec<&str> = missing_events(&observed, &FULL_EVENTS)
            .into_iter()
            .filter(|e| !REQUIRED_EVENTS.contains(e))
            .collect();
        if !optional.is_empty() {
            result.note(format!("optional events absent: {}", optional.join(", ")));
        }
    }

    result
}

fn missing_events<'a>(observed: &BTreeSet<&str>, wanted: &[&'a str]) -> Vec<&'a str> {
    wanted
        .iter()
        .copied()
        .filter(|e| !observed.contains(e))
        .collect()
}

/// Full check of one Messages response.
///
/// Non-success statuses fail before anything else is looked at. Untested
/// backends are skipped.
pub fn verify(expected: ExpectedMode, meta: &ResponseMeta, body: DecodedBody<'_>) -> Verification {
    if !expected.is_testable() {
        return verify_mode_header(expected, meta);
    }
    if !meta.is_success() {
        return Verification::fail(format!("HTTP {}", meta.status));
    }

    let header = verify_mode_header(expected, meta);

    let shape = match body {
        DecodedBody::Message(value) => verify_message_body(value),
        DecodedBody::Stream(capture) => {
            let mut result = Verification::pass();
            if !meta.is_event_stream() {
                result.fail_with(format!(
                    "content-type={}, expected text/event-stream",
                    meta.content_type.as_deref().unwrap_or("")
                ));
            }
            result.and(verify_event_vocabulary(expected, capture))
        }
    };

    header.and(shape)
}

/// Header cross-checks that never affect pass or fail.
pub fn advisory_notes(plan: &BackendPlan, meta: &ResponseMeta) -> Vec<String> {
    let mut notes = Vec::new();

    if let Some(endpoint) = &meta.endpoint {
        if endpoint != &plan.name {
            notes.push(format!("routed to {} (expected {})", endpoint, plan.name));
        }
    }
    if let Some(backend_type) = &meta.backend_type {
        if !backend_type.eq_ignore_ascii_case(&plan.backend_type) {
            notes.push(format!(
                "backend-type={} (expected {})",
                backend_type, plan.backend_type
            ));
        }
    }
    if plan.selection_is_approximate() {
        notes.push("model bound by backend type only".to_string());
    }

    notes
}
