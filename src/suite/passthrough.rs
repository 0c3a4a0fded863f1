//! Passthrough versus translation mode run
//!
//! For every reconciled backend: a non-streaming and a streaming Anthropic
//! Messages request, then an OpenAI-route baseline. Edge cases and the
//! translator statistics cross-check follow the matrix.

use super::{bodies, Harness};
use crate::discovery::{ModelSource, Snapshot};
use crate::gateway::{routes, ProbeError, ResponseMeta};
use crate::reconciler::{BackendPlan, ExpectedMode, ReconcileOptions, Reconciliation};
use crate::report::{CheckStatus, RunReport, TestRecord};
use crate::stream::{self, Dialect};
use crate::verify::{self, DecodedBody, TranslatorStatsResponse, Verification};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

/// Model name no backend should serve.
pub const NONEXISTENT_MODEL: &str = "nonexistent-model-xyz-999";

const STATS_RECORD: &str = "stats/translator-counters";

#[derive(Debug, Clone, Default)]
pub struct PassthroughOptions {
    pub source: ModelSource,
    pub reconcile: ReconcileOptions,
    pub skip_streaming: bool,
    pub skip_edge_cases: bool,
}

/// Per-backend summary row.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub backend: String,
    pub backend_type: String,
    pub model: Option<String>,
    pub mode: ExpectedMode,
    pub non_streaming: CheckStatus,
    /// `None` when streaming checks were skipped
    pub streaming: Option<CheckStatus>,
}

impl MatrixRow {
    pub fn status(&self) -> CheckStatus {
        match (self.non_streaming, self.streaming) {
            (CheckStatus::Fail, _) | (_, Some(CheckStatus::Fail)) => CheckStatus::Fail,
            (CheckStatus::Skip, _) => CheckStatus::Skip,
            _ => CheckStatus::Pass,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassthroughOutcome {
    pub snapshot: Snapshot,
    pub reconciliation: Reconciliation,
    pub matrix: Vec<MatrixRow>,
    pub stats: Option<TranslatorStatsResponse>,
    pub report: RunReport,
}

/// Which modes the gateway actually exercised, judged from response headers.
///
/// A successful response without the passthrough header was translated,
/// whatever mode the backend was expected to use.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct Observed {
    pub(super) passthrough: bool,
    pub(super) translation: bool,
}

impl Observed {
    pub(super) fn note(&mut self, meta: &ResponseMeta) {
        if !meta.is_success() {
            return;
        }
        if meta.is_passthrough() {
            self.passthrough = true;
        } else {
            self.translation = true;
        }
    }
}

/// Run the full passthrough matrix.
///
/// Fails early only when the gateway is unreachable or discovery yields nothing.
pub async fn run(
    harness: &Harness,
    options: &PassthroughOptions,
) -> Result<PassthroughOutcome, ProbeError> {
    harness.preflight().await?;
    let (snapshot, reconciliation) = harness.discover(options.source, &options.reconcile).await?;

    let mut report = RunReport::new("passthrough");
    let mut observed = Observed::default();
    let mut matrix = Vec::new();

    for plan in &reconciliation.backends {
        matrix.push(run_backend(harness, plan, options, &mut report, &mut observed).await);
    }

    if !options.skip_edge_cases {
        run_edge_cases(harness, &reconciliation, &mut report).await;
    }

    let stats = check_translator_stats(harness, observed, STATS_RECORD, &mut report).await;

    Ok(PassthroughOutcome {
        snapshot,
        reconciliation,
        matrix,
        stats,
        report,
    })
}

async fn run_backend(
    harness: &Harness,
    plan: &BackendPlan,
    options: &PassthroughOptions,
    report: &mut RunReport,
    observed: &mut Observed,
) -> MatrixRow {
    let mut row = MatrixRow {
        backend: plan.name.clone(),
        backend_type: plan.backend_type.clone(),
        model: plan.selected_model.clone(),
        mode: plan.mode,
        non_streaming: CheckStatus::Skip,
        streaming: None,
    };

    let nonstream_name = format!("{}/anthropic-nonstream", plan.name);
    let Some(model) = plan.selected_model.as_deref() else {
        report.record(TestRecord::skip(nonstream_name, "no model bound to backend"));
        return row;
    };
    if !plan.mode.is_testable() {
        report.record(TestRecord::skip(
            nonstream_name,
            format!("backend type '{}' is in neither mode table", plan.backend_type),
        ));
        return row;
    }

    tracing::info!(backend = %plan.name, model = %model, mode = %plan.mode, "testing backend");

    row.non_streaming = report.record(
        check_non_streaming(harness, plan, model, observed)
            .await
            .into_record(nonstream_name),
    );

    if !options.skip_streaming {
        row.streaming = Some(
            report.record(
                check_streaming(harness, plan, model, observed)
                    .await
                    .into_record(format!("{}/anthropic-stream", plan.name)),
            ),
        );
    }

    report.record(check_openai_baseline(harness, plan, model).await);

    row
}

/// Per-test errors become failed records with the error as diagnostic.
pub(super) trait IntoRecord {
    fn into_record(self, name: String) -> TestRecord;
}

impl IntoRecord for Result<Verification, ProbeError> {
    fn into_record(self, name: String) -> TestRecord {
        match self {
            Ok(v) => TestRecord::new(name, v.status, v.detail()),
            Err(e) => TestRecord::fail(name, e.to_string()),
        }
    }
}

pub(super) async fn check_non_streaming(
    harness: &Harness,
    plan: &BackendPlan,
    model: &str,
    observed: &mut Observed,
) -> Result<Verification, ProbeError> {
    let client = harness.client();
    let response = client
        .post_messages(&bodies::anthropic(model, false, None, None))
        .await?;
    let meta = ResponseMeta::from_response(&response);
    observed.note(&meta);

    if !meta.is_success() {
        return Ok(Verification::fail(format!("HTTP {}", meta.status)));
    }

    let body = match client.read_json(response).await {
        Ok(body) => body,
        Err(ProbeError::InvalidResponse(_)) => {
            return Ok(verify::verify_mode_header(plan.mode, &meta)
                .and(Verification::fail("invalid JSON response")))
        }
        Err(e) => return Err(e),
    };

    let mut result = verify::verify(plan.mode, &meta, DecodedBody::Message(&body));
    for note in verify::advisory_notes(plan, &meta) {
        result.note(note);
    }
    Ok(result)
}

pub(super) async fn check_streaming(
    harness: &Harness,
    plan: &BackendPlan,
    model: &str,
    observed: &mut Observed,
) -> Result<Verification, ProbeError> {
    let client = harness.client();
    let started = Instant::now();
    let response = client
        .post_messages(&bodies::anthropic(model, true, None, None))
        .await?;
    let meta = ResponseMeta::from_response(&response);
    observed.note(&meta);

    if !meta.is_success() {
        return Ok(Verification::fail(format!("HTTP {}", meta.status)));
    }

    let capture = stream::capture(response, Dialect::AnthropicSse, started, client.timeout()).await?;
    let mut result = verify::verify(plan.mode, &meta, DecodedBody::Stream(&capture));
    if result.notes.is_empty() {
        result.note(format!("{} events", capture.events.len().saturating_sub(1)));
    }
    for note in verify::advisory_notes(plan, &meta) {
        result.note(note);
    }
    Ok(result)
}

async fn check_openai_baseline(harness: &Harness, plan: &BackendPlan, model: &str) -> TestRecord {
    let name = format!("{}/openai-baseline", plan.name);
    let mut body = bodies::openai_chat(model, super::DEFAULT_PROMPT, false);
    body["max_tokens"] = Value::from(10);

    let response = match harness.client().post_json(routes::PROXY_CHAT, &body).await {
        Ok(r) => r,
        Err(e) => return TestRecord::fail(name, e.to_string()),
    };
    let meta = ResponseMeta::from_response(&response);

    let mut notes = Vec::new();
    if meta.status != 200 {
        notes.push(format!("HTTP {}", meta.status));
    }
    if let Some(endpoint) = meta.endpoint.as_deref().filter(|e| *e != plan.name) {
        notes.push(format!("routed to {} (expected {})", endpoint, plan.name));
    }

    TestRecord::new(name, CheckStatus::from_bool(meta.status == 200), notes.join("; "))
}

async fn run_edge_cases(harness: &Harness, reconciliation: &Reconciliation, report: &mut RunReport) {
    report.record(check_nonexistent_model(harness).await);

    let Some(plan) = reconciliation
        .testable()
        .find(|b| b.mode == ExpectedMode::Passthrough)
    else {
        report.record(TestRecord::skip(
            "edge/system-param",
            "no passthrough backends",
        ));
        report.record(TestRecord::skip("edge/multiturn", "no passthrough backends"));
        return;
    };
    let Some(model) = plan.selected_model.as_deref() else {
        return;
    };

    let system = bodies::anthropic(
        model,
        false,
        Some("You are a pirate"),
        Some(vec![bodies::user("Say hello")]),
    );
    report.record(
        expect_status(harness, &system, |s| s == 200)
            .await
            .into_record(format!("edge/system-param ({})", plan.name)),
    );

    let mut multiturn = bodies::anthropic(
        model,
        false,
        None,
        Some(vec![
            bodies::user("My name is Test."),
            serde_json::json!({"role": "assistant", "content": "Hello, Test!"}),
            bodies::user("What is my name?"),
        ]),
    );
    multiturn["max_tokens"] = Value::from(20);
    report.record(
        expect_status(harness, &multiturn, |s| s == 200)
            .await
            .into_record(format!("edge/multiturn ({})", plan.name)),
    );
}

async fn check_nonexistent_model(harness: &Harness) -> TestRecord {
    let body = bodies::anthropic(NONEXISTENT_MODEL, false, None, None);
    expect_status(harness, &body, |s| (400..500).contains(&s))
        .await
        .into_record("edge/nonexistent-model".to_string())
}

async fn expect_status(
    harness: &Harness,
    body: &Value,
    accept: impl Fn(u16) -> bool,
) -> Result<Verification, ProbeError> {
    let response = harness.client().post_messages(body).await?;
    let status = response.status().as_u16();
    let mut result = if accept(status) {
        Verification::pass()
    } else {
        Verification::fail("unexpected status")
    };
    result.note(format!("HTTP {}", status));
    Ok(result)
}

pub(super) async fn check_translator_stats(
    harness: &Harness,
    observed: Observed,
    name: &str,
    report: &mut RunReport,
) -> Option<TranslatorStatsResponse> {
    let stats = match harness.client().get_text(routes::TRANSLATOR_STATS).await {
        Ok(body) => serde_json::from_str::<TranslatorStatsResponse>(&body)
            .map_err(|e| ProbeError::InvalidResponse(e.to_string())),
        Err(e) => Err(e),
    };

    match stats {
        Ok(stats) => {
            let result =
                verify::verify_translator_stats(&stats, observed.passthrough, observed.translation);
            report.record(TestRecord::new(name, result.status, result.detail()));
            Some(stats)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not fetch translator stats");
            report.record(TestRecord::skip(
                name,
                format!("could not fetch translator stats: {}", e),
            ));
            None
        }
    }
}
