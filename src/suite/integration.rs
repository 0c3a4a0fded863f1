//! End-to-end integration run
//!
//! Walks the gateway's whole public surface in phases: internal monitoring
//! routes, the unified model API, the OpenAI proxy, the Anthropic translator,
//! passthrough and translation modes, provider prefixes, response headers and
//! error handling. Record names are prefixed with their phase.

use super::passthrough::{self, IntoRecord, Observed};
use super::{bodies, Harness, DEFAULT_PROMPT};
use crate::discovery::{ModelSource, Snapshot};
use crate::gateway::{routes, GatewayClient, ProbeError, ResponseMeta};
use crate::reconciler::{BackendPlan, ExpectedMode, ReconcileOptions, Reconciliation, Selection};
use crate::report::{CheckStatus, RunReport, TestRecord};
use crate::stream::{self, decoder::DONE_SENTINEL, Dialect};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Phase prefixes in execution order.
pub const PHASES: [&str; 8] = [
    "internal",
    "models",
    "proxy",
    "anthropic",
    "passthrough",
    "providers",
    "headers",
    "errors",
];

/// Monitoring routes that must answer 200 with JSON, plus keys they must carry.
const INTERNAL_ROUTES: [(&str, &str, &[&str]); 8] = [
    ("health", routes::HEALTH, &["status"]),
    ("status", routes::STATUS, &[]),
    ("status-endpoints", routes::STATUS_ENDPOINTS, &["endpoints"]),
    ("status-models", routes::STATUS_MODELS, &[]),
    ("model-stats", routes::MODEL_STATS, &[]),
    ("translator-stats", routes::TRANSLATOR_STATS, &[]),
    ("process", routes::PROCESS, &[]),
    ("version", routes::VERSION, &[]),
];

#[derive(Debug, Clone, Default)]
pub struct IntegrationOptions {
    pub skip_streaming: bool,
    pub skip_anthropic: bool,
    pub skip_providers: bool,
    /// Makes model and backend choices reproducible
    pub seed: Option<u64>,
}

/// A backend picked to represent one protocol mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub backend: String,
    pub backend_type: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationOutcome {
    pub snapshot: Snapshot,
    /// Model used by the general inference checks
    pub selected_model: Option<String>,
    pub passthrough: Option<Candidate>,
    pub translation: Option<Candidate>,
    pub report: RunReport,
}

impl IntegrationOutcome {
    /// (passed, failed, skipped) per phase, phases without records omitted.
    pub fn phase_summary(&self) -> Vec<(&'static str, usize, usize, usize)> {
        let mut counts: BTreeMap<&str, (usize, usize, usize)> = BTreeMap::new();
        for record in &self.report.records {
            let entry = counts.entry(record.group()).or_default();
            match record.status {
                CheckStatus::Pass => entry.0 += 1,
                CheckStatus::Fail => entry.1 += 1,
                CheckStatus::Skip => entry.2 += 1,
            }
        }
        PHASES
            .iter()
            .filter_map(|phase| counts.get(phase).map(|&(p, f, s)| (*phase, p, f, s)))
            .collect()
    }
}

/// Why a JSON fetch did not produce a document.
#[derive(Debug)]
enum FetchError {
    Status(u16),
    NotJson,
    Request(ProbeError),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Status(status) => write!(f, "HTTP {}", status),
            FetchError::NotJson => f.write_str("invalid JSON"),
            FetchError::Request(e) => write!(f, "{}", e),
        }
    }
}

async fn get_json(client: &GatewayClient, path: &str) -> Result<Value, FetchError> {
    let response = client.get(path).await.map_err(FetchError::Request)?;
    let status = response.status().as_u16();
    if status != 200 {
        return Err(FetchError::Status(status));
    }
    match client.read_json(response).await {
        Ok(body) => Ok(body),
        Err(ProbeError::InvalidResponse(_)) => Err(FetchError::NotJson),
        Err(e) => Err(FetchError::Request(e)),
    }
}

/// Length of the `data` or `models` list of a model listing.
fn listed_count(body: &Value) -> Option<usize> {
    body.get("data")
        .or_else(|| body.get("models"))
        .and_then(Value::as_array)
        .map(Vec::len)
}

/// Run every phase. Only an unreachable gateway or failed discovery aborts.
pub async fn run(
    harness: &Harness,
    options: &IntegrationOptions,
) -> Result<IntegrationOutcome, ProbeError> {
    harness.preflight().await?;

    let reconcile = ReconcileOptions {
        include_empty: false,
        selection: Selection::Random { seed: options.seed },
    };
    let (snapshot, reconciliation) = harness.discover(ModelSource::Unified, &reconcile).await?;

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let selected_model = snapshot
        .generative_model_ids()
        .choose(&mut rng)
        .map(|m| m.to_string());
    let passthrough = choose_candidate(&reconciliation, ExpectedMode::Passthrough, &mut rng);
    let translation = choose_candidate(&reconciliation, ExpectedMode::Translation, &mut rng);

    tracing::info!(
        model = ?selected_model,
        passthrough = ?passthrough.as_ref().map(|c| &c.backend),
        translation = ?translation.as_ref().map(|c| &c.backend),
        "integration candidates"
    );

    let mut report = RunReport::new("integration");
    let model = selected_model.as_deref();

    phase_internal(harness, &mut report).await;
    phase_models(harness, model, &mut report).await;
    phase_proxy(harness, model, options, &mut report).await;
    if !options.skip_anthropic {
        phase_anthropic(harness, model, options, &mut report).await;
        phase_modes(harness, &reconciliation, [&passthrough, &translation], options, &mut report)
            .await;
    }
    if !options.skip_providers {
        phase_providers(harness, &snapshot, &mut report).await;
    }
    phase_headers(harness, model, &mut report).await;
    phase_errors(harness, &mut report).await;

    Ok(IntegrationOutcome {
        snapshot,
        selected_model,
        passthrough,
        translation,
        report,
    })
}

fn choose_candidate(
    reconciliation: &Reconciliation,
    mode: ExpectedMode,
    rng: &mut StdRng,
) -> Option<Candidate> {
    let plans: Vec<&BackendPlan> = reconciliation.testable().filter(|p| p.mode == mode).collect();
    let plan = plans.choose(rng)?;
    Some(Candidate {
        backend: plan.name.clone(),
        backend_type: plan.backend_type.clone(),
        model: plan.selected_model.clone()?,
    })
}

async fn phase_internal(harness: &Harness, report: &mut RunReport) {
    for (label, path, required) in INTERNAL_ROUTES {
        let name = format!("internal/{}", label);
        let record = match get_json(harness.client(), path).await {
            Ok(body) => {
                let missing: Vec<&str> = required
                    .iter()
                    .copied()
                    .filter(|key| body.get(key).is_none())
                    .collect();
                if missing.is_empty() {
                    TestRecord::pass(name, path)
                } else {
                    TestRecord::fail(name, format!("missing keys: {}", missing.join(", ")))
                }
            }
            Err(e) => TestRecord::fail(name, e.to_string()),
        };
        report.record(record);
    }
}

async fn phase_models(harness: &Harness, model: Option<&str>, report: &mut RunReport) {
    let record = match get_json(harness.client(), routes::UNIFIED_MODELS).await {
        Ok(body) => match listed_count(&body) {
            Some(n) => TestRecord::pass("models/list", format!("{} models", n)),
            None => TestRecord::fail("models/list", "unexpected response structure"),
        },
        Err(e) => TestRecord::fail("models/list", e.to_string()),
    };
    report.record(record);

    let Some(model) = model else {
        report.record(TestRecord::skip("models/lookup", "no model available"));
        return;
    };
    let record = match get_json(harness.client(), &routes::unified_model(model)).await {
        Ok(_) => TestRecord::pass("models/lookup", format!("found {}", model)),
        Err(e) => TestRecord::fail("models/lookup", e.to_string()),
    };
    report.record(record);
}

/// Usage counters of an OpenAI response: prompt and total must be positive.
fn check_usage(usage: Option<&Value>) -> UsageCheck {
    let Some(usage) = usage.filter(|u| u.is_object()) else {
        return (CheckStatus::Fail, "no usage block in response".to_string());
    };
    let count = |key: &str| usage.get(key).and_then(Value::as_i64);
    let (prompt, completion, total) = (
        count("prompt_tokens"),
        count("completion_tokens"),
        count("total_tokens"),
    );

    let mut missing = Vec::new();
    if !prompt.is_some_and(|n| n > 0) {
        missing.push("prompt_tokens");
    }
    if !completion.is_some_and(|n| n >= 0) {
        missing.push("completion_tokens");
    }
    if !total.is_some_and(|n| n > 0) {
        missing.push("total_tokens");
    }

    if missing.is_empty() {
        (
            CheckStatus::Pass,
            format!(
                "prompt_tokens={}, completion_tokens={}, total_tokens={}",
                prompt.unwrap_or_default(),
                completion.unwrap_or_default(),
                total.unwrap_or_default()
            ),
        )
    } else {
        (
            CheckStatus::Fail,
            format!("missing or invalid: {}, usage={}", missing.join(", "), usage),
        )
    }
}

type UsageCheck = (CheckStatus, String);

fn proxy_chat(model: &str, prompt: &str, max_tokens: u32) -> Value {
    let mut body = bodies::openai_chat(model, prompt, false);
    body["max_tokens"] = Value::from(max_tokens);
    body
}

async fn phase_proxy(
    harness: &Harness,
    model: Option<&str>,
    options: &IntegrationOptions,
    report: &mut RunReport,
) {
    let client = harness.client();

    let record = match get_json(client, routes::PROXY_MODELS).await {
        Ok(body) => TestRecord::pass("proxy/models", format!("{} models", listed_count(&body).unwrap_or(0))),
        Err(e) => TestRecord::fail("proxy/models", e.to_string()),
    };
    report.record(record);

    let Some(model) = model else {
        report.record(TestRecord::skip("proxy/chat-nonstream", "no model available"));
        return;
    };

    match chat_nonstream(client, model).await {
        Ok(body) => {
            let usage = body.get("usage").filter(|u| u.is_object());
            let detail = match usage {
                Some(u) => format!(
                    "prompt={}, completion={}, total={}",
                    u.get("prompt_tokens").unwrap_or(&json!("?")),
                    u.get("completion_tokens").unwrap_or(&json!("?")),
                    u.get("total_tokens").unwrap_or(&json!("?")),
                ),
                None => "no usage block in response".to_string(),
            };
            report.record(TestRecord::pass("proxy/chat-nonstream", detail));
            let (status, detail) = check_usage(usage);
            report.record(TestRecord::new("proxy/token-usage-nonstream", status, detail));
        }
        Err(e) => {
            report.record(TestRecord::fail("proxy/chat-nonstream", e.to_string()));
        }
    }

    if !options.skip_streaming {
        check_proxy_stream(client, model, report).await;
    }

    let record = match client.post_json(routes::PROXY_CHAT, &proxy_chat(model, "Hi", 5)).await {
        Ok(response) => {
            let meta = ResponseMeta::from_response(&response);
            let missing = meta.missing_routing_headers();
            if meta.status != 200 {
                TestRecord::fail("proxy/headers", format!("HTTP {}", meta.status))
            } else if missing.is_empty() {
                TestRecord::pass("proxy/headers", "all 4 headers present")
            } else {
                TestRecord::fail("proxy/headers", format!("missing headers: {}", missing.join(", ")))
            }
        }
        Err(e) => TestRecord::fail("proxy/headers", e.to_string()),
    };
    report.record(record);
}

async fn chat_nonstream(client: &GatewayClient, model: &str) -> Result<Value, FetchError> {
    let response = client
        .post_json(routes::PROXY_CHAT, &proxy_chat(model, DEFAULT_PROMPT, 10))
        .await
        .map_err(FetchError::Request)?;
    let status = response.status().as_u16();
    if status != 200 {
        return Err(FetchError::Status(status));
    }
    match client.read_json(response).await {
        Ok(body) => Ok(body),
        Err(ProbeError::InvalidResponse(_)) => Err(FetchError::NotJson),
        Err(e) => Err(FetchError::Request(e)),
    }
}

/// SSE data lines of a streamed chat completion, decoded after the fact.
#[derive(Debug, Default, PartialEq)]
struct ProxyStream {
    data_lines: usize,
    saw_done: bool,
    usage: Option<Value>,
}

fn scan_proxy_stream(body: &str) -> ProxyStream {
    let lines: Vec<&str> = body.lines().collect();
    let capture = stream::decode_timed_lines(
        Dialect::OpenAiSse,
        lines.iter().map(|line| (Duration::ZERO, *line)),
    );

    let mut scan = ProxyStream {
        saw_done: capture.end_payload() == Some(DONE_SENTINEL),
        ..Default::default()
    };
    for payload in lines.iter().filter_map(|l| l.trim().strip_prefix("data:")) {
        scan.data_lines += 1;
        if let Ok(chunk) = serde_json::from_str::<Value>(payload.trim()) {
            if let Some(usage) = chunk.get("usage").filter(|u| u.is_object()) {
                scan.usage = Some(usage.clone());
            }
        }
    }
    scan
}

async fn check_proxy_stream(client: &GatewayClient, model: &str, report: &mut RunReport) {
    let mut body = proxy_chat(model, DEFAULT_PROMPT, 10);
    body["stream"] = Value::Bool(true);
    body["stream_options"] = json!({"include_usage": true});

    let response = match client.post_json(routes::PROXY_CHAT, &body).await {
        Ok(r) => r,
        Err(e) => {
            report.record(TestRecord::fail("proxy/chat-stream", e.to_string()));
            return;
        }
    };
    let status = response.status().as_u16();
    if status != 200 {
        report.record(TestRecord::fail("proxy/chat-stream", format!("HTTP {}", status)));
        return;
    }
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            let e = ProbeError::from_reqwest(e, client.timeout());
            report.record(TestRecord::fail("proxy/chat-stream", e.to_string()));
            return;
        }
    };

    let scan = scan_proxy_stream(&text);
    let record = if scan.data_lines == 0 {
        TestRecord::fail("proxy/chat-stream", "no data: lines in SSE stream")
    } else if !scan.saw_done {
        TestRecord::pass("proxy/chat-stream", "stream completed (no [DONE] marker)")
    } else {
        TestRecord::pass("proxy/chat-stream", format!("{} data lines", scan.data_lines))
    };
    report.record(record);

    let (status, detail) = match scan.usage.as_ref() {
        Some(usage) => check_usage(Some(usage)),
        None => (
            CheckStatus::Fail,
            "no usage block in streaming response (stream_options.include_usage may not be supported)"
                .to_string(),
        ),
    };
    report.record(TestRecord::new("proxy/token-usage-stream", status, detail));
}

async fn phase_anthropic(
    harness: &Harness,
    model: Option<&str>,
    options: &IntegrationOptions,
    report: &mut RunReport,
) {
    let client = harness.client();

    match get_json(client, routes::ANTHROPIC_MODELS).await {
        Ok(_) => {
            report.record(TestRecord::pass("anthropic/models", ""));
        }
        Err(FetchError::Status(404)) => {
            report.record(TestRecord::skip(
                "anthropic/models",
                "endpoint not configured (404), skipping phase",
            ));
            return;
        }
        Err(e) => {
            report.record(TestRecord::fail("anthropic/models", e.to_string()));
        }
    }

    let Some(model) = model else {
        report.record(TestRecord::skip("anthropic/messages-nonstream", "no model available"));
        return;
    };

    match client.post_messages(&bodies::anthropic(model, false, None, None)).await {
        Ok(response) => {
            let meta = ResponseMeta::from_response(&response);
            if meta.status != 200 {
                report.record(TestRecord::fail(
                    "anthropic/messages-nonstream",
                    format!("HTTP {}", meta.status),
                ));
            } else if client.read_json(response).await.is_err() {
                report.record(TestRecord::fail("anthropic/messages-nonstream", "invalid JSON"));
            } else {
                let mode = meta.mode.as_deref();
                report.record(TestRecord::pass(
                    "anthropic/messages-nonstream",
                    mode.map(|m| format!("mode={}", m)).unwrap_or_default(),
                ));
                // Informational: both modes are valid here.
                report.record(TestRecord::pass(
                    "anthropic/passthrough-check",
                    match mode {
                        Some(m) => format!("X-Olla-Mode={}", m),
                        None => "no X-Olla-Mode (translation mode)".to_string(),
                    },
                ));
            }
        }
        Err(e) => {
            report.record(TestRecord::fail("anthropic/messages-nonstream", e.to_string()));
        }
    }

    if !options.skip_streaming {
        let record = match anthropic_stream_events(client, model).await {
            Ok(count) if count > 0 => {
                TestRecord::pass("anthropic/messages-stream", format!("{} SSE events", count))
            }
            Ok(_) => TestRecord::fail("anthropic/messages-stream", "no SSE data events"),
            Err(detail) => TestRecord::fail("anthropic/messages-stream", detail),
        };
        report.record(record);
    }

    let body = json!({
        "model": model,
        "messages": [bodies::user("Count these tokens please")],
    });
    let record = match client.post_anthropic(routes::ANTHROPIC_COUNT_TOKENS, &body).await {
        Ok(response) => match response.status().as_u16() {
            200 => match client.read_json(response).await {
                Ok(body) => TestRecord::pass(
                    "anthropic/count-tokens",
                    format!("input_tokens={}", body.get("input_tokens").unwrap_or(&json!("?"))),
                ),
                Err(_) => TestRecord::fail("anthropic/count-tokens", "invalid JSON"),
            },
            404 => TestRecord::pass("anthropic/count-tokens", "not implemented (404), acceptable"),
            status => TestRecord::fail("anthropic/count-tokens", format!("HTTP {}", status)),
        },
        Err(e) => TestRecord::fail("anthropic/count-tokens", e.to_string()),
    };
    report.record(record);
}

/// Count `data:` lines of a streamed Messages response.
async fn anthropic_stream_events(client: &GatewayClient, model: &str) -> Result<usize, String> {
    let response = client
        .post_messages(&bodies::anthropic(model, true, None, None))
        .await
        .map_err(|e| e.to_string())?;
    let meta = ResponseMeta::from_response(&response);
    if meta.status != 200 {
        return Err(format!("HTTP {}", meta.status));
    }
    if !meta.is_event_stream() {
        return Err(format!(
            "unexpected content-type: {}",
            meta.content_type.as_deref().unwrap_or("none")
        ));
    }
    let text = response
        .text()
        .await
        .map_err(|e| ProbeError::from_reqwest(e, client.timeout()).to_string())?;
    Ok(text
        .lines()
        .filter(|l| l.trim_start().starts_with("data:"))
        .count())
}

async fn phase_modes(
    harness: &Harness,
    reconciliation: &Reconciliation,
    candidates: [&Option<Candidate>; 2],
    options: &IntegrationOptions,
    report: &mut RunReport,
) {
    if candidates.iter().all(|c| c.is_none()) {
        report.record(TestRecord::skip(
            "passthrough/modes",
            "no passthrough or translation backends with models",
        ));
        return;
    }

    let mut observed = Observed::default();
    for candidate in candidates.into_iter().flatten() {
        let Some(plan) = reconciliation.backend(&candidate.backend) else {
            continue;
        };
        let label = plan.mode.label();
        tracing::info!(backend = %plan.name, mode = %label, model = %candidate.model, "mode check");

        report.record(
            passthrough::check_non_streaming(harness, plan, &candidate.model, &mut observed)
                .await
                .into_record(format!("passthrough/{}-nonstream", label)),
        );
        if !options.skip_streaming {
            report.record(
                passthrough::check_streaming(harness, plan, &candidate.model, &mut observed)
                    .await
                    .into_record(format!("passthrough/{}-stream", label)),
            );
        }
    }

    passthrough::check_translator_stats(harness, observed, "passthrough/stats", report).await;
}

async fn phase_providers(harness: &Harness, snapshot: &Snapshot, report: &mut RunReport) {
    let mut slugs: BTreeMap<&str, &str> = BTreeMap::new();
    for endpoint in &snapshot.endpoints {
        slugs.insert(endpoint.backend_type.as_str(), endpoint.provider_slug());
    }
    if slugs.is_empty() {
        report.record(TestRecord::skip("providers/routes", "no providers discovered"));
        return;
    }

    for (backend_type, slug) in slugs {
        let name = format!("providers/{}", backend_type);
        let path = routes::provider(slug, "/v1/models");
        let record = match get_json(harness.client(), &path).await {
            Ok(body) => TestRecord::pass(name, format!("{} models", listed_count(&body).unwrap_or(0))),
            Err(FetchError::Status(404)) => {
                TestRecord::pass(name, "no dedicated route (404), acceptable")
            }
            Err(e) => TestRecord::fail(name, e.to_string()),
        };
        report.record(record);
    }
}

async fn phase_headers(harness: &Harness, model: Option<&str>, report: &mut RunReport) {
    let Some(model) = model else {
        report.record(TestRecord::skip("headers/version-fields", "no model available"));
        return;
    };
    let client = harness.client();

    let record = match get_json(client, routes::VERSION).await {
        Ok(body) => {
            let has = |keys: [&str; 2]| keys.iter().any(|k| body.get(k).is_some());
            if has(["version", "Version"]) || has(["commit", "Commit"]) {
                TestRecord::pass("headers/version-fields", "version and commit fields present")
            } else {
                let keys: Vec<&str> = body
                    .as_object()
                    .map(|o| o.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                TestRecord::fail(
                    "headers/version-fields",
                    format!("missing version/commit fields, keys: {}", keys.join(", ")),
                )
            }
        }
        Err(e) => TestRecord::fail("headers/version-fields", e.to_string()),
    };
    report.record(record);

    let record = match client.post_json(routes::PROXY_CHAT, &proxy_chat(model, "Hi", 5)).await {
        Ok(response) => {
            let meta = ResponseMeta::from_response(&response);
            if meta.status != 200 {
                TestRecord::fail("headers/tracking", format!("HTTP {}", meta.status))
            } else if let Some(id) = &meta.request_id {
                let mut detail = format!("request-id={}", id);
                if let Some(time) = &meta.response_time {
                    detail.push_str(&format!(", response-time={}", time));
                }
                TestRecord::pass("headers/tracking", detail)
            } else {
                TestRecord::fail("headers/tracking", "missing tracking headers")
            }
        }
        Err(e) => TestRecord::fail("headers/tracking", e.to_string()),
    };
    report.record(record);
}

async fn phase_errors(harness: &Harness, report: &mut RunReport) {
    let client = harness.client();
    let is_error = |status: u16| (400..600).contains(&status);

    let body = json!({
        "model": passthrough::NONEXISTENT_MODEL,
        "messages": [bodies::user("Hello")],
        "max_tokens": 5,
    });
    let response = client.post_json(routes::PROXY_CHAT, &body).await;
    report.record(status_record("errors/nonexistent-model", response, is_error));

    let response = client.post_raw(routes::PROXY_CHAT, "this is not json").await;
    report.record(status_record("errors/invalid-body", response, is_error));

    // The backend may fill in a default model, so a success is acceptable.
    let body = json!({
        "messages": [bodies::user("Hello")],
        "max_tokens": 5,
    });
    let response = client.post_json(routes::PROXY_CHAT, &body).await;
    report.record(status_record("errors/missing-model", response, |status| {
        status < 500 || status == 502 || status == 503
    }));
}

fn status_record(
    name: &str,
    response: Result<reqwest::Response, ProbeError>,
    accept: impl Fn(u16) -> bool,
) -> TestRecord {
    match response {
        Ok(response) => {
            let status = response.status().as_u16();
            TestRecord::new(name, CheckStatus::from_bool(accept(status)), format!("HTTP {}", status))
        }
        Err(e) => TestRecord::fail(name, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_requires_positive_counts() {
        let usage = json!({"prompt_tokens": 12, "completion_tokens": 0, "total_tokens": 12});
        let (status, detail) = check_usage(Some(&usage));
        assert_eq!(status, CheckStatus::Pass);
        assert_eq!(detail, "prompt_tokens=12, completion_tokens=0, total_tokens=12");

        let usage = json!({"prompt_tokens": 0, "completion_tokens": 3});
        let (status, detail) = check_usage(Some(&usage));
        assert_eq!(status, CheckStatus::Fail);
        assert!(detail.contains("prompt_tokens, total_tokens"));

        assert_eq!(check_usage(None).0, CheckStatus::Fail);
    }

    #[test]
    fn test_scan_proxy_stream() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n\
                    data: {\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":1,\"total_tokens\":6}}\n\n\
                    data: [DONE]\n\n";
        let scan = scan_proxy_stream(body);
        assert_eq!(scan.data_lines, 3);
        assert!(scan.saw_done);
        assert_eq!(scan.usage.unwrap()["total_tokens"], 6);
    }

    #[test]
    fn test_scan_proxy_stream_without_done() {
        let scan = scan_proxy_stream("data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n");
        assert_eq!(scan.data_lines, 1);
        assert!(!scan.saw_done);
        assert!(scan.usage.is_none());
    }

    #[test]
    fn test_listed_count_accepts_both_shapes() {
        assert_eq!(listed_count(&json!({"data": [1, 2]})), Some(2));
        assert_eq!(listed_count(&json!({"models": []})), Some(0));
        assert_eq!(listed_count(&json!({"object": "list"})), None);
    }

    #[test]
    fn test_phase_summary_keeps_phase_order() {
        let mut report = RunReport::new("integration");
        report.record(TestRecord::fail("errors/invalid-body", "HTTP 200"));
        report.record(TestRecord::pass("internal/health", ""));
        report.record(TestRecord::skip("anthropic/models", "404"));
        let outcome = IntegrationOutcome {
            snapshot: Snapshot::default(),
            selected_model: None,
            passthrough: None,
            translation: None,
            report,
        };
        assert_eq!(
            outcome.phase_summary(),
            vec![
                ("internal", 1, 0, 0),
                ("anthropic", 0, 0, 1),
                ("errors", 0, 1, 0)
            ]
        );
    }
}
