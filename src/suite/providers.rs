//! Provider-prefixed routing and streaming runs
//!
//! The gateway exposes every backend family under its own prefix
//! (`/olla/openai`, `/olla/ollama`, `/olla/lm-studio`, `/olla/vllm`). These runs
//! list models in each provider's format, then send that provider's native
//! requests through its prefix and tally which endpoint served them.

use super::{Harness, PREFERRED_MODELS};
use crate::discovery::{self, Model};
use crate::gateway::{routes, ProbeError, ResponseMeta};
use crate::report::{CheckStatus, RunReport, TestRecord};
use crate::stream::{self, Dialect};
use crate::timing::{self, StreamQuality, TimingEvidence};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

/// Models tested per provider unless every model is requested.
pub const DEFAULT_MAX_MODELS: usize = 3;

/// Models taken per provider in sample mode.
pub const SAMPLE_SIZE: usize = 3;

/// Prompt for the provider streaming run.
pub const STORY_PROMPT: &str = "Tell me a story about a robot. Be creative and descriptive.";

/// Generation cap for the provider streaming run.
pub const STORY_MAX_TOKENS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[value(name = "openai")]
    OpenAi,
    Ollama,
    #[value(name = "lmstudio", alias = "lm-studio")]
    LmStudio,
    Vllm,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Ollama,
        Provider::LmStudio,
        Provider::Vllm,
    ];

    /// Path segment after `/olla/`.
    pub fn slug(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
            Provider::LmStudio => "lm-studio",
            Provider::Vllm => "vllm",
        }
    }

    /// Value of the `format` query on the unified model list.
    pub fn format(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
            Provider::LmStudio => "lmstudio",
            Provider::Vllm => "vllm",
        }
    }

    /// Model listing routes under this provider's prefix.
    pub fn model_routes(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi | Provider::Vllm => &["/v1/models"],
            Provider::Ollama => &["/api/tags", "/v1/models"],
            Provider::LmStudio => &["/v1/models", "/api/v0/models"],
        }
    }

    /// Native requests for one model. Embedding models only get embeddings.
    pub fn requests(&self, model: &str, embedding: bool) -> Vec<RouteRequest> {
        let chat = json!({
            "model": model,
            "messages": [super::bodies::user("Hello")],
            "max_tokens": 10,
            "stream": false,
        });

        match self {
            Provider::OpenAi | Provider::Vllm if embedding => vec![RouteRequest::new(
                "embeddings",
                "/v1/embeddings",
                json!({"model": model, "input": "Test text"}),
            )],
            Provider::OpenAi | Provider::Vllm => vec![
                RouteRequest::new("chat", "/v1/chat/completions", chat),
                RouteRequest::new(
                    "completions",
                    "/v1/completions",
                    json!({"model": model, "prompt": "Hello", "max_tokens": 10, "stream": false}),
                ),
            ],
            Provider::Ollama if embedding => vec![RouteRequest::new(
                "embeddings",
                "/api/embeddings",
                json!({"model": model, "prompt": "Test text"}),
            )],
            Provider::Ollama => vec![
                RouteRequest::new(
                    "generate",
                    "/api/generate",
                    json!({"model": model, "prompt": "Hello", "stream": false}),
                ),
                RouteRequest::new(
                    "chat",
                    "/api/chat",
                    json!({
                        "model": model,
                        "messages": [super::bodies::user("Hello")],
                        "stream": false,
                    }),
                ),
            ],
            Provider::LmStudio => vec![
                RouteRequest::new("chat", "/v1/chat/completions", chat.clone()),
                RouteRequest::new("api-chat", "/api/v1/chat/completions", chat),
            ],
        }
    }

    /// Streaming story request: route suffix, body and wire dialect.
    pub fn stream_request(&self, model: &str) -> (&'static str, Value, Dialect) {
        match self {
            Provider::Ollama => (
                "/api/generate",
                json!({
                    "model": model,
                    "prompt": STORY_PROMPT,
                    "stream": true,
                    "options": {"num_predict": STORY_MAX_TOKENS},
                }),
                Dialect::OllamaNdjson,
            ),
            _ => (
                "/v1/chat/completions",
                json!({
                    "model": model,
                    "messages": [super::bodies::user(STORY_PROMPT)],
                    "stream": true,
                    "max_tokens": STORY_MAX_TOKENS,
                }),
                Dialect::OpenAiSse,
            ),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format())
    }
}

/// One provider-native request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub label: &'static str,
    pub suffix: &'static str,
    pub body: Value,
}

impl RouteRequest {
    fn new(label: &'static str, suffix: &'static str, body: Value) -> Self {
        Self {
            label,
            suffix,
            body,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EndpointUsage {
    pub total: u32,
    pub success: u32,
    pub failure: u32,
}

/// Requests per serving endpoint, keyed by the `X-Olla-Endpoint` value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageTally(BTreeMap<String, EndpointUsage>);

impl UsageTally {
    /// Count one response; responses without an endpoint header are not attributed.
    pub fn observe(&mut self, endpoint: Option<&str>, success: bool) {
        let Some(endpoint) = endpoint else {
            return;
        };
        let usage = self.0.entry(endpoint.to_string()).or_default();
        usage.total += 1;
        if success {
            usage.success += 1;
        } else {
            usage.failure += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EndpointUsage)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RoutingOptions {
    pub providers: Vec<Provider>,
    /// `None` tests every listed model
    pub max_models: Option<usize>,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            providers: Provider::ALL.to_vec(),
            max_models: Some(DEFAULT_MAX_MODELS),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingOutcome {
    pub provider_models: BTreeMap<Provider, Vec<String>>,
    pub usage: UsageTally,
    pub report: RunReport,
}

impl RoutingOutcome {
    /// Passed share of executed records, in whole percent.
    pub fn success_rate(&self) -> Option<u32> {
        let executed = self.report.passed() + self.report.failed();
        (executed > 0).then(|| (self.report.passed() * 100 / executed) as u32)
    }
}

/// List models per provider format, then route each provider's native
/// requests through its prefix.
pub async fn run_routing(
    harness: &Harness,
    options: &RoutingOptions,
) -> Result<RoutingOutcome, ProbeError> {
    harness.preflight().await?;
    let provider_models = fetch_all_provider_models(harness, &options.providers, false).await?;

    let mut report = RunReport::new("provider-routing");
    let mut usage = UsageTally::default();

    for provider in &options.providers {
        for suffix in provider.model_routes() {
            let name = format!("{}/models {}", provider, suffix);
            let path = routes::provider(provider.slug(), suffix);
            report.record(route_record(harness, name, &path, None, &mut usage).await);
        }
    }

    for provider in &options.providers {
        let models = provider_models.get(provider).map(Vec::as_slice).unwrap_or_default();
        if models.is_empty() {
            report.record(TestRecord::skip(
                format!("{}/routing", provider),
                "no models in this format",
            ));
            continue;
        }

        let limit = options.max_models.unwrap_or(usize::MAX);
        for model in models.iter().take(limit) {
            tracing::info!(provider = %provider, model = %model.id, "routing provider requests");
            for request in provider.requests(&model.id, model.is_embedding()) {
                let name = format!("{}/{} ({})", provider, request.label, model.id);
                let path = routes::provider(provider.slug(), request.suffix);
                report
                    .record(route_record(harness, name, &path, Some(&request.body), &mut usage).await);
            }
        }
    }

    Ok(RoutingOutcome {
        provider_models: provider_models
            .into_iter()
            .map(|(p, models)| (p, models.into_iter().map(|m| m.id).collect()))
            .collect(),
        usage,
        report,
    })
}

async fn fetch_all_provider_models(
    harness: &Harness,
    providers: &[Provider],
    generative_only: bool,
) -> Result<BTreeMap<Provider, Vec<Model>>, ProbeError> {
    let mut by_provider = BTreeMap::new();
    for provider in providers {
        match discovery::fetch_provider_models(harness.client(), provider.format()).await {
            Ok(mut models) => {
                if generative_only {
                    models.retain(|m| !m.is_embedding());
                }
                tracing::info!(provider = %provider, models = models.len(), "provider models");
                by_provider.insert(*provider, models);
            }
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "could not list provider models");
                by_provider.insert(*provider, Vec::new());
            }
        }
    }

    if by_provider.values().all(Vec::is_empty) {
        return Err(ProbeError::Discovery(
            "no models listed in any provider format".to_string(),
        ));
    }
    Ok(by_provider)
}

/// Success is HTTP 200 exactly.
async fn route_record(
    harness: &Harness,
    name: String,
    path: &str,
    body: Option<&Value>,
    usage: &mut UsageTally,
) -> TestRecord {
    let client = harness.client();
    let started = Instant::now();
    let response = match body {
        Some(body) => client.post_json(path, body).await,
        None => client.get(path).await,
    };
    let response = match response {
        Ok(r) => r,
        Err(e) => return TestRecord::fail(name, e.to_string()),
    };
    let elapsed = started.elapsed().as_secs_f64();
    let meta = ResponseMeta::from_response(&response);
    let ok = meta.status == 200;
    usage.observe(meta.endpoint.as_deref(), ok);

    let mut detail = if ok {
        format!("{:.3}s", elapsed)
    } else {
        format!("HTTP {}", meta.status)
    };
    if let Some(endpoint) = &meta.endpoint {
        detail.push_str(&format!(", routed to {}", endpoint));
    }
    TestRecord::new(name, CheckStatus::from_bool(ok), detail)
}

/// Which models the streaming run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    /// Exactly these, on every provider that lists them
    Explicit(Vec<String>),
    /// The first few per provider, each on the first provider that lists it
    Sample,
    /// Available preferred models, or every model when none is present
    Preferred,
}

#[derive(Debug, Clone)]
pub struct StreamingOptions {
    pub providers: Vec<Provider>,
    pub models: ModelChoice,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            providers: Provider::ALL.to_vec(),
            models: ModelChoice::Preferred,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStreamResult {
    pub provider: Provider,
    pub model: String,
    pub endpoint: Option<String>,
    pub chunks: usize,
    pub ttft: Option<f64>,
    pub total_time: Option<f64>,
    pub chars: usize,
    /// Rough estimate at four characters per token
    pub tokens_per_second: f64,
    pub evidence: TimingEvidence,
    pub quality: Option<StreamQuality>,
    pub error: Option<String>,
}

impl ProviderStreamResult {
    /// More than one content chunk is required to call it streaming.
    pub fn status(&self) -> CheckStatus {
        CheckStatus::from_bool(self.error.is_none() && self.chunks > 1)
    }

    /// Advisories printed under a result, mirroring the quality bands.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.error.is_some() {
            return warnings;
        }
        if self.chunks <= 1 {
            warnings.push(format!("no streaming detected (only {} chunk)", self.chunks));
        } else if self.chunks < 5 {
            warnings.push("low chunk count, may not be true streaming".to_string());
        } else if self.ttft.is_some_and(|t| t > 5.0) {
            warnings.push("slow time to first token".to_string());
        }
        warnings
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStreamingOutcome {
    pub results: Vec<ProviderStreamResult>,
    pub report: RunReport,
}

impl ProviderStreamingOutcome {
    /// Mean time to first token over passing results.
    pub fn average_ttft(&self) -> Option<f64> {
        mean(self.passing().filter_map(|r| r.ttft))
    }

    pub fn average_tokens_per_second(&self) -> Option<f64> {
        mean(self.passing().map(|r| r.tokens_per_second))
    }

    /// (passed, total) per provider.
    pub fn per_provider(&self) -> BTreeMap<Provider, (usize, usize)> {
        let mut counts: BTreeMap<Provider, (usize, usize)> = BTreeMap::new();
        for result in &self.results {
            let entry = counts.entry(result.provider).or_default();
            entry.1 += 1;
            if result.status() == CheckStatus::Pass {
                entry.0 += 1;
            }
        }
        counts
    }

    fn passing(&self) -> impl Iterator<Item = &ProviderStreamResult> {
        self.results
            .iter()
            .filter(|r| r.status() == CheckStatus::Pass)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Pair models with the providers they are streamed through.
///
/// Provider order follows `providers`; a model is only paired with providers
/// whose format lists it.
pub fn plan_streaming(
    provider_models: &BTreeMap<Provider, Vec<Model>>,
    providers: &[Provider],
    choice: &ModelChoice,
) -> Vec<(String, Vec<Provider>)> {
    let listed = |provider: &Provider| listed_ids(provider_models, provider);
    let all: BTreeSet<&str> = providers.iter().flat_map(listed).collect();

    let models: Vec<String> = match choice {
        ModelChoice::Explicit(models) => models.clone(),
        ModelChoice::Sample => providers
            .iter()
            .flat_map(|p| listed(p).into_iter().take(SAMPLE_SIZE))
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect(),
        ModelChoice::Preferred => {
            let preferred: Vec<String> = PREFERRED_MODELS
                .iter()
                .filter(|m| all.contains(*m))
                .map(|m| m.to_string())
                .collect();
            if preferred.is_empty() {
                all.iter().map(|m| m.to_string()).collect()
            } else {
                preferred
            }
        }
    };

    models
        .into_iter()
        .map(|model| {
            let mut serving: Vec<Provider> = providers
                .iter()
                .copied()
                .filter(|p| listed(p).contains(&model.as_str()))
                .collect();
            if *choice == ModelChoice::Sample {
                serving.truncate(1);
            }
            (model, serving)
        })
        .collect()
}

fn listed_ids<'a>(provider_models: &'a BTreeMap<Provider, Vec<Model>>, provider: &Provider) -> Vec<&'a str> {
    provider_models
        .get(provider)
        .map(|models| models.iter().map(|m| m.id.as_str()).collect())
        .unwrap_or_default()
}

/// Stream a story prompt through each provider prefix and measure delivery.
pub async fn run_streaming(
    harness: &Harness,
    options: &StreamingOptions,
) -> Result<ProviderStreamingOutcome, ProbeError> {
    harness.preflight().await?;
    let provider_models = fetch_all_provider_models(harness, &options.providers, true).await?;
    let plan = plan_streaming(&provider_models, &options.providers, &options.models);

    let mut report = RunReport::new("provider-streaming");
    let mut results = Vec::new();

    for (model, providers) in plan {
        if providers.is_empty() {
            report.record(TestRecord::skip(
                format!("streaming/{}", model),
                "not listed by any selected provider",
            ));
            continue;
        }
        for provider in providers {
            tracing::info!(provider = %provider, model = %model, "streaming through provider");
            let result = stream_through(harness, provider, &model).await;

            let detail = match &result.error {
                Some(e) => e.clone(),
                None => format!(
                    "{} chunks, ttft {}, ~{:.1} tok/s",
                    result.chunks,
                    result
                        .ttft
                        .map(|t| format!("{:.3}s", t))
                        .unwrap_or_else(|| "-".to_string()),
                    result.tokens_per_second,
                ),
            };
            report.record(TestRecord::new(
                format!("{}/stream ({})", provider, model),
                result.status(),
                detail,
            ));
            results.push(result);
        }
    }

    Ok(ProviderStreamingOutcome { results, report })
}

async fn stream_through(harness: &Harness, provider: Provider, model: &str) -> ProviderStreamResult {
    let mut result = ProviderStreamResult {
        provider,
        model: model.to_string(),
        endpoint: None,
        chunks: 0,
        ttft: None,
        total_time: None,
        chars: 0,
        tokens_per_second: 0.0,
        evidence: TimingEvidence::default(),
        quality: None,
        error: None,
    };
    if let Err(e) = measure_stream(harness, provider, model, &mut result).await {
        result.error = Some(e.to_string());
    }
    result
}

async fn measure_stream(
    harness: &Harness,
    provider: Provider,
    model: &str,
    result: &mut ProviderStreamResult,
) -> Result<(), ProbeError> {
    let client = harness.client();
    let (suffix, body, dialect) = provider.stream_request(model);

    let started = Instant::now();
    let response = client
        .post_json(&routes::provider(provider.slug(), suffix), &body)
        .await?;
    let meta = ResponseMeta::from_response(&response);
    result.endpoint = meta.endpoint.clone();

    if !meta.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ProbeError::Upstream {
            status: meta.status,
            message: crate::gateway::truncate(&text, 100),
        });
    }

    let capture = stream::capture(response, dialect, started, client.timeout()).await?;
    let total = capture.total_time.as_secs_f64();
    let verdict = timing::classify(&capture.events, &harness.config().timing);

    result.chunks = capture.content_count();
    result.ttft = capture.first_content_at().map(|at| at.as_secs_f64());
    result.total_time = Some(total);
    result.chars = capture.text().chars().count();
    if total > 0.0 {
        result.tokens_per_second = (result.chars / 4) as f64 / total;
    }
    result.evidence = verdict.evidence;
    result.quality = Some(verdict.quality);
    Ok(())
}
