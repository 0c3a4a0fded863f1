//! Streaming detection run
//!
//! Sends text prompts with `stream: true` over the OpenAI and Ollama routes and
//! one `stream: false` request, then classifies the arrival pattern of each.
//! Streamed prompts must be delivered incrementally; the non-streamed one must not.

use super::{bodies, Harness};
use crate::gateway::{routes, ProbeError, ResponseMeta};
use crate::report::{CheckStatus, RunReport, TestRecord};
use crate::stream::{self, Dialect};
use crate::timing::{self, DeliveryMode, Verdict};
use serde::Serialize;
use std::time::Instant;

/// One detection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionProbe {
    pub name: &'static str,
    pub prompt: &'static str,
    /// `None` for the non-streaming request
    pub dialect: Option<Dialect>,
}

impl DetectionProbe {
    pub fn expects_streaming(&self) -> bool {
        self.dialect.is_some()
    }

    fn route(&self) -> &'static str {
        match self.dialect {
            Some(Dialect::OllamaNdjson) => routes::OLLAMA_GENERATE,
            _ => routes::OPENAI_CHAT,
        }
    }

    fn body(&self, model: &str) -> serde_json::Value {
        match self.dialect {
            Some(Dialect::OllamaNdjson) => bodies::ollama_generate(model, self.prompt),
            Some(_) => bodies::openai_chat(model, self.prompt, true),
            None => bodies::openai_chat(model, self.prompt, false),
        }
    }
}

pub const PROBES: [DetectionProbe; 4] = [
    DetectionProbe {
        name: "long_response",
        prompt: "Count from 1 to 20, saying each number slowly",
        dialect: Some(Dialect::OpenAiSse),
    },
    DetectionProbe {
        name: "quick_response",
        prompt: "Say hello",
        dialect: Some(Dialect::OpenAiSse),
    },
    DetectionProbe {
        name: "ollama_format",
        prompt: "Count from 1 to 10",
        dialect: Some(Dialect::OllamaNdjson),
    },
    DetectionProbe {
        name: "stream_false",
        prompt: "Count from 1 to 5",
        dialect: None,
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub name: String,
    /// `streaming` for streamed probes, `standard` otherwise
    pub expected: DeliveryMode,
    pub verdict: Option<Verdict>,
    pub endpoint: Option<String>,
    pub total_time: Option<f64>,
    pub error: Option<String>,
}

impl ProbeResult {
    /// Streamed probes must stream; the buffered probe must not.
    pub fn status(&self) -> CheckStatus {
        match &self.verdict {
            None => CheckStatus::Fail,
            Some(v) if self.expected == DeliveryMode::Streaming => {
                CheckStatus::from_bool(v.mode == DeliveryMode::Streaming)
            }
            Some(v) => CheckStatus::from_bool(v.mode != DeliveryMode::Streaming),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamingOutcome {
    pub model: String,
    pub results: Vec<ProbeResult>,
    pub report: RunReport,
}

impl StreamingOutcome {
    /// Share of streamed probes that actually streamed, in percent.
    pub fn streaming_percentage(&self) -> Option<f64> {
        let streamed: Vec<&ProbeResult> = self
            .results
            .iter()
            .filter(|r| r.expected == DeliveryMode::Streaming && r.verdict.is_some())
            .collect();
        if streamed.is_empty() {
            return None;
        }
        let ok = streamed
            .iter()
            .filter(|r| r.status() == CheckStatus::Pass)
            .count();
        Some(ok as f64 * 100.0 / streamed.len() as f64)
    }
}

/// Run the detection probes against one model; `quick` runs only the first.
pub async fn run(harness: &Harness, model: &str, quick: bool) -> StreamingOutcome {
    let probes: &[DetectionProbe] = if quick { &PROBES[..1] } else { &PROBES };

    let mut report = RunReport::new("streaming");
    let mut results = Vec::with_capacity(probes.len());

    for probe in probes {
        tracing::info!(probe = probe.name, model = %model, "running detection probe");
        let result = run_probe(harness, model, probe).await;

        let detail = match (&result.verdict, &result.error) {
            (Some(v), _) => format!("{} (expected {})", v, result.expected),
            (None, Some(e)) => e.clone(),
            (None, None) => String::new(),
        };
        report.record(TestRecord::new(
            format!("streaming/{}", result.name),
            result.status(),
            detail,
        ));
        results.push(result);
    }

    StreamingOutcome {
        model: model.to_string(),
        results,
        report,
    }
}

async fn run_probe(harness: &Harness, model: &str, probe: &DetectionProbe) -> ProbeResult {
    let expected = if probe.expects_streaming() {
        DeliveryMode::Streaming
    } else {
        DeliveryMode::Standard
    };
    let mut result = ProbeResult {
        name: probe.name.to_string(),
        expected,
        verdict: None,
        endpoint: None,
        total_time: None,
        error: None,
    };

    match measure(harness, model, probe, &mut result).await {
        Ok(verdict) => result.verdict = Some(verdict),
        Err(e) => result.error = Some(e.to_string()),
    }
    result
}

async fn measure(
    harness: &Harness,
    model: &str,
    probe: &DetectionProbe,
    result: &mut ProbeResult,
) -> Result<Verdict, ProbeError> {
    let client = harness.client();
    let thresholds = &harness.config().timing;

    let started = Instant::now();
    let response = client.post_json(probe.route(), &probe.body(model)).await?;
    let meta = ResponseMeta::from_response(&response);
    result.endpoint = meta.endpoint.clone();

    if !meta.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ProbeError::Upstream {
            status: meta.status,
            message: crate::gateway::truncate(&text, 100),
        });
    }

    let Some(dialect) = probe.dialect else {
        // The whole body is one delivery.
        client.read_json(response).await?;
        let elapsed = started.elapsed().as_secs_f64();
        result.total_time = Some(elapsed);
        return Ok(timing::classify_arrivals(&[elapsed], thresholds));
    };

    let capture = stream::capture(response, dialect, started, client.timeout()).await?;
    result.total_time = Some(capture.total_time.as_secs_f64());

    if capture.content_count() == 0 {
        return Err(ProbeError::InvalidResponse("no chunks received".to_string()));
    }

    Ok(timing::classify(&capture.events, thresholds))
}
