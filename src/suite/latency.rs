//! Streaming latency run
//!
//! Asks a model a series of questions over OpenAI SSE and reports time to
//! first token, chunk statistics and the smoothness band of each answer.

use super::{bodies, Harness};
use crate::gateway::{routes, truncate, ProbeError, ResponseMeta};
use crate::report::{RunReport, TestRecord};
use crate::stream::{self, Dialect};
use crate::timing::{self, StreamQuality, TimingEvidence};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// Questions used when no question file exists.
pub const DEFAULT_QUESTIONS: [&str; 20] = [
    "Tell me a short story about a robot learning to paint.",
    "Explain how photosynthesis works in simple terms.",
    "What are the main differences between machine learning and artificial intelligence?",
    "Describe the process of making bread from scratch.",
    "Write a haiku about the ocean.",
    "Explain the concept of recursion in programming with an example.",
    "What would happen if gravity suddenly became twice as strong?",
    "Tell me about the history of the internet in three paragraphs.",
    "How do solar panels convert sunlight into electricity?",
    "Write a dialogue between two characters meeting for the first time.",
    "Explain why the sky appears blue during the day.",
    "What are the benefits and drawbacks of renewable energy?",
    "Describe how a computer processor works at a basic level.",
    "Tell me about an interesting historical event from the 1960s.",
    "How do vaccines help prevent diseases?",
    "Write a short poem about autumn leaves.",
    "Explain the water cycle and its importance to life on Earth.",
    "What makes a good leader, and can leadership skills be learned?",
    "Describe the process of evolution by natural selection.",
    "How do search engines like Google find and rank web pages?",
];

#[derive(Debug, Clone)]
pub struct LatencyOptions {
    pub count: usize,
    pub questions: Vec<String>,
    /// Seed for question sampling
    pub seed: Option<u64>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LatencyOptions {
    fn default() -> Self {
        Self {
            count: 5,
            questions: DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect(),
            seed: None,
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

/// Non-empty lines that are not `#` comments.
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a question file, falling back to [`DEFAULT_QUESTIONS`] when it does not exist.
pub fn load_questions(path: &Path) -> std::io::Result<Vec<String>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "question file not found, using built-in questions");
        return Ok(DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect());
    }
    let questions = parse_questions(&std::fs::read_to_string(path)?);
    if questions.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("no questions in {}", path.display()),
        ));
    }
    Ok(questions)
}

/// Measurements for one question.
#[derive(Debug, Clone, Serialize)]
pub struct LatencySample {
    pub question: String,
    pub endpoint: Option<String>,
    pub chunks: usize,
    pub chars: usize,
    /// Time to first token in seconds
    pub ttft: Option<f64>,
    pub total_time: f64,
    pub evidence: TimingEvidence,
    pub quality: StreamQuality,
    pub error: Option<String>,
}

impl LatencySample {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.chunks > 0
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub total: usize,
    pub successful: usize,
    pub ttft_min: Option<f64>,
    pub ttft_avg: Option<f64>,
    pub ttft_max: Option<f64>,
    pub quality: BTreeMap<StreamQuality, usize>,
}

impl LatencySummary {
    pub fn from_samples(samples: &[LatencySample]) -> Self {
        let ok: Vec<&LatencySample> = samples.iter().filter(|s| s.success()).collect();
        let ttfts: Vec<f64> = ok.iter().filter_map(|s| s.ttft).filter(|t| *t > 0.0).collect();

        let mut quality = BTreeMap::new();
        for sample in &ok {
            *quality.entry(sample.quality).or_insert(0) += 1;
        }

        let (ttft_min, ttft_avg, ttft_max) = if ttfts.is_empty() {
            (None, None, None)
        } else {
            (
                Some(ttfts.iter().copied().fold(f64::MAX, f64::min)),
                Some(ttfts.iter().sum::<f64>() / ttfts.len() as f64),
                Some(ttfts.iter().copied().fold(f64::MIN, f64::max)),
            )
        };

        Self {
            total: samples.len(),
            successful: ok.len(),
            ttft_min,
            ttft_avg,
            ttft_max,
            quality,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyOutcome {
    pub model: String,
    pub samples: Vec<LatencySample>,
    pub summary: LatencySummary,
    pub report: RunReport,
}

/// Ask `options.count` randomly drawn questions, one at a time.
pub async fn run(harness: &Harness, model: &str, options: &LatencyOptions) -> LatencyOutcome {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut report = RunReport::new("latency");
    let mut samples = Vec::with_capacity(options.count);

    for i in 0..options.count {
        let Some(question) = options.questions.choose(&mut rng) else {
            break;
        };
        tracing::info!(n = i + 1, of = options.count, "asking question");

        let sample = ask(harness, model, question, options).await;
        let name = format!("latency/q{}", i + 1);
        let record = match &sample.error {
            Some(e) => TestRecord::fail(name, e.clone()),
            None if sample.chunks == 0 => TestRecord::fail(name, "no content received"),
            None => TestRecord::pass(
                name,
                format!(
                    "TTFT {:.3}s, {} chunks, {}",
                    sample.ttft.unwrap_or_default(),
                    sample.chunks,
                    sample.quality
                ),
            ),
        };
        report.record(record);
        samples.push(sample);
    }

    LatencyOutcome {
        model: model.to_string(),
        summary: LatencySummary::from_samples(&samples),
        samples,
        report,
    }
}

async fn ask(
    harness: &Harness,
    model: &str,
    question: &str,
    options: &LatencyOptions,
) -> LatencySample {
    let mut sample = LatencySample {
        question: truncate(question, 50),
        endpoint: None,
        chunks: 0,
        chars: 0,
        ttft: None,
        total_time: 0.0,
        evidence: TimingEvidence::default(),
        quality: StreamQuality::SingleChunk,
        error: None,
    };

    let started = Instant::now();
    if let Err(e) = measure(harness, model, question, options, started, &mut sample).await {
        sample.error = Some(e.to_string());
    }
    if sample.total_time == 0.0 {
        sample.total_time = started.elapsed().as_secs_f64();
    }
    sample
}

async fn measure(
    harness: &Harness,
    model: &str,
    question: &str,
    options: &LatencyOptions,
    started: Instant,
    sample: &mut LatencySample,
) -> Result<(), ProbeError> {
    let client = harness.client();

    let mut body = bodies::openai_chat(model, question, true);
    body["max_tokens"] = Value::from(options.max_tokens);
    body["temperature"] = Value::from(options.temperature);

    let response = client.post_json(routes::OPENAI_CHAT, &body).await?;
    let meta = ResponseMeta::from_response(&response);
    sample.endpoint = meta.endpoint.clone();

    if !meta.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ProbeError::Upstream {
            status: meta.status,
            message: truncate(&text, 100),
        });
    }

    let capture = stream::capture(response, Dialect::OpenAiSse, started, client.timeout()).await?;
    let arrivals = capture.content_arrivals();

    sample.chunks = arrivals.len();
    sample.chars = capture.text().chars().count();
    sample.ttft = capture.first_content_at().map(|at| at.as_secs_f64());
    sample.total_time = capture.total_time.as_secs_f64();
    sample.evidence = TimingEvidence::from_arrivals(&arrivals);
    sample.quality = timing::stream_quality(&sample.evidence, &harness.config().timing);
    Ok(())
}
