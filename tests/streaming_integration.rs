//! Streaming detection and latency runs against a mock gateway.

mod common;

use common::*;
use probe::discovery::ModelSource;
use probe::gateway::{routes, ProbeError};
use probe::report::CheckStatus;
use probe::stream::{self, Dialect};
use probe::suite::latency::{self, LatencyOptions};
use probe::suite::{streaming, Harness};
use std::time::Instant;
use probe::timing::{DeliveryMode, StreamQuality};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_openai_stream(server: &MockServer, pieces: &[String]) {
    let pieces: Vec<&str> = pieces.iter().map(String::as_str).collect();
    Mock::given(method("POST"))
        .and(path(OPENAI_CHAT))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(event_stream(openai_sse(&pieces)).insert_header("x-olla-endpoint", "local-ollama"))
        .mount(server)
        .await;
}

async fn mount_openai_buffered(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(OPENAI_CHAT))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "1 2 3 4 5"}}]
        })))
        .mount(server)
        .await;
}

async fn mount_ollama_stream(server: &MockServer, pieces: &[String]) {
    let pieces: Vec<&str> = pieces.iter().map(String::as_str).collect();
    Mock::given(method("POST"))
        .and(path(OLLAMA_GENERATE))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(ollama_ndjson(&pieces), "application/x-ndjson"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_detection_passes_when_gateway_streams() {
    let server = MockServer::start().await;
    mount_openai_stream(&server, &counting(20)).await;
    mount_openai_buffered(&server).await;
    mount_ollama_stream(&server, &counting(10)).await;

    let outcome = streaming::run(&harness(&server), "phi4:latest", false).await;

    assert_eq!(outcome.results.len(), 4);
    for result in &outcome.results {
        assert_eq!(result.status(), CheckStatus::Pass, "{:?}", result);
    }

    let long = &outcome.results[0];
    let verdict = long.verdict.as_ref().unwrap();
    assert_eq!(verdict.mode, DeliveryMode::Streaming);
    assert_eq!(verdict.evidence.count, 20);
    assert_eq!(long.endpoint.as_deref(), Some("local-ollama"));

    let buffered = outcome.results[3].verdict.as_ref().unwrap();
    assert_eq!(buffered.mode, DeliveryMode::SingleChunk);

    assert_eq!(outcome.streaming_percentage(), Some(100.0));
    assert!(outcome.report.get("streaming/ollama_format").is_some());
}

#[tokio::test]
async fn test_quick_runs_only_first_request() {
    let server = MockServer::start().await;
    mount_openai_stream(&server, &counting(5)).await;

    let outcome = streaming::run(&harness(&server), "phi4:latest", true).await;

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].name, "long_response");
    assert!(outcome.report.all_passed());
}

#[tokio::test]
async fn test_single_chunk_stream_fails_detection() {
    let server = MockServer::start().await;
    mount_openai_stream(&server, &["The whole answer at once".to_string()]).await;

    let outcome = streaming::run(&harness(&server), "phi4:latest", true).await;

    let result = &outcome.results[0];
    assert_eq!(result.status(), CheckStatus::Fail);
    assert_eq!(
        result.verdict.as_ref().unwrap().mode,
        DeliveryMode::SingleChunk
    );
}

#[tokio::test]
async fn test_stream_without_content_fails_with_message() {
    let server = MockServer::start().await;
    mount_openai_stream(&server, &[]).await;

    let outcome = streaming::run(&harness(&server), "phi4:latest", true).await;

    let record = outcome.report.get("streaming/long_response").unwrap();
    assert_eq!(record.status, CheckStatus::Fail);
    assert!(record.detail.contains("no chunks received"));
}

#[tokio::test]
async fn test_stalled_body_times_out_and_discards_events() {
    let url = stalled_stream_server(openai_chunks(&["1 ", "2 ", "3 "])).await;
    let harness = Harness::new(config_for(&url, 1)).unwrap();
    let client = harness.client();

    let started = Instant::now();
    let response = client
        .post_json(
            routes::OPENAI_CHAT,
            &json!({"model": "phi4:latest", "stream": true}),
        )
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let result = stream::capture(response, Dialect::OpenAiSse, started, client.timeout()).await;
    let err = result.unwrap_err();
    assert!(matches!(err, ProbeError::Timeout(1)), "{:?}", err);
    assert_eq!(err.to_string(), "request timeout after 1s");
}

#[tokio::test]
async fn test_stalled_stream_fails_detection_with_timeout() {
    let url = stalled_stream_server(openai_chunks(&["1 ", "2 ", "3 "])).await;
    let harness = Harness::new(config_for(&url, 1)).unwrap();

    let outcome = streaming::run(&harness, "phi4:latest", true).await;

    let result = &outcome.results[0];
    assert!(result.verdict.is_none());
    assert_eq!(result.error.as_deref(), Some("request timeout after 1s"));

    let record = outcome.report.get("streaming/long_response").unwrap();
    assert_eq!(record.status, CheckStatus::Fail);
    assert_eq!(record.detail, "request timeout after 1s");
}

#[tokio::test]
async fn test_http_error_fails_check_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(OPENAI_CHAT))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'ghost' not found"))
        .mount(&server)
        .await;

    let outcome = streaming::run(&harness(&server), "ghost", true).await;

    let result = &outcome.results[0];
    assert!(result.verdict.is_none());
    assert!(result.error.as_deref().unwrap().contains("not found"));
    assert_eq!(result.status(), CheckStatus::Fail);
}

#[tokio::test]
async fn test_pick_model_prefers_phi() {
    let server = MockServer::start().await;
    mount_unified_models(
        &server,
        vec![
            unified_model("llama3.2:3b", &["local-ollama"]),
            unified_model("phi3:latest", &["local-ollama"]),
            unified_model("nomic-embed-text", &["local-ollama"]),
        ],
    )
    .await;

    let harness = harness(&server);
    assert_eq!(
        harness.pick_model(ModelSource::Unified, None).await.unwrap(),
        "phi3:latest"
    );
    assert!(harness
        .pick_model(ModelSource::Unified, Some("mistral:7b"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_latency_run_measures_each_question() {
    let server = MockServer::start().await;
    mount_openai_stream(&server, &counting(12)).await;

    let options = LatencyOptions {
        count: 3,
        questions: vec!["Why is the sky blue?".to_string(), "What is Rust?".to_string()],
        seed: Some(42),
        ..LatencyOptions::default()
    };
    let outcome = latency::run(&harness(&server), "phi4:latest", &options).await;

    assert_eq!(outcome.samples.len(), 3);
    for sample in &outcome.samples {
        assert!(sample.success(), "{:?}", sample);
        assert_eq!(sample.chunks, 12);
        assert!(sample.ttft.is_some());
        assert_eq!(sample.endpoint.as_deref(), Some("local-ollama"));
    }

    assert_eq!(outcome.summary.successful, 3);
    assert_eq!(outcome.summary.success_rate(), 100.0);
    assert!(!outcome.summary.quality.contains_key(&StreamQuality::SingleChunk));
    assert!(outcome.report.get("latency/q3").is_some());
    assert!(outcome.report.all_passed());
}

#[tokio::test]
async fn test_latency_failures_are_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(OPENAI_CHAT))
        .respond_with(ResponseTemplate::new(503).set_body_string("no healthy endpoints"))
        .mount(&server)
        .await;

    let options = LatencyOptions {
        count: 2,
        seed: Some(1),
        ..LatencyOptions::default()
    };
    let outcome = latency::run(&harness(&server), "phi4:latest", &options).await;

    assert_eq!(outcome.summary.successful, 0);
    assert!(outcome.summary.ttft_avg.is_none());
    let record = outcome.report.get("latency/q1").unwrap();
    assert_eq!(record.status, CheckStatus::Fail);
    assert!(record.detail.contains("503"));
}
