//! Phased integration run against a mock gateway.

mod common;

use common::*;
use probe::report::CheckStatus;
use probe::suite::integration::{self, IntegrationOptions, PHASES};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODELS: [&str; 2] = ["phi4:latest", "gpt-4o-mini"];

fn routed(template: ResponseTemplate) -> ResponseTemplate {
    template
        .insert_header("x-olla-endpoint", "local-ollama")
        .insert_header("x-olla-model", "phi4:latest")
        .insert_header("x-olla-backend-type", "ollama")
        .insert_header("x-olla-request-id", "req-7f3a")
        .insert_header("x-olla-response-time", "12ms")
}

fn proxy_stream_with_usage() -> String {
    let mut body = String::new();
    for piece in ["Hello", " there"] {
        let chunk = json!({"choices": [{"index": 0, "delta": {"content": piece}}]});
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    let usage = json!({
        "choices": [],
        "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
    });
    body.push_str(&format!("data: {}\n\n", usage));
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mount_get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Healthy passthrough and translation backends and every route family.
async fn conforming_gateway() -> MockServer {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_endpoints(
        &server,
        vec![
            endpoint("local-ollama", "ollama", "http://ollama.lan:11434", "healthy"),
            endpoint("litellm-proxy", "litellm", "http://litellm.lan:4000", "healthy"),
        ],
    )
    .await;
    mount_unified_models(
        &server,
        vec![
            unified_model("phi4:latest", &["local-ollama"]),
            unified_model("nomic-embed-text", &["local-ollama"]),
            unified_model("gpt-4o-mini", &["litellm-proxy"]),
        ],
    )
    .await;

    mount_get(&server, STATUS, json!({"status": "ok"})).await;
    mount_get(&server, STATUS_MODELS, json!({"recent_models": []})).await;
    mount_get(&server, MODEL_STATS, json!({"models": {}})).await;
    mount_get(&server, TRANSLATOR_STATS, healthy_stats()).await;
    mount_get(&server, PROCESS, json!({"uptime": "1h"})).await;
    mount_get(&server, VERSION, json!({"version": "v0.0.20", "commit": "4f2a9c1"})).await;
    mount_get(&server, PROXY_MODELS, json!({"data": [{"id": "phi4:latest"}]})).await;
    mount_get(&server, ANTHROPIC_MODELS, json!({"data": []})).await;
    mount_get(&server, "/olla/ollama/v1/models", json!({"data": [{"id": "phi4:latest"}]})).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/olla/models/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "phi4:latest"})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(PROXY_CHAT))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(routed(event_stream(proxy_stream_with_usage())))
        .mount(&server)
        .await;
    for model in MODELS {
        Mock::given(method("POST"))
            .and(path(PROXY_CHAT))
            .and(body_partial_json(json!({"model": model})))
            .respond_with(routed(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello"}}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 1, "total_tokens": 10}
            }))))
            .mount(&server)
            .await;
    }
    // Unknown models, missing models and unparseable bodies.
    Mock::given(method("POST"))
        .and(path(PROXY_CHAT))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad request"})))
        .mount(&server)
        .await;

    mount_passthrough_backend(&server).await;
    mount_translation_backend(&server).await;
    Mock::given(method("POST"))
        .and(path(ANTHROPIC_COUNT_TOKENS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"input_tokens": 7})))
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn test_every_phase_passes_against_conforming_gateway() {
    let server = conforming_gateway().await;
    let options = IntegrationOptions {
        seed: Some(11),
        ..Default::default()
    };

    let outcome = integration::run(&harness(&server), &options).await.unwrap();

    let failed: Vec<_> = outcome
        .report
        .records
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .collect();
    assert!(failed.is_empty(), "{:#?}", failed);

    let phases: Vec<&str> = outcome.phase_summary().iter().map(|p| p.0).collect();
    assert_eq!(phases, PHASES);

    let selected = outcome.selected_model.as_deref().unwrap();
    assert!(MODELS.contains(&selected));
    assert_eq!(outcome.passthrough.as_ref().unwrap().backend, "local-ollama");
    assert_eq!(outcome.translation.as_ref().unwrap().model, "gpt-4o-mini");

    let get = |name: &str| outcome.report.get(name).unwrap();
    assert_eq!(get("models/list").detail, "3 models");
    assert_eq!(
        get("proxy/token-usage-stream").detail,
        "prompt_tokens=9, completion_tokens=2, total_tokens=11"
    );
    assert_eq!(get("proxy/chat-stream").detail, "4 data lines");
    assert_eq!(get("anthropic/count-tokens").detail, "input_tokens=7");
    assert_eq!(get("passthrough/passthrough-stream").status, CheckStatus::Pass);
    assert_eq!(get("passthrough/translation-nonstream").status, CheckStatus::Pass);
    assert_eq!(get("passthrough/stats").status, CheckStatus::Pass);
    assert_eq!(get("providers/ollama").detail, "1 models");
    assert!(get("providers/litellm").detail.contains("404"));
    assert_eq!(get("errors/invalid-body").detail, "HTTP 400");
    assert!(get("headers/tracking").detail.contains("request-id=req-7f3a"));
}

#[tokio::test]
async fn test_seeded_runs_pick_the_same_model() {
    let server = conforming_gateway().await;
    let options = IntegrationOptions {
        skip_streaming: true,
        skip_anthropic: true,
        skip_providers: true,
        seed: Some(5),
    };

    let first = integration::run(&harness(&server), &options).await.unwrap();
    let second = integration::run(&harness(&server), &options).await.unwrap();
    assert_eq!(first.selected_model, second.selected_model);
    assert!(first.report.get("proxy/chat-stream").is_none());
    assert!(first.report.records.iter().all(|r| r.group() != "anthropic"));
    assert!(first.report.records.iter().all(|r| r.group() != "providers"));
}

#[tokio::test]
async fn test_unconfigured_anthropic_route_skips_phase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ANTHROPIC_MODELS))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_health(&server).await;
    mount_endpoints(
        &server,
        vec![endpoint("local-ollama", "ollama", "http://ollama.lan:11434", "healthy")],
    )
    .await;
    mount_unified_models(&server, vec![unified_model("phi4:latest", &["local-ollama"])]).await;

    let options = IntegrationOptions {
        skip_providers: true,
        ..Default::default()
    };
    let outcome = integration::run(&harness(&server), &options).await.unwrap();

    let record = outcome.report.get("anthropic/models").unwrap();
    assert_eq!(record.status, CheckStatus::Skip);
    assert!(record.detail.contains("not configured"));
    assert!(outcome.report.get("anthropic/messages-nonstream").is_none());

    // Nothing else is mounted, so the proxy checks fail but the run completes.
    assert_eq!(
        outcome.report.get("proxy/chat-nonstream").unwrap().status,
        CheckStatus::Fail
    );
    assert_eq!(
        outcome.report.get("errors/nonexistent-model").unwrap().status,
        CheckStatus::Pass
    );
}

#[tokio::test]
async fn test_missing_routing_headers_fail_proxy_check() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    mount_endpoints(
        &server,
        vec![endpoint("local-ollama", "ollama", "http://ollama.lan:11434", "healthy")],
    )
    .await;
    mount_unified_models(&server, vec![unified_model("phi4:latest", &["local-ollama"])]).await;
    Mock::given(method("POST"))
        .and(path(PROXY_CHAT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [], "usage": {}}))
                .insert_header("x-olla-endpoint", "local-ollama"),
        )
        .mount(&server)
        .await;

    let options = IntegrationOptions {
        skip_streaming: true,
        skip_anthropic: true,
        skip_providers: true,
        seed: None,
    };
    let outcome = integration::run(&harness(&server), &options).await.unwrap();

    let record = outcome.report.get("proxy/headers").unwrap();
    assert_eq!(record.status, CheckStatus::Fail);
    assert_eq!(
        record.detail,
        "missing headers: X-Olla-Model, X-Olla-Backend-Type, X-Olla-Request-ID"
    );
    assert_eq!(
        outcome.report.get("proxy/token-usage-nonstream").unwrap().status,
        CheckStatus::Fail
    );
    assert_eq!(
        outcome.report.get("errors/invalid-body").unwrap().status,
        CheckStatus::Fail
    );
}
