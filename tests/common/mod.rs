//! Shared test utilities for olla-probe integration tests.
//!
//! Provides a mock gateway built on wiremock plus body builders for the
//! three streaming dialects.

#![allow(dead_code)]

use probe::config::ProbeConfig;
use probe::suite::Harness;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Gateway Paths
// =============================================================================

pub const HEALTH: &str = "/internal/health";
pub const STATUS_ENDPOINTS: &str = "/internal/status/endpoints";
pub const STATUS_MODELS: &str = "/internal/status/models";
pub const UNIFIED_MODELS: &str = "/olla/models";
pub const TRANSLATOR_STATS: &str = "/internal/stats/translators";
pub const STATUS: &str = "/internal/status";
pub const MODEL_STATS: &str = "/internal/stats/models";
pub const PROCESS: &str = "/internal/process";
pub const VERSION: &str = "/version";
pub const ANTHROPIC_MODELS: &str = "/olla/anthropic/v1/models";
pub const ANTHROPIC_COUNT_TOKENS: &str = "/olla/anthropic/v1/messages/count_tokens";
pub const PROXY_MODELS: &str = "/olla/proxy/v1/models";
pub const ANTHROPIC_MESSAGES: &str = "/olla/anthropic/v1/messages";
pub const OPENAI_CHAT: &str = "/olla/openai/v1/chat/completions";
pub const PROXY_CHAT: &str = "/olla/proxy/v1/chat/completions";
pub const OLLAMA_GENERATE: &str = "/olla/ollama/api/generate";

// =============================================================================
// Config and Harness
// =============================================================================

/// Default config pointed at the mock server with short timeouts.
pub fn probe_config(server: &MockServer) -> ProbeConfig {
    let mut config = ProbeConfig::default();
    config.gateway.url = server.uri();
    config.gateway.timeout_seconds = 5;
    config.gateway.health_timeout_seconds = 2;
    config
}

pub fn harness(server: &MockServer) -> Harness {
    Harness::new(probe_config(server)).unwrap()
}

/// Config for an arbitrary base URL with the given request budget.
pub fn config_for(url: &str, timeout_seconds: u64) -> ProbeConfig {
    let mut config = ProbeConfig::default();
    config.gateway.url = url.to_string();
    config.gateway.timeout_seconds = timeout_seconds;
    config.gateway.health_timeout_seconds = 1;
    config
}

// =============================================================================
// Stalled Server
// =============================================================================

/// Serve every request with a chunked event stream that sends `chunks` and
/// then goes silent without closing. Returns the base URL.
pub async fn stalled_stream_server(chunks: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let chunks = chunks.clone();
            tokio::spawn(async move {
                let mut request: Vec<u8> = Vec::new();
                let mut buf = [0u8; 4096];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = "HTTP/1.1 200 OK\r\n\
                            content-type: text/event-stream\r\n\
                            transfer-encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for chunk in &chunks {
                    let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                    if socket.write_all(framed.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    format!("http://{}", addr)
}

/// `data:` lines of an OpenAI stream without the terminating `[DONE]`.
pub fn openai_chunks(pieces: &[&str]) -> Vec<String> {
    pieces
        .iter()
        .map(|piece| {
            let chunk = json!({"choices": [{"index": 0, "delta": {"content": piece}}]});
            format!("data: {}\n\n", chunk)
        })
        .collect()
}

// =============================================================================
// Discovery Mocks
// =============================================================================

pub async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(HEALTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(server)
        .await;
}

pub fn endpoint(name: &str, backend_type: &str, url: &str, status: &str) -> Value {
    json!({
        "name": name,
        "type": backend_type,
        "url": url,
        "status": status,
        "model_count": 1,
    })
}

pub async fn mount_endpoints(server: &MockServer, endpoints: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(STATUS_ENDPOINTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "endpoints": endpoints })))
        .mount(server)
        .await;
}

/// `/internal/status/models` entry served from the given endpoint URLs.
pub fn status_model(name: &str, endpoint_urls: &[&str]) -> Value {
    json!({"name": name, "endpoints": endpoint_urls})
}

pub async fn mount_status_models(server: &MockServer, models: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(STATUS_MODELS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "recent_models": models })))
        .mount(server)
        .await;
}

/// `/olla/models` entry in the `data` shape.
pub fn unified_model(id: &str, endpoints: &[&str]) -> Value {
    let availability: Vec<Value> = endpoints
        .iter()
        .map(|e| json!({"endpoint": e, "state": "loaded"}))
        .collect();
    json!({"id": id, "olla": {"availability": availability}})
}

pub async fn mount_unified_models(server: &MockServer, models: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(UNIFIED_MODELS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": models })))
        .mount(server)
        .await;
}

// =============================================================================
// Backend Mocks
// =============================================================================

/// Passthrough backend serving `phi4:latest` with the mode header.
pub async fn mount_passthrough_backend(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(ANTHROPIC_MESSAGES))
        .and(body_partial_json(json!({"model": "phi4:latest", "stream": true})))
        .respond_with(
            event_stream(anthropic_sse("Hello there friend"))
                .insert_header("x-olla-mode", "passthrough")
                .insert_header("x-olla-endpoint", "local-ollama"),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(ANTHROPIC_MESSAGES))
        .and(body_partial_json(json!({"model": "phi4:latest"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(anthropic_message("phi4:latest", "Hello!"))
                .insert_header("x-olla-mode", "passthrough")
                .insert_header("x-olla-endpoint", "local-ollama")
                .insert_header("x-olla-backend-type", "ollama"),
        )
        .mount(server)
        .await;
}

/// Translation backend serving `gpt-4o-mini` without the mode header.
pub async fn mount_translation_backend(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(ANTHROPIC_MESSAGES))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "stream": true})))
        .respond_with(event_stream(anthropic_sse("Hi")).insert_header("x-olla-endpoint", "litellm-proxy"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(ANTHROPIC_MESSAGES))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(anthropic_message("gpt-4o-mini", "Hi"))
                .insert_header("x-olla-endpoint", "litellm-proxy"),
        )
        .mount(server)
        .await;
}

/// Translator counters consistent with both modes having been exercised.
pub fn healthy_stats() -> Value {
    json!({
        "translators": [{
            "translator_name": "anthropic",
            "total_requests": 7,
            "passthrough_requests": 5,
            "translation_requests": 2,
            "passthrough_rate": "71.43%",
            "streaming_requests": 2,
            "non_streaming_requests": 5,
            "fallback_no_compatible_endpoints": 0,
            "fallback_translator_does_not_support_passthrough": 0,
            "fallback_cannot_passthrough": 0
        }],
        "summary": {"overall_passthrough_rate": "71.43%"}
    })
}

// =============================================================================
// Response Bodies
// =============================================================================

/// Non-streaming Anthropic Messages response.
pub fn anthropic_message(model: &str, text: &str) -> Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 5, "output_tokens": 3},
    })
}

/// Anthropic SSE stream with the full event vocabulary, one delta per word.
pub fn anthropic_sse(text: &str) -> String {
    let mut out = String::new();
    let mut event = |name: &str, data: Value| {
        out.push_str(&format!("event: {}\ndata: {}\n\n", name, data));
    };

    event(
        "message_start",
        json!({"type": "message_start", "message": {"id": "msg_01", "role": "assistant"}}),
    );
    event(
        "content_block_start",
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
    );
    for word in text.split_inclusive(' ') {
        event(
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": word}}),
        );
    }
    event("content_block_stop", json!({"type": "content_block_stop", "index": 0}));
    event(
        "message_delta",
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
    );
    event("message_stop", json!({"type": "message_stop"}));
    out
}

/// OpenAI SSE stream with one delta per piece, terminated by `[DONE]`.
pub fn openai_sse(pieces: &[&str]) -> String {
    let mut out = String::new();
    for piece in pieces {
        let chunk = json!({"choices": [{"index": 0, "delta": {"content": piece}}]});
        out.push_str(&format!("data: {}\n\n", chunk));
    }
    out.push_str("data: [DONE]\n\n");
    out
}

/// Ollama NDJSON stream ending with a `done` line.
pub fn ollama_ndjson(pieces: &[&str]) -> String {
    let mut out = String::new();
    for piece in pieces {
        out.push_str(&format!("{}\n", json!({"response": piece, "done": false})));
    }
    out.push_str(&format!("{}\n", json!({"response": "", "done": true})));
    out
}

pub fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

/// Numbers "1 " through "n " as stream pieces.
pub fn counting(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{} ", i)).collect()
}
