//! Harness runs against a live gateway
//!
//! Each run owns its [`RunReport`](crate::report::RunReport) and issues one
//! request at a time. Connectivity and discovery failures abort a run; every
//! other failure becomes a failed record and the run continues.

pub mod integration;
pub mod latency;
pub mod passthrough;
pub mod providers;
pub mod streaming;

use crate::config::ProbeConfig;
use crate::discovery::{self, Model, ModelSource, Snapshot};
use crate::gateway::{GatewayClient, ProbeError};
use crate::reconciler::{self, ReconcileOptions, Reconciliation};
use serde_json::{json, Value};

/// Models auto-selected for single-model runs, in order of preference.
pub const PREFERRED_MODELS: [&str; 3] = ["phi4:latest", "phi3.5:latest", "phi3:latest"];

/// Default prompt for Anthropic Messages checks.
pub const DEFAULT_PROMPT: &str = "Say hello briefly";

/// Gateway client plus the configuration a run was started with.
#[derive(Debug, Clone)]
pub struct Harness {
    client: GatewayClient,
    config: ProbeConfig,
}

impl Harness {
    pub fn new(config: ProbeConfig) -> Result<Self, ProbeError> {
        let client = GatewayClient::new(&config.gateway)?;
        Ok(Self { client, config })
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Health check; a failure aborts the run.
    pub async fn preflight(&self) -> Result<(), ProbeError> {
        self.client.check_health().await
    }

    /// Fetch a snapshot and reconcile it with the configured mode tables.
    pub async fn discover(
        &self,
        source: ModelSource,
        options: &ReconcileOptions,
    ) -> Result<(Snapshot, Reconciliation), ProbeError> {
        let snapshot = discovery::discover(&self.client, source).await?;
        let reconciliation = reconciler::reconcile(
            &snapshot.endpoints,
            &snapshot.models,
            &self.config.modes,
            options,
        );

        tracing::info!(
            backends = reconciliation.backends.len(),
            dropped = reconciliation.dropped.len(),
            approximate = reconciliation.approximate_bindings().count(),
            "reconciled endpoints and models"
        );

        Ok((snapshot, reconciliation))
    }

    /// Pick the model for a single-model run.
    pub async fn pick_model(
        &self,
        source: ModelSource,
        requested: Option<&str>,
    ) -> Result<String, ProbeError> {
        let models = discovery::fetch_models(&self.client, source).await?;
        select_model(&models, requested)
    }
}

/// Choose a model for a single-model run.
///
/// A requested model must exist among the non-embedding models. Otherwise the
/// first available [`PREFERRED_MODELS`] entry wins, then the alphabetically
/// first model. Embedding models are only considered when nothing else exists.
pub fn select_model(models: &[Model], requested: Option<&str>) -> Result<String, ProbeError> {
    if models.is_empty() {
        return Err(ProbeError::Discovery("no models available".to_string()));
    }

    let mut candidates: Vec<&str> = models
        .iter()
        .filter(|m| !m.is_embedding())
        .map(|m| m.id.as_str())
        .collect();
    if candidates.is_empty() {
        candidates = models.iter().map(|m| m.id.as_str()).collect();
    }
    candidates.sort_unstable();
    candidates.dedup();

    if let Some(requested) = requested {
        return candidates
            .iter()
            .find(|m| **m == requested)
            .map(|m| m.to_string())
            .ok_or_else(|| {
                ProbeError::Discovery(format!(
                    "model '{}' not found in available models",
                    requested
                ))
            });
    }

    let chosen = PREFERRED_MODELS
        .iter()
        .find(|p| candidates.contains(*p))
        .copied()
        .or_else(|| candidates.first().copied())
        .ok_or_else(|| ProbeError::Discovery("no models available".to_string()))?;

    tracing::info!(model = %chosen, "selected model");
    Ok(chosen.to_string())
}

/// Request bodies sent by the runs.
pub mod bodies {
    use super::*;

    pub fn user(content: &str) -> Value {
        json!({"role": "user", "content": content})
    }

    /// Anthropic Messages request.
    pub fn anthropic(
        model: &str,
        stream: bool,
        system: Option<&str>,
        messages: Option<Vec<Value>>,
    ) -> Value {
        let mut body = json!({
            "model": model,
            "messages": messages.unwrap_or_else(|| vec![user(DEFAULT_PROMPT)]),
            "max_tokens": 10,
        });
        if stream {
            body["stream"] = Value::Bool(true);
        }
        if let Some(system) = system {
            body["system"] = Value::String(system.to_string());
        }
        body
    }

    /// OpenAI chat completion request.
    pub fn openai_chat(model: &str, prompt: &str, stream: bool) -> Value {
        json!({
            "model": model,
            "messages": [user(prompt)],
            "stream": stream,
        })
    }

    /// Ollama generate request.
    pub fn ollama_generate(model: &str, prompt: &str) -> Value {
        json!({
            "model": model,
            "prompt": prompt,
            "stream": true,
        })
    }
}
