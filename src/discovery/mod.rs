//! Gateway snapshot discovery
//!
//! Fetches the endpoint list and one of the two model lists from the gateway's
//! status API and normalises both into canonical records. A snapshot is taken
//! once at the start of a run and never refreshed.

mod parser;

pub use parser::{parse_endpoints, parse_status_models, parse_unified_models};

use crate::gateway::{routes, GatewayClient, ProbeError};
use clap::ValueEnum;
use serde::Serialize;

/// A backend endpoint as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Unique within a snapshot
    pub name: String,
    #[serde(rename = "type")]
    pub backend_type: String,
    pub url: Option<String>,
    pub status: String,
    pub model_count: u32,
}

impl Endpoint {
    /// Route slug the gateway uses for this backend type.
    pub fn provider_slug(&self) -> &str {
        match self.backend_type.as_str() {
            "openai-compatible" => "openai",
            other => other,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// One serving reference attached to a model.
///
/// `endpoint` is either a base URL or an endpoint name; the reconciler decides which.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub endpoint: String,
    pub state: Option<String>,
}

impl Availability {
    /// True when the reference looks like a URL rather than an endpoint name.
    pub fn is_url(&self) -> bool {
        self.endpoint.contains("://")
    }
}

/// A model as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    pub id: String,
    pub availability: Vec<Availability>,
    /// Backend type hint, used only when no availability reference resolves
    pub type_hint: Option<String>,
}

impl Model {
    /// Embedding models cannot serve chat or completion requests.
    pub fn is_embedding(&self) -> bool {
        self.id.to_ascii_lowercase().contains("embed")
    }
}

/// Which gateway route supplies the model list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    /// `/internal/status/models`, availability by URL
    #[default]
    Status,
    /// `/olla/models`, availability by endpoint name
    Unified,
}

impl ModelSource {
    pub fn route(&self) -> &'static str {
        match self {
            ModelSource::Status => routes::STATUS_MODELS,
            ModelSource::Unified => routes::UNIFIED_MODELS,
        }
    }
}

/// Endpoints and models fetched at the start of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub endpoints: Vec<Endpoint>,
    pub models: Vec<Model>,
}

impl Snapshot {
    /// Model ids in input order, embedding models excluded.
    ///
    /// Candidates for checks that need any chat-capable model.
    pub fn generative_model_ids(&self) -> Vec<&str> {
        self.models
            .iter()
            .filter(|m| !m.is_embedding())
            .map(|m| m.id.as_str())
            .collect()
    }
}

/// Fetch the endpoint list only.
pub async fn fetch_endpoints(client: &GatewayClient) -> Result<Vec<Endpoint>, ProbeError> {
    let body = client
        .get_text(routes::STATUS_ENDPOINTS)
        .await
        .map_err(|e| ProbeError::Discovery(format!("endpoint list: {}", e)))?;
    parse_endpoints(&body).map_err(|e| ProbeError::Discovery(format!("endpoint list: {}", e)))
}

/// Fetch the model list from the given source.
pub async fn fetch_models(
    client: &GatewayClient,
    source: ModelSource,
) -> Result<Vec<Model>, ProbeError> {
    let body = client
        .get_text(source.route())
        .await
        .map_err(|e| ProbeError::Discovery(format!("model list: {}", e)))?;

    let parsed = match source {
        ModelSource::Status => parse_status_models(&body),
        ModelSource::Unified => parse_unified_models(&body),
    };
    parsed.map_err(|e| ProbeError::Discovery(format!("model list: {}", e)))
}

/// Fetch the unified model list rendered in one provider's format
/// (`openai`, `ollama`, `lmstudio`, `vllm`).
pub async fn fetch_provider_models(
    client: &GatewayClient,
    format: &str,
) -> Result<Vec<Model>, ProbeError> {
    let body = client.get_text(&routes::models_in_format(format)).await?;
    parse_unified_models(&body)
}

/// Take a full snapshot; an empty endpoint or model list is a discovery failure.
pub async fn discover(
    client: &GatewayClient,
    source: ModelSource,
) -> Result<Snapshot, ProbeError> {
    let endpoints = fetch_endpoints(client).await?;
    if endpoints.is_empty() {
        return Err(ProbeError::Discovery(
            "gateway reported no endpoints".to_string(),
        ));
    }

    let models = fetch_models(client, source).await?;
    if models.is_empty() {
        return Err(ProbeError::Discovery("gateway reported no models".to_string()));
    }

    tracing::info!(
        endpoints = endpoints.len(),
        models = models.len(),
        source = ?source,
        "discovered gateway snapshot"
    );

    Ok(Snapshot { endpoints, models })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> Model {
        Model {
            id: id.to_string(),
            availability: vec![],
            type_hint: None,
        }
    }

    #[test]
    fn test_embedding_detection_is_case_insensitive() {
        assert!(model("nomic-embed-text").is_embedding());
        assert!(model("BGE-Embedding-v2").is_embedding());
        assert!(!model("llama3.2:3b").is_embedding());
    }

    #[test]
    fn test_availability_url_detection() {
        let by_url = Availability {
            endpoint: "http://10.0.0.5:11434".to_string(),
            state: None,
        };
        let by_name = Availability {
            endpoint: "local-ollama".to_string(),
            state: None,
        };
        assert!(by_url.is_url());
        assert!(!by_name.is_url());
    }

    #[test]
    fn test_generative_ids_skip_embeddings() {
        let snapshot = Snapshot {
            endpoints: vec![],
            models: vec![model("mxbai-embed-large"), model("phi4:latest")],
        };
        assert_eq!(snapshot.generative_model_ids(), vec!["phi4:latest"]);
    }

    #[test]
    fn test_provider_slug() {
        let mut ep = Endpoint {
            name: "vllm-a".to_string(),
            backend_type: "openai-compatible".to_string(),
            url: None,
            status: "healthy".to_string(),
            model_count: 0,
        };
        assert_eq!(ep.provider_slug(), "openai");
        ep.backend_type = "lm-studio".to_string();
        assert_eq!(ep.provider_slug(), "lm-studio");
    }

    #[test]
    fn test_model_source_routes() {
        assert_eq!(ModelSource::Status.route(), "/internal/status/models");
        assert_eq!(ModelSource::Unified.route(), "/olla/models");
    }
}
