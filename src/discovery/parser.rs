//! Boundary parsing of gateway status payloads.
//!
//! The gateway exposes models through two differently shaped routes and is
//! loose about key names (`data` or `models`, `id` or `name`). All of that is
//! resolved here into the canonical [`Endpoint`] and [`Model`] records.

use super::{Availability, Endpoint, Model};
use crate::gateway::ProbeError;
use serde::Deserialize;
use std::collections::HashSet;

/// `/internal/status/endpoints` response format
#[derive(Deserialize)]
struct EndpointsResponse {
    #[serde(default)]
    endpoints: Vec<RawEndpoint>,
}

#[derive(Deserialize)]
struct RawEndpoint {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    backend_type: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    model_count: u32,
}

/// `/internal/status/models` response format
#[derive(Deserialize)]
struct StatusModelsResponse {
    #[serde(default)]
    recent_models: Vec<StatusModel>,
}

#[derive(Deserialize)]
struct StatusModel {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    type_hint: Option<String>,
    /// Serving endpoint URLs
    #[serde(default)]
    endpoints: Vec<String>,
}

/// `/olla/models` response format; the list lives under either key.
#[derive(Deserialize)]
#[serde(untagged)]
enum UnifiedModelsResponse {
    Data { data: Vec<UnifiedModel> },
    Models { models: Vec<UnifiedModel> },
}

#[derive(Deserialize)]
struct UnifiedModel {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    type_hint: Option<String>,
    #[serde(default)]
    olla: Option<OllaExtensions>,
    #[serde(default)]
    endpoints: Vec<String>,
}

#[derive(Deserialize)]
struct OllaExtensions {
    #[serde(default)]
    availability: Vec<RawAvailability>,
}

#[derive(Deserialize)]
struct RawAvailability {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    state: Option<String>,
}

/// Parse the endpoint status list.
///
/// Nameless entries become `"unknown"`; a repeated name keeps its first entry.
pub fn parse_endpoints(body: &str) -> Result<Vec<Endpoint>, ProbeError> {
    let response: EndpointsResponse =
        serde_json::from_str(body).map_err(|e| ProbeError::InvalidResponse(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut endpoints = Vec::with_capacity(response.endpoints.len());

    for raw in response.endpoints {
        let name = non_empty(raw.name).unwrap_or_else(|| "unknown".to_string());
        if !seen.insert(name.clone()) {
            tracing::warn!(endpoint = %name, "duplicate endpoint name, keeping the first entry");
            continue;
        }
        endpoints.push(Endpoint {
            name,
            backend_type: non_empty(raw.backend_type).unwrap_or_else(|| "unknown".to_string()),
            url: raw.url.and_then(non_empty),
            status: non_empty(raw.status).unwrap_or_else(|| "unknown".to_string()),
            model_count: raw.model_count,
        });
    }

    Ok(endpoints)
}

/// Parse `/internal/status/models`, whose availability is a list of endpoint URLs.
pub fn parse_status_models(body: &str) -> Result<Vec<Model>, ProbeError> {
    let response: StatusModelsResponse =
        serde_json::from_str(body).map_err(|e| ProbeError::InvalidResponse(e.to_string()))?;

    Ok(response
        .recent_models
        .into_iter()
        .filter_map(|m| {
            let id = non_empty(m.name)?;
            Some(Model {
                id,
                availability: m
                    .endpoints
                    .into_iter()
                    .filter_map(non_empty)
                    .map(|endpoint| Availability {
                        endpoint,
                        state: None,
                    })
                    .collect(),
                type_hint: m.type_hint.and_then(non_empty),
            })
        })
        .collect())
}

/// Parse `/olla/models`, whose availability names endpoints.
pub fn parse_unified_models(body: &str) -> Result<Vec<Model>, ProbeError> {
    let response: UnifiedModelsResponse = serde_json::from_str(body).map_err(|e| {
        ProbeError::InvalidResponse(format!("expected a `data` or `models` list: {}", e))
    })?;

    let raw = match response {
        UnifiedModelsResponse::Data { data } => data,
        UnifiedModelsResponse::Models { models } => models,
    };

    Ok(raw
        .into_iter()
        .filter_map(|m| {
            let Some(id) = m.id.and_then(non_empty).or_else(|| m.name.and_then(non_empty))
            else {
                tracing::debug!("skipping model entry without id or name");
                return None;
            };

            let mut availability: Vec<Availability> = m
                .olla
                .map(|o| o.availability)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| {
                    non_empty(a.endpoint).map(|endpoint| Availability {
                        endpoint,
                        state: a.state.and_then(non_empty),
                    })
                })
                .collect();
            availability.extend(m.endpoints.into_iter().filter_map(non_empty).map(
                |endpoint| Availability {
                    endpoint,
                    state: None,
                },
            ));

            Some(Model {
                id,
                availability,
                type_hint: m.type_hint.and_then(non_empty),
            })
        })
        .collect())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}
