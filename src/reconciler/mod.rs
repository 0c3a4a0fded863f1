//! Endpoint/model reconciliation
//!
//! The gateway's endpoint list and model list are fetched independently and
//! reference each other loosely: a model may name its serving endpoint by base
//! URL, by endpoint name, or not at all beyond a backend type hint. This module
//! joins the two into one plan per healthy backend: the models it serves, the
//! protocol mode the gateway should use for it, and one representative model to
//! test with.
//!
//! Resolution order for each availability reference:
//!
//! 1. URL references (`scheme://...`) against the normalised base URL index
//! 2. Anything else against the endpoint name index
//! 3. With nothing resolved, the model's type hint binds it to every endpoint
//!    of that type. Such bindings are approximate and reported as such.

pub mod mode;

pub use mode::ExpectedMode;

use crate::config::ModeConfig;
use crate::discovery::{Endpoint, Model};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// How a binding was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Url,
    Name,
    /// Bound through the model's backend type hint only
    TypeFallback,
}

impl MatchSource {
    pub fn is_approximate(&self) -> bool {
        matches!(self, MatchSource::TypeFallback)
    }
}

/// One `(endpoint, model)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub endpoint: String,
    pub model: String,
    pub source: MatchSource,
}

/// How the representative model is chosen for each backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// First bound model in input order
    #[default]
    First,
    /// Uniform choice; a seed makes the choice reproducible
    Random { seed: Option<u64> },
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Keep healthy endpoints that ended up with no models
    pub include_empty: bool,
    pub selection: Selection,
}

/// Everything the probe knows about one healthy backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendPlan {
    pub name: String,
    #[serde(rename = "type")]
    pub backend_type: String,
    pub url: Option<String>,
    pub status: String,
    /// Bound model ids, in model input order
    pub models: Vec<String>,
    pub mode: ExpectedMode,
    /// Subset of `models` bound only through a type hint
    pub approximate: Vec<String>,
    pub selected_model: Option<String>,
}

impl BackendPlan {
    /// True when the representative model came from a type-hint binding.
    pub fn selection_is_approximate(&self) -> bool {
        self.selected_model
            .as_ref()
            .is_some_and(|m| self.approximate.contains(m))
    }

    pub fn is_testable(&self) -> bool {
        self.mode.is_testable() && self.selected_model.is_some()
    }
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// Healthy backends, in endpoint input order
    pub backends: Vec<BackendPlan>,
    /// Names of endpoints dropped for not being healthy
    pub dropped: Vec<String>,
    /// Every binding to a healthy endpoint
    pub bindings: Vec<Binding>,
}

impl Reconciliation {
    pub fn backend(&self, name: &str) -> Option<&BackendPlan> {
        self.backends.iter().find(|b| b.name == name)
    }

    /// Backends that have an expected mode and a model to test with.
    pub fn testable(&self) -> impl Iterator<Item = &BackendPlan> {
        self.backends.iter().filter(|b| b.is_testable())
    }

    pub fn approximate_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| b.source.is_approximate())
    }
}

/// Strip surrounding whitespace and trailing slashes so `http://h:1/` matches `http://h:1`.
pub fn normalize_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

struct EndpointIndex<'a> {
    by_name: HashMap<&'a str, usize>,
    by_url: HashMap<&'a str, usize>,
    by_type: HashMap<String, Vec<usize>>,
}

impl<'a> EndpointIndex<'a> {
    fn build(endpoints: &'a [Endpoint]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_url = HashMap::new();
        let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, ep) in endpoints.iter().enumerate() {
            by_name.entry(ep.name.as_str()).or_insert(i);
            if let Some(url) = &ep.url {
                by_url.entry(normalize_url(url)).or_insert(i);
            }
            by_type
                .entry(ep.backend_type.to_ascii_lowercase())
                .or_default()
                .push(i);
        }

        Self {
            by_name,
            by_url,
            by_type,
        }
    }

    /// Endpoint indices serving `model`, with how each was found.
    fn resolve(&self, model: &Model) -> Vec<(usize, MatchSource)> {
        let mut found: Vec<(usize, MatchSource)> = Vec::new();

        for reference in &model.availability {
            let hit = if reference.is_url() {
                self.by_url
                    .get(normalize_url(&reference.endpoint))
                    .map(|&i| (i, MatchSource::Url))
            } else {
                self.by_name
                    .get(reference.endpoint.trim())
                    .map(|&i| (i, MatchSource::Name))
            };

            match hit {
                Some((i, source)) if !found.iter().any(|(j, _)| *j == i) => {
                    found.push((i, source))
                }
                Some(_) => {}
                None => tracing::debug!(
                    model = %model.id,
                    reference = %reference.endpoint,
                    "availability reference matches no endpoint"
                ),
            }
        }

        if found.is_empty() {
            if let Some(hint) = &model.type_hint {
                if let Some(indices) = self.by_type.get(&hint.to_ascii_lowercase()) {
                    found.extend(indices.iter().map(|&i| (i, MatchSource::TypeFallback)));
                }
            }
        }

        found
    }
}

/// Join endpoints and models into per-backend test plans.
///
/// Pure over its inputs: the same snapshot and options always give the same
/// result, except for unseeded random selection.
pub fn reconcile(
    endpoints: &[Endpoint],
    models: &[Model],
    modes: &ModeConfig,
    options: &ReconcileOptions,
) -> Reconciliation {
    let index = EndpointIndex::build(endpoints);

    // Per endpoint index: (model id, source), in model input order.
    let mut bound: Vec<Vec<(String, MatchSource)>> = vec![Vec::new(); endpoints.len()];
    let mut bindings = Vec::new();

    for model in models {
        if model.is_embedding() {
            tracing::debug!(model = %model.id, "skipping embedding model");
            continue;
        }

        for (i, source) in index.resolve(model) {
            let endpoint = &endpoints[i];
            if !endpoint.is_healthy() {
                continue;
            }
            if bound[i].iter().any(|(id, _)| id == &model.id) {
                continue;
            }
            if source.is_approximate() {
                tracing::warn!(
                    model = %model.id,
                    endpoint = %endpoint.name,
                    backend_type = %endpoint.backend_type,
                    "approximate binding through backend type hint"
                );
            }
            bound[i].push((model.id.clone(), source));
            bindings.push(Binding {
                endpoint: endpoint.name.clone(),
                model: model.id.clone(),
                source,
            });
        }
    }

    let mut rng = match options.selection {
        Selection::Random { seed: Some(seed) } => Some(StdRng::seed_from_u64(seed)),
        Selection::Random { seed: None } => Some(StdRng::from_entropy()),
        Selection::First => None,
    };

    let mut backends = Vec::new();
    let mut dropped = Vec::new();
    let mut seen = BTreeSet::new();

    for (endpoint, models) in endpoints.iter().zip(bound) {
        if !seen.insert(endpoint.name.as_str()) {
            continue;
        }
        if !endpoint.is_healthy() {
            tracing::debug!(endpoint = %endpoint.name, status = %endpoint.status, "dropping unhealthy endpoint");
            dropped.push(endpoint.name.clone());
            continue;
        }
        if models.is_empty() && !options.include_empty {
            tracing::debug!(endpoint = %endpoint.name, "no models bound to endpoint");
            continue;
        }

        let precise: Vec<&String> = models
            .iter()
            .filter(|(_, s)| !s.is_approximate())
            .map(|(id, _)| id)
            .collect();
        let candidates: Vec<&String> = if precise.is_empty() {
            models.iter().map(|(id, _)| id).collect()
        } else {
            precise
        };

        let selected_model = match rng.as_mut() {
            Some(rng) => candidates.choose(rng).map(|m| m.to_string()),
            None => candidates.first().map(|m| m.to_string()),
        };

        backends.push(BackendPlan {
            name: endpoint.name.clone(),
            backend_type: endpoint.backend_type.clone(),
            url: endpoint.url.clone(),
            status: endpoint.status.clone(),
            mode: modes.mode_for(&endpoint.backend_type),
            approximate: models
                .iter()
                .filter(|(_, s)| s.is_approximate())
                .map(|(id, _)| id.clone())
                .collect(),
            models: models.into_iter().map(|(id, _)| id).collect(),
            selected_model,
        });
    }

    Reconciliation {
        backends,
        dropped,
        bindings,
    }
}
