//! Backend descriptors.
//!
//! A descriptor is the immutable, config-derived view of one model endpoint:
//! what it costs, how fast and how good it is, and where it runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::BackendConfig;

/// Who operates the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Commercial API (OpenAI-compatible chat completions).
    Hosted,
    /// Model server we run ourselves (Ollama).
    SelfHosted,
}

/// Coarse quality classification of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl QualityTier {
    /// Numeric weight used by the selection scorer.
    pub fn weight(self) -> f64 {
        match self {
            QualityTier::High => 100.0,
            QualityTier::Medium => 50.0,
            QualityTier::Low => 25.0,
        }
    }
}

/// Region a backend serves from, or a request is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    #[default]
    Global,
    Eu,
    Us,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Global => "global",
            Region::Eu => "eu",
            Region::Us => "us",
        };
        f.write_str(s)
    }
}

/// A single backend in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub provider: ProviderKind,
    pub model: String,
    /// Maximum input + output token budget.
    pub max_tokens: u32,
    pub cost_per_1k: f64,
    pub latency_ms: u64,
    pub quality: QualityTier,
    pub region: Region,
    /// Base URL the invocation adapter talks to.
    pub endpoint: String,
}

impl BackendDescriptor {
    pub fn is_self_hosted(&self) -> bool {
        self.provider == ProviderKind::SelfHosted
    }

    /// Estimated cost in USD for the given token count.
    pub fn estimate_cost(&self, tokens: u32) -> f64 {
        f64::from(tokens) / 1000.0 * self.cost_per_1k
    }

    /// Human-readable locality label used in routing justifications.
    pub fn locality(&self) -> &'static str {
        match self.provider {
            ProviderKind::SelfHosted => "self-hosted",
            ProviderKind::Hosted => "hosted",
        }
    }
}

impl From<&BackendConfig> for BackendDescriptor {
    fn from(config: &BackendConfig) -> Self {
        Self {
            name: config.name.clone(),
            provider: config.provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            cost_per_1k: config.cost_per_1k,
            latency_ms: config.latency_ms,
            quality: config.quality,
            region: config.region,
            endpoint: config.endpoint.clone(),
        }
    }
}
