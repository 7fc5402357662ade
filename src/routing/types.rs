//! Routing request/decision types.

use serde::{Deserialize, Serialize};

use crate::catalog::{BackendDescriptor, Region};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// What the caller wants optimised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreference {
    #[default]
    Auto,
    Max,
    CostOptimized,
}

/// A chat request as seen by the router.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub quality: QualityPreference,

    /// Maximum output tokens.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Hard cost cap in USD for this request.
    #[serde(default)]
    pub max_cost: Option<f64>,

    /// Restrict to backends in this region.
    #[serde(default)]
    pub region: Option<Region>,

    /// Prefer self-hosted backends.
    #[serde(default)]
    pub prefer_local: bool,

    /// Explicit backend override (bypasses scoring).
    #[serde(default)]
    pub backend: Option<String>,
}

/// The router's choice for one request.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub backend: BackendDescriptor,
    pub justification: String,
    pub estimated_cost: f64,
    pub estimated_latency_ms: u64,
    /// Prompt + output tokens the estimate is based on.
    pub estimated_tokens: u32,
    /// Output token limit passed to the backend.
    pub max_output_tokens: u32,
}
