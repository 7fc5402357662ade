//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::catalog::{ProviderKind, QualityTier, Region};

/// Root configuration for the model gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Backend catalog: every model endpoint the gateway may route to.
    pub backends: Vec<BackendConfig>,

    /// Per-backend circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Selection scorer tuning.
    pub routing: RoutingConfig,

    /// Hybrid retrieval settings.
    pub retrieval: RetrievalConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// A single backend in the catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// Hosted commercial API or self-hosted model server.
    pub provider: ProviderKind,

    /// Model identifier sent to the backend.
    pub model: String,

    /// Maximum input + output token budget.
    pub max_tokens: u32,

    /// Cost in USD per 1000 tokens.
    pub cost_per_1k: f64,

    /// Nominal latency in milliseconds.
    pub latency_ms: u64,

    /// Quality tier.
    pub quality: QualityTier,

    /// Region the backend serves from.
    #[serde(default)]
    pub region: Region,

    /// Base URL of the backend (e.g., "http://127.0.0.1:11434").
    pub endpoint: String,

    /// Name of the environment variable holding the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,

    /// Seconds an open breaker waits before admitting a probe.
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Selection scorer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Output tokens assumed when a request does not set max_tokens.
    pub default_max_tokens: u32,

    /// Score bonus for self-hosted backends.
    pub self_hosted_bonus: f64,

    /// Score penalty for backends whose estimate exceeds the request cost cap.
    pub cost_cap_penalty: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: 1000,
            self_hosted_bonus: 1000.0,
            cost_cap_penalty: 10_000.0,
        }
    }
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Enable context retrieval for chat requests.
    pub enabled: bool,

    /// Base URL of the document store (PostgREST style).
    pub store_url: String,

    /// Name of the environment variable holding the store API key.
    pub api_key_env: Option<String>,

    /// RPC function performing vector nearest-neighbour search.
    pub vector_function: String,

    /// RPC function performing lexical ranked search.
    pub text_function: String,

    /// Passages retrieved per chat request.
    pub default_limit: usize,

    /// Maximum vector distance accepted.
    pub similarity_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store_url: "http://localhost:54321".to_string(),
            api_key_env: None,
            vector_function: "match_documents".to_string(),
            text_function: "search_documents".to_string(),
            default_limit: 5,
            similarity_threshold: 0.78,
        }
    }
}

/// Timeout configuration for backend and store calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per backend call timeout in seconds.
    pub backend_secs: u64,

    /// Overall inbound request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            backend_secs: 60,
            request_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Buffered telemetry events before new events are dropped.
    pub telemetry_capacity: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            telemetry_capacity: 1024,
        }
    }
}
