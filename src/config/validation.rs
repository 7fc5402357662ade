//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject an empty catalog at startup instead of per request
//! - Validate value ranges (costs, latencies, thresholds)
//! - Detect duplicate backend names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("backend catalog is empty")]
    EmptyCatalog,

    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),

    #[error("backend '{name}': invalid endpoint '{endpoint}'")]
    InvalidEndpoint { name: String, endpoint: String },

    #[error("backend '{name}': {field} must be positive")]
    NonPositive { name: String, field: &'static str },

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("breaker failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("breaker cooldown_secs must be at least 1")]
    ZeroCooldown,

    #[error("retrieval store_url '{0}' is not a valid URL")]
    InvalidStoreUrl(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::EmptyCatalog);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }

        let endpoint_ok = Url::parse(&backend.endpoint)
            .map(|u| u.scheme() == "http" || u.scheme() == "https")
            .unwrap_or(false);
        if !endpoint_ok {
            errors.push(ValidationError::InvalidEndpoint {
                name: backend.name.clone(),
                endpoint: backend.endpoint.clone(),
            });
        }

        if backend.max_tokens == 0 {
            errors.push(ValidationError::NonPositive {
                name: backend.name.clone(),
                field: "max_tokens",
            });
        }
        if backend.cost_per_1k.is_nan() || backend.cost_per_1k <= 0.0 {
            errors.push(ValidationError::NonPositive {
                name: backend.name.clone(),
                field: "cost_per_1k",
            });
        }
        if backend.latency_ms == 0 {
            errors.push(ValidationError::NonPositive {
                name: backend.name.clone(),
                field: "latency_ms",
            });
        }
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.breaker.cooldown_secs == 0 {
        errors.push(ValidationError::ZeroCooldown);
    }

    if config.retrieval.enabled && Url::parse(&config.retrieval.store_url).is_err() {
        errors.push(ValidationError::InvalidStoreUrl(
            config.retrieval.store_url.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
