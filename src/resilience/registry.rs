//! Per-backend breaker registry.
//!
//! # Responsibilities
//! - Own one circuit breaker per backend name
//! - Create breakers lazily on first use
//! - Expose read-only snapshots for health reporting
//!
//! # Design Decisions
//! - Keyed by backend name so state survives catalog reloads
//! - Injected into the executor; tests build a fresh registry each time

use dashmap::DashMap;
use std::sync::Arc;

use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};

#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Breaker for `backend`, created on first use.
    pub fn breaker(&self, backend: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(backend) {
            return existing.value().clone();
        }
        self.breakers
            .entry(backend.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(backend, self.config)))
            .value()
            .clone()
    }

    /// Snapshot of one backend, if it has been used.
    pub fn peek(&self, backend: &str) -> Option<BreakerSnapshot> {
        self.breakers.get(backend).map(|b| b.value().snapshot())
    }

    /// Snapshots of every known breaker, sorted by backend name.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<_> = self.breakers.iter().map(|b| b.value().snapshot()).collect();
        all.sort_by(|a, b| a.backend.cmp(&b.backend));
        all
    }
}
