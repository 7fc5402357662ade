//! Fallback execution.
//!
//! # Responsibilities
//! - Build the fallback chain: primary first, then self-hosted, then hosted
//! - Run each attempt through the backend's circuit breaker
//! - Stop at the first success and report which backend served it
//! - Aggregate failure once the chain is exhausted
//!
//! # Design Decisions
//! - Strictly sequential: no speculative parallel calls
//! - Alternates must pass the same hard constraints as the primary
//! - Breaker-open and call failures are both recovered locally

use serde::Serialize;
use std::sync::Arc;

use crate::catalog::{BackendCatalog, BackendDescriptor, BackendReply, CatalogEntry};
use crate::observability::metrics;
use crate::resilience::{BreakerError, BreakerRegistry};
use crate::routing::error::{AttemptError, RoutingError, RoutingResult};
use crate::routing::scorer::satisfies_constraints;
use crate::routing::types::{RoutingDecision, RoutingRequest};

/// How one attempt in the chain ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    BreakerOpen,
    Failed(String),
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::BreakerOpen => "breaker_open",
            AttemptOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub backend: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// A successful execution.
#[derive(Debug)]
pub struct Execution {
    pub reply: BackendReply,
    /// The backend that actually produced the reply.
    pub served_by: BackendDescriptor,
    pub attempts: Vec<AttemptRecord>,
}

/// Drives the fallback chain for one request.
#[derive(Debug, Clone)]
pub struct FallbackExecutor {
    breakers: Arc<BreakerRegistry>,
}

impl FallbackExecutor {
    pub fn new(breakers: Arc<BreakerRegistry>) -> Self {
        Self { breakers }
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Primary backend, then every other eligible backend with self-hosted
    /// ahead of hosted (catalog order within each group).
    pub fn execution_order<'a>(
        &self,
        request: &RoutingRequest,
        decision: &RoutingDecision,
        catalog: &'a BackendCatalog,
    ) -> Vec<&'a CatalogEntry> {
        let primary = decision.backend.name.as_str();
        let mut order: Vec<&CatalogEntry> = Vec::with_capacity(catalog.len());
        if let Some(entry) = catalog.get(primary) {
            order.push(entry);
        } else {
            tracing::warn!(backend = %primary, "Primary backend no longer in catalog");
        }

        let alternates = catalog
            .entries()
            .iter()
            .filter(|e| e.descriptor.name != primary)
            .filter(|e| satisfies_constraints(request, &e.descriptor));
        let (local, hosted): (Vec<_>, Vec<_>) =
            alternates.partition(|e| e.descriptor.is_self_hosted());
        order.extend(local);
        order.extend(hosted);
        order
    }

    /// Execute `request` starting with the decision's backend.
    pub async fn execute(
        &self,
        request: &RoutingRequest,
        decision: &RoutingDecision,
        catalog: &BackendCatalog,
        stream: bool,
    ) -> RoutingResult<Execution> {
        let order = self.execution_order(request, decision, catalog);
        let mut attempts = Vec::with_capacity(order.len());
        let mut last_error: Option<AttemptError> = None;

        for entry in order {
            let name = entry.descriptor.name.as_str();
            let breaker = self.breakers.breaker(name);
            let invoker = entry.invoker.clone();
            let messages = request.messages.as_slice();
            let max_tokens = decision.max_output_tokens.min(entry.descriptor.max_tokens);

            let result = breaker
                .attempt(move || async move { invoker.invoke(messages, max_tokens, stream).await })
                .await;

            match result {
                Ok(reply) => {
                    metrics::record_attempt(name, AttemptOutcome::Success.label());
                    attempts.push(AttemptRecord {
                        backend: name.to_string(),
                        outcome: AttemptOutcome::Success,
                    });
                    if name != decision.backend.name {
                        tracing::info!(
                            primary = %decision.backend.name,
                            served_by = %name,
                            attempts = attempts.len(),
                            "Request served by fallback backend"
                        );
                    }
                    return Ok(Execution {
                        reply,
                        served_by: entry.descriptor.clone(),
                        attempts,
                    });
                }
                Err(err) => {
                    let outcome = match &err {
                        BreakerError::Open(_) => AttemptOutcome::BreakerOpen,
                        BreakerError::Inner(e) => AttemptOutcome::Failed(e.to_string()),
                    };
                    tracing::warn!(backend = %name, error = %err, "Backend attempt failed, trying next");
                    metrics::record_attempt(name, outcome.label());
                    attempts.push(AttemptRecord {
                        backend: name.to_string(),
                        outcome,
                    });
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last_error) => {
                let err = RoutingError::AllBackendsFailed {
                    attempts,
                    last_error,
                };
                tracing::error!(error = %err, "All backends failed");
                Err(err)
            }
            None => Err(RoutingError::NoEligibleBackend {
                reason: "fallback chain is empty".to_string(),
            }),
        }
    }
}
