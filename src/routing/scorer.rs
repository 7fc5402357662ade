//! Backend selection scoring.
//!
//! # Responsibilities
//! - Drop backends violating hard constraints (region, token budget)
//! - Narrow to self-hosted backends when locality is preferred
//! - Score the rest on locality, quality, cost and latency
//! - Produce a RoutingDecision with cost estimate and justification
//!
//! # Design Decisions
//! - Cost cap is a penalty, not a filter: over-cap backends still win
//!   when nothing else is left
//! - Ties go to the backend listed first in the catalog
//! - Explicit backend override skips scoring but not the hard constraints

use crate::catalog::{BackendCatalog, BackendDescriptor, Region};
use crate::config::RoutingConfig;
use crate::routing::error::{RoutingError, RoutingResult};
use crate::routing::types::{QualityPreference, RoutingDecision, RoutingRequest};

/// Latency terms are computed against this floor so one very fast backend
/// cannot dominate the score.
const LATENCY_FLOOR_MS: u64 = 50;
const LATENCY_SCALE: f64 = 5_000.0;

/// Hard-constraint check shared by the scorer and the fallback executor.
pub fn satisfies_constraints(request: &RoutingRequest, backend: &BackendDescriptor) -> bool {
    let region_ok = match request.region {
        None | Some(Region::Global) => true,
        Some(region) => backend.region == region,
    };
    let budget_ok = request
        .max_tokens
        .map(|wanted| backend.max_tokens >= wanted)
        .unwrap_or(true);
    region_ok && budget_ok
}

/// Per-term contribution to a backend's score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub locality: f64,
    pub quality: f64,
    pub cost: f64,
    pub latency: f64,
    pub penalty: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.locality + self.quality + self.cost + self.latency - self.penalty
    }

    /// Which of quality/cost/latency contributed most.
    pub fn driver(&self) -> &'static str {
        if self.quality >= self.cost && self.quality >= self.latency {
            "quality"
        } else if self.cost >= self.latency {
            "cost"
        } else {
            "latency"
        }
    }
}

/// Ranks catalog backends for a request.
#[derive(Debug, Clone)]
pub struct SelectionScorer {
    default_max_tokens: u32,
    self_hosted_bonus: f64,
    cost_cap_penalty: f64,
}

impl Default for SelectionScorer {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl SelectionScorer {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            default_max_tokens: config.default_max_tokens,
            self_hosted_bonus: config.self_hosted_bonus,
            cost_cap_penalty: config.cost_cap_penalty,
        }
    }

    /// Output tokens the backend will be asked for.
    pub fn max_output_tokens(&self, request: &RoutingRequest) -> u32 {
        request.max_tokens.unwrap_or(self.default_max_tokens)
    }

    /// Rough token count: four characters per prompt token plus the output limit.
    pub fn estimate_tokens(&self, request: &RoutingRequest) -> u32 {
        let chars: usize = request.messages.iter().map(|m| m.content.chars().count()).sum();
        let prompt = u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX);
        prompt.saturating_add(self.max_output_tokens(request))
    }

    /// Score one backend.
    pub fn score(
        &self,
        request: &RoutingRequest,
        backend: &BackendDescriptor,
        tokens: u32,
    ) -> ScoreBreakdown {
        let quality = backend.quality.weight();
        let cheapness = 100.0 / (1.0 + backend.cost_per_1k * 1000.0);
        let (quality_w, cost_w) = match request.quality {
            QualityPreference::Max => (3.0, 0.1),
            QualityPreference::CostOptimized => (0.2, 3.0),
            QualityPreference::Auto => (1.0, 0.5),
        };

        let penalty = match request.max_cost {
            Some(cap) if backend.estimate_cost(tokens) > cap => self.cost_cap_penalty,
            _ => 0.0,
        };

        ScoreBreakdown {
            locality: if backend.is_self_hosted() { self.self_hosted_bonus } else { 0.0 },
            quality: quality * quality_w,
            cost: cheapness * cost_w,
            latency: LATENCY_SCALE / backend.latency_ms.max(LATENCY_FLOOR_MS) as f64,
            penalty,
        }
    }

    /// Pick a backend for `request`.
    pub fn decide(
        &self,
        request: &RoutingRequest,
        catalog: &BackendCatalog,
    ) -> RoutingResult<RoutingDecision> {
        let tokens = self.estimate_tokens(request);

        if let Some(name) = &request.backend {
            let entry = catalog.get(name).ok_or_else(|| RoutingError::NoEligibleBackend {
                reason: format!("requested backend '{}' is not in the catalog", name),
            })?;
            if !satisfies_constraints(request, &entry.descriptor) {
                return Err(RoutingError::NoEligibleBackend {
                    reason: format!(
                        "requested backend '{}' violates the region or token budget constraint",
                        name
                    ),
                });
            }
            let justification = format!(
                "Selected {} ({}, {}): explicitly requested",
                name,
                entry.descriptor.model,
                entry.descriptor.locality()
            );
            return Ok(self.decision(request, &entry.descriptor, tokens, justification));
        }

        let mut candidates: Vec<&BackendDescriptor> = catalog
            .descriptors()
            .filter(|d| satisfies_constraints(request, d))
            .collect();
        if candidates.is_empty() {
            return Err(RoutingError::NoEligibleBackend {
                reason: constraint_summary(request, catalog.len()),
            });
        }

        let narrowed = request.prefer_local && candidates.iter().any(|d| d.is_self_hosted());
        if narrowed {
            candidates.retain(|d| d.is_self_hosted());
        }

        let mut best: Option<(&BackendDescriptor, ScoreBreakdown)> = None;
        for candidate in candidates {
            let score = self.score(request, candidate, tokens);
            tracing::trace!(backend = %candidate.name, score = score.total(), "Scored backend");
            let better = match &best {
                Some((_, top)) => score.total() > top.total(),
                None => true,
            };
            if better {
                best = Some((candidate, score));
            }
        }

        let Some((winner, score)) = best else {
            return Err(RoutingError::NoEligibleBackend {
                reason: constraint_summary(request, catalog.len()),
            });
        };

        let mut justification = format!(
            "Selected {} ({}, {}): {}-driven, score {:.1}",
            winner.name,
            winner.model,
            winner.locality(),
            score.driver(),
            score.total()
        );
        if narrowed {
            justification.push_str("; local backends preferred");
        }
        if score.penalty > 0.0 {
            justification.push_str("; exceeds cost cap");
        }

        Ok(self.decision(request, winner, tokens, justification))
    }

    fn decision(
        &self,
        request: &RoutingRequest,
        backend: &BackendDescriptor,
        tokens: u32,
        justification: String,
    ) -> RoutingDecision {
        RoutingDecision {
            backend: backend.clone(),
            justification,
            estimated_cost: backend.estimate_cost(tokens),
            estimated_latency_ms: backend.latency_ms,
            estimated_tokens: tokens,
            max_output_tokens: self.max_output_tokens(request),
        }
    }
}

fn constraint_summary(request: &RoutingRequest, catalog_size: usize) -> String {
    let region = request
        .region
        .map(|r| r.to_string())
        .unwrap_or_else(|| "any".to_string());
    let budget = request
        .max_tokens
        .map(|t| t.to_string())
        .unwrap_or_else(|| "any".to_string());
    format!(
        "none of {} backends match region={} max_tokens={}",
        catalog_size, region, budget
    )
}
