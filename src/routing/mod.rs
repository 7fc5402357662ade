//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RoutingRequest (messages, quality, caps, region, locality)
//!     → scorer.rs (filter → narrow → score → RoutingDecision)
//!     → executor.rs (fallback chain through per-backend breakers)
//!     → Execution (reply + backend that served it) or RoutingError
//! ```
//!
//! # Design Decisions
//! - One scorer for every caller (HTTP dry-run and chat pipeline)
//! - Deterministic: same request and catalog always pick the same backend
//! - Only "no eligible backend" and "all backends failed" leave this module

pub mod error;
pub mod executor;
pub mod scorer;
pub mod types;

pub use error::{AttemptError, RoutingError, RoutingResult};
pub use executor::{AttemptOutcome, AttemptRecord, Execution, FallbackExecutor};
pub use scorer::{satisfies_constraints, ScoreBreakdown, SelectionScorer};
pub use types::{ChatMessage, QualityPreference, Role, RoutingDecision, RoutingRequest};
