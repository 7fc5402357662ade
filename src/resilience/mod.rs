//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → registry.rs (look up or create the backend's breaker)
//!     → circuit_breaker.rs (admit, run call, record outcome)
//!     → Open breaker: fail fast, executor moves to next backend
//! ```
//!
//! # Design Decisions
//! - One breaker per backend, never shared between backends
//! - No delayed retries: recovery is falling back to an alternate backend
//! - Timeouts live at the network layer (invocation adapters)

pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{
    BreakerError, BreakerSnapshot, BreakerState, CircuitBreaker, CircuitBreakerConfig,
};
pub use registry::BreakerRegistry;
