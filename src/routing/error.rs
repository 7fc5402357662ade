//! Routing errors.

use thiserror::Error;

use crate::catalog::InvocationError;
use crate::resilience::BreakerError;
use crate::routing::executor::AttemptRecord;

/// Failure of a single attempt against one backend.
pub type AttemptError = BreakerError<InvocationError>;

/// Errors that reach the request boundary.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Hard constraints filtered out every backend. Not retried.
    #[error("no eligible backend: {reason}")]
    NoEligibleBackend { reason: String },

    /// Every backend in the fallback chain failed.
    #[error("all backends failed (tried {}): {last_error}", backend_names(.attempts))]
    AllBackendsFailed {
        attempts: Vec<AttemptRecord>,
        #[source]
        last_error: AttemptError,
    },
}

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

impl RoutingError {
    /// Attempts made before the error, in order. Empty when nothing was tried.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            RoutingError::NoEligibleBackend { .. } => &[],
            RoutingError::AllBackendsFailed { attempts, .. } => attempts,
        }
    }
}

fn backend_names(attempts: &[AttemptRecord]) -> String {
    attempts
        .iter()
        .map(|a| a.backend.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
