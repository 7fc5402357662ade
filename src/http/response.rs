//! Response shaping and error mapping.
//!
//! # Responsibilities
//! - Turn a `ChatOutcome` into JSON or a relayed event stream
//! - Map terminal errors to status codes with a `{error, detail}` body
//!
//! # Design Decisions
//! - No eligible backend is the caller's problem (422); every backend
//!   failing is an upstream problem (502)
//! - Streams are relayed byte for byte; nothing is buffered

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::catalog::{BackendReply, TokenUsage};
use crate::http::request::X_SERVED_BY;
use crate::pipeline::ChatOutcome;
use crate::routing::{AttemptRecord, RoutingError};

/// Error returned at the HTTP boundary.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "bad_request",
            detail: detail.into(),
        }
    }

    pub fn retrieval_disabled() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: "retrieval_disabled",
            detail: "retrieval is not enabled on this gateway".to_string(),
        }
    }
}

impl From<RoutingError> for ApiError {
    fn from(err: RoutingError) -> Self {
        let (status, error) = match &err {
            RoutingError::NoEligibleBackend { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "no_eligible_backend")
            }
            RoutingError::AllBackendsFailed { .. } => (StatusCode::BAD_GATEWAY, "all_backends_failed"),
        };
        Self {
            status,
            error,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.error,
            "detail": self.detail,
        }));
        (self.status, body).into_response()
    }
}

/// JSON body of a non-streaming `/chat` response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub content: String,
    pub served_by: String,
    pub model: String,
    pub primary: String,
    pub justification: String,
    pub estimated_cost: f64,
    pub estimated_latency_ms: u64,
    pub context_passages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub attempts: Vec<AttemptRecord>,
}

pub fn chat_response(outcome: ChatOutcome) -> Response {
    let served_by = HeaderValue::from_str(&outcome.served_by.name).ok();

    let mut response = match outcome.reply {
        BackendReply::Complete(completion) => Json(ChatResponse {
            id: outcome.request_id,
            content: completion.content,
            served_by: outcome.served_by.name.clone(),
            model: outcome.served_by.model.clone(),
            primary: outcome.decision.backend.name.clone(),
            justification: outcome.decision.justification,
            estimated_cost: outcome.decision.estimated_cost,
            estimated_latency_ms: outcome.decision.estimated_latency_ms,
            context_passages: outcome.context_passages,
            usage: completion.usage,
            attempts: outcome.attempts,
        })
        .into_response(),
        BackendReply::Stream(stream) => {
            let mut response = Body::from_stream(stream).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response
        }
    };

    if let Some(value) = served_by {
        response.headers_mut().insert(X_SERVED_BY, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::AttemptError;
    use crate::resilience::BreakerError;

    #[test]
    fn test_routing_errors_map_to_status() {
        let none = ApiError::from(RoutingError::NoEligibleBackend {
            reason: "region eu".into(),
        });
        assert_eq!(none.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(none.error, "no_eligible_backend");

        let last_error: AttemptError = BreakerError::Open("A".into());
        let failed = ApiError::from(RoutingError::AllBackendsFailed {
            attempts: Vec::new(),
            last_error,
        });
        assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
        assert!(failed.detail.contains("all backends failed"));
    }
}
