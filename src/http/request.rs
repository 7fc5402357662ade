//! Request identification.
//!
//! # Responsibilities
//! - Name the correlation header shared by every response
//! - Build the per-request tracing span around that id
//!
//! # Design Decisions
//! - The id is assigned as early as possible (outermost layer) so the
//!   trace span and every log line inside it carry it
//! - A caller-supplied `x-request-id` is kept, not replaced

use axum::http::{HeaderMap, HeaderName, Request};
use tracing::Span;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_SERVED_BY: HeaderName = HeaderName::from_static("x-served-by");

/// The request id header value, or `"unknown"` when absent.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span for the trace layer.
pub fn make_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request.headers()),
    )
}
