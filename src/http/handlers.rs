//! Endpoint handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::http::request::X_REQUEST_ID;
use crate::http::response::{chat_response, ApiError};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::pipeline::ChatRequest;
use crate::resilience::BreakerState;
use crate::retrieval::SearchMode;
use crate::routing::RoutingRequest;

fn finish(endpoint: &'static str, start: Instant, response: Response) -> Response {
    metrics::record_request(endpoint, response.status().as_u16(), start);
    response
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<ChatRequest>,
) -> Response {
    let start = Instant::now();
    request.request_id = headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let response = match state.pipeline.handle(request).await {
        Ok(outcome) => {
            tracing::info!(
                request_id = %outcome.request_id,
                served_by = %outcome.served_by.name,
                attempts = outcome.attempts.len(),
                context = outcome.context_passages,
                "Chat request served"
            );
            chat_response(outcome)
        }
        Err(e) => ApiError::from(e).into_response(),
    };
    finish("chat", start, response)
}

pub async fn route(State(state): State<AppState>, Json(request): Json<RoutingRequest>) -> Response {
    let start = Instant::now();
    let response = match state.pipeline.decide(&request) {
        Ok(decision) => Json(decision).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    };
    finish("route", start, response)
}

/// Body of `POST /rag/query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagQuery {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub search_type: SearchMode,
    #[serde(default)]
    pub threshold: Option<f64>,
}

pub async fn rag_query(State(state): State<AppState>, Json(query): Json<RagQuery>) -> Response {
    let start = Instant::now();
    let response = match state.pipeline.retriever() {
        None => ApiError::retrieval_disabled().into_response(),
        Some(_) if query.query.trim().is_empty() => {
            ApiError::bad_request("query must not be empty").into_response()
        }
        Some(source) => {
            let result = source
                .retriever
                .search(
                    query.query.trim(),
                    query.limit.unwrap_or(source.limit),
                    query.threshold.unwrap_or(source.threshold),
                    query.search_type,
                )
                .await;
            Json(result).into_response()
        }
    };
    finish("rag_query", start, response)
}

pub async fn models(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let catalog = state.pipeline.catalog();
    let backends: Vec<_> = catalog.descriptors().cloned().collect();
    finish("models", start, Json(json!({ "backends": backends })).into_response())
}

pub async fn health(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let breakers = state.pipeline.breakers().snapshot();
    let status = if breakers.iter().any(|b| b.state == BreakerState::Open) {
        "degraded"
    } else {
        "ok"
    };
    let body = json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
        "backends": state.pipeline.catalog().len(),
        "retrieval": state.pipeline.retriever().is_some(),
        "breakers": breakers,
    });
    finish("health", start, Json(body).into_response())
}
