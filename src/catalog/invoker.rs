//! Backend invocation adapters.
//!
//! # Responsibilities
//! - Shape the chat payload for each provider family
//! - Perform the HTTP call and classify the outcome
//! - Hand back either a decoded completion or the raw byte stream
//!
//! # Design Decisions
//! - Adapter chosen once per backend at catalog load, never per call
//! - Any non-2xx status is a failure (the breaker decides what to do)
//! - Streams are relayed opaquely; no token-level parsing

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::catalog::descriptor::{BackendDescriptor, ProviderKind};
use crate::routing::ChatMessage;

/// Errors produced by a single backend call.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),
}

/// Token accounting reported by the backend, when available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A fully received completion.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
    /// The untouched provider payload.
    pub raw: Value,
}

/// Byte stream relayed to the client as-is.
pub type ByteStream = BoxStream<'static, Result<Bytes, InvocationError>>;

/// What a successful backend call produced.
pub enum BackendReply {
    Complete(Completion),
    Stream(ByteStream),
}

impl fmt::Debug for BackendReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendReply::Complete(c) => f.debug_tuple("Complete").field(c).finish(),
            BackendReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The network capability the fallback executor drives.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        stream: bool,
    ) -> Result<BackendReply, InvocationError>;
}

/// Pick the adapter for a backend.
pub fn adapter_for(
    descriptor: &BackendDescriptor,
    api_key_env: Option<&str>,
    client: reqwest::Client,
    call_timeout: Duration,
) -> Arc<dyn BackendInvoker> {
    let base = descriptor.endpoint.trim_end_matches('/');
    match descriptor.provider {
        ProviderKind::Hosted => Arc::new(ChatCompletionsAdapter {
            client,
            url: format!("{}/v1/chat/completions", base),
            model: descriptor.model.clone(),
            api_key: ApiKey::from_env(api_key_env),
            call_timeout,
        }),
        ProviderKind::SelfHosted => Arc::new(OllamaAdapter {
            client,
            url: format!("{}/api/chat", base),
            model: descriptor.model.clone(),
            call_timeout,
        }),
    }
}

#[derive(Debug, Clone)]
enum ApiKey {
    None,
    Present(String),
    Missing(String),
}

impl ApiKey {
    fn from_env(var: Option<&str>) -> Self {
        match var {
            None => ApiKey::None,
            Some(var) => match std::env::var(var) {
                Ok(key) => ApiKey::Present(key),
                Err(_) => {
                    tracing::warn!(variable = %var, "API key variable not set; backend calls will fail");
                    ApiKey::Missing(var.to_string())
                }
            },
        }
    }
}

/// OpenAI-compatible `/v1/chat/completions` adapter for hosted backends.
pub struct ChatCompletionsAdapter {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: ApiKey,
    call_timeout: Duration,
}

#[async_trait]
impl BackendInvoker for ChatCompletionsAdapter {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        stream: bool,
    ) -> Result<BackendReply, InvocationError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "stream": stream,
        });

        let mut request = self.client.post(&self.url).json(&body);
        match &self.api_key {
            ApiKey::Present(key) => request = request.bearer_auth(key),
            ApiKey::Missing(var) => return Err(InvocationError::MissingApiKey(var.clone())),
            ApiKey::None => {}
        }

        let payload = match send(request, stream, self.call_timeout).await? {
            Sent::Stream(s) => return Ok(BackendReply::Stream(s)),
            Sent::Json(v) => v,
        };

        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| InvocationError::Decode("missing choices[0].message.content".into()))?
            .to_string();
        let usage = match (
            payload.pointer("/usage/prompt_tokens").and_then(Value::as_u64),
            payload.pointer("/usage/completion_tokens").and_then(Value::as_u64),
        ) {
            (Some(p), Some(c)) => Some(TokenUsage {
                prompt_tokens: p,
                completion_tokens: c,
            }),
            _ => None,
        };

        Ok(BackendReply::Complete(Completion {
            content,
            usage,
            raw: payload,
        }))
    }
}

/// Ollama `/api/chat` adapter for self-hosted backends.
pub struct OllamaAdapter {
    client: reqwest::Client,
    url: String,
    model: String,
    call_timeout: Duration,
}

#[async_trait]
impl BackendInvoker for OllamaAdapter {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        stream: bool,
    ) -> Result<BackendReply, InvocationError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
            "options": { "num_predict": max_tokens },
        });

        let payload = match send(self.client.post(&self.url).json(&body), stream, self.call_timeout).await? {
            Sent::Stream(s) => return Ok(BackendReply::Stream(s)),
            Sent::Json(v) => v,
        };

        let content = payload
            .pointer("/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| InvocationError::Decode("missing message.content".into()))?
            .to_string();
        let usage = match (
            payload.get("prompt_eval_count").and_then(Value::as_u64),
            payload.get("eval_count").and_then(Value::as_u64),
        ) {
            (Some(p), Some(c)) => Some(TokenUsage {
                prompt_tokens: p,
                completion_tokens: c,
            }),
            _ => None,
        };

        Ok(BackendReply::Complete(Completion {
            content,
            usage,
            raw: payload,
        }))
    }
}

enum Sent {
    Json(Value),
    Stream(ByteStream),
}

/// Send a prepared request and classify the response.
///
/// Streaming calls carry no overall deadline: only connection setup is
/// bounded, a long generation is not a failure.
async fn send(
    request: reqwest::RequestBuilder,
    stream: bool,
    call_timeout: Duration,
) -> Result<Sent, InvocationError> {
    let request = if stream { request } else { request.timeout(call_timeout) };
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InvocationError::Status {
            status: status.as_u16(),
            body: truncate(&body, 512),
        });
    }

    if stream {
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(InvocationError::from))
            .boxed();
        return Ok(Sent::Stream(bytes));
    }

    let payload = response
        .json::<Value>()
        .await
        .map_err(|e| InvocationError::Decode(e.to_string()))?;
    Ok(Sent::Json(payload))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
