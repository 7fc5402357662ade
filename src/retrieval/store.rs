//! Document store access.
//!
//! # Responsibilities
//! - Define the two read operations the engine composes
//! - Call PostgREST-style RPC functions for vector and lexical search
//!
//! # Design Decisions
//! - Embeddings are the store's business; the gateway sends query text
//! - No connection or transaction management here (HTTP only)

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::{RetrievalConfig, TimeoutConfig};
use crate::retrieval::types::StoreHit;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Read side of the document store.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// Nearest neighbours of the query, ascending by distance.
    async fn vector_search(&self, query: &str, limit: usize) -> Result<Vec<StoreHit>, StoreError>;

    /// Lexical matches, descending by rank.
    async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<StoreHit>, StoreError>;
}

/// Store reached through `POST {store_url}/rest/v1/rpc/{function}`.
#[derive(Debug, Clone)]
pub struct RpcStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    vector_function: String,
    text_function: String,
}

impl RpcStore {
    pub fn from_config(
        config: &RetrievalConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.backend_secs))
            .build()?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        if config.api_key_env.is_some() && api_key.is_none() {
            tracing::warn!("Retrieval store API key variable not set; requests go unauthenticated");
        }

        Ok(Self {
            client,
            base_url: config.store_url.trim_end_matches('/').to_string(),
            api_key,
            vector_function: config.vector_function.clone(),
            text_function: config.text_function.clone(),
        })
    }

    async fn call(&self, function: &str, query: &str, limit: usize) -> Result<Vec<StoreHit>, StoreError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        let mut request = self.client.post(url).json(&json!({
            "query_text": query,
            "match_count": limit,
        }));
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Vec<StoreHit>>().await?)
    }
}

#[async_trait]
impl RetrievalStore for RpcStore {
    async fn vector_search(&self, query: &str, limit: usize) -> Result<Vec<StoreHit>, StoreError> {
        self.call(&self.vector_function, query, limit).await
    }

    async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<StoreHit>, StoreError> {
        self.call(&self.text_function, query, limit).await
    }
}
