//! Catalog fixtures for unit tests.

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::catalog::{
    BackendCatalog, BackendDescriptor, BackendInvoker, BackendReply, CatalogEntry, Completion,
    InvocationError, ProviderKind, QualityTier, Region,
};
use crate::routing::ChatMessage;

pub fn descriptor(
    name: &str,
    provider: ProviderKind,
    cost_per_1k: f64,
    quality: QualityTier,
) -> BackendDescriptor {
    BackendDescriptor {
        name: name.to_string(),
        provider,
        model: format!("{}-model", name.to_lowercase()),
        max_tokens: 8192,
        cost_per_1k,
        latency_ms: 1000,
        quality,
        region: Region::Global,
        endpoint: "http://127.0.0.1:9".to_string(),
    }
}

/// Invoker that answers with its own name, or fails on demand.
#[derive(Debug)]
pub struct MockInvoker {
    name: String,
    failing: AtomicBool,
    calls: AtomicU32,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockInvoker {
    pub fn ok(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failing: AtomicBool::new(false),
            calls: AtomicU32::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        let invoker = Self::ok(name);
        invoker.set_failing(true);
        invoker
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages received by the most recent call.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendInvoker for MockInvoker {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        _max_tokens: u32,
        stream: bool,
    ) -> Result<BackendReply, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        if self.failing.load(Ordering::SeqCst) {
            return Err(InvocationError::Status {
                status: 503,
                body: format!("{} unavailable", self.name),
            });
        }
        let content = format!("reply from {}", self.name);
        if stream {
            let chunk = Bytes::from(format!("data: {}\n\n", content));
            return Ok(BackendReply::Stream(stream::iter(vec![Ok::<_, InvocationError>(chunk)]).boxed()));
        }
        Ok(BackendReply::Complete(Completion {
            content,
            usage: None,
            raw: json!({ "backend": self.name, "messages": messages.len() }),
        }))
    }
}

pub fn catalog(descriptors: Vec<BackendDescriptor>) -> BackendCatalog {
    catalog_with(
        descriptors
            .into_iter()
            .map(|d| {
                let invoker = MockInvoker::ok(&d.name);
                (d, invoker)
            })
            .collect(),
    )
}

pub fn catalog_with(entries: Vec<(BackendDescriptor, Arc<MockInvoker>)>) -> BackendCatalog {
    BackendCatalog::new(
        entries
            .into_iter()
            .map(|(descriptor, invoker)| CatalogEntry {
                descriptor,
                invoker: invoker as Arc<dyn BackendInvoker>,
            })
            .collect(),
    )
}
