//! Chat request orchestration.
//!
//! # Responsibilities
//! - Retrieve context for the last user message
//! - Augment the prompt, score, execute with fallback
//! - Emit one telemetry event per request, success or failure
//!
//! # Design Decisions
//! - The catalog is read once per request; a reload mid-request does not
//!   change the backends this request sees
//! - Retrieval never fails a request

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::{BackendCatalog, BackendDescriptor, BackendReply};
use crate::config::RetrievalConfig;
use crate::observability::telemetry::{TelemetryEvent, TelemetrySink};
use crate::pipeline::augment::{augment, last_user_query};
use crate::resilience::BreakerRegistry;
use crate::retrieval::{HybridRetriever, RetrievalCandidate, SearchMode};
use crate::routing::{
    AttemptRecord, FallbackExecutor, RoutingDecision, RoutingRequest, RoutingResult,
    SelectionScorer,
};

fn default_true() -> bool {
    true
}

/// Inbound chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(flatten)]
    pub routing: RoutingRequest,

    /// Relay the backend's byte stream instead of a JSON completion.
    #[serde(default)]
    pub stream: bool,

    /// Set to false to skip retrieval for this request.
    #[serde(default = "default_true")]
    pub use_context: bool,

    /// Overrides `retrieval.default_limit`.
    #[serde(default)]
    pub context_limit: Option<usize>,

    /// Correlation id assigned at the edge; a fresh one is made when absent.
    #[serde(skip)]
    pub request_id: Option<String>,
}

impl From<RoutingRequest> for ChatRequest {
    fn from(routing: RoutingRequest) -> Self {
        Self {
            routing,
            stream: false,
            use_context: true,
            context_limit: None,
            request_id: None,
        }
    }
}

/// A served chat request.
#[derive(Debug)]
pub struct ChatOutcome {
    pub request_id: String,
    pub reply: BackendReply,
    /// Backend that produced `reply`; not necessarily the decision's.
    pub served_by: BackendDescriptor,
    pub decision: RoutingDecision,
    pub attempts: Vec<AttemptRecord>,
    pub context_passages: usize,
}

/// Retrieval wiring for the pipeline.
#[derive(Debug, Clone)]
pub struct ContextSource {
    pub retriever: HybridRetriever,
    pub limit: usize,
    pub threshold: f64,
}

impl ContextSource {
    pub fn new(retriever: HybridRetriever, config: &RetrievalConfig) -> Self {
        Self {
            retriever,
            limit: config.default_limit,
            threshold: config.similarity_threshold,
        }
    }
}

/// The request path: retrieve → augment → decide → execute → telemetry.
pub struct ChatPipeline {
    catalog: ArcSwap<BackendCatalog>,
    scorer: SelectionScorer,
    executor: FallbackExecutor,
    context: Option<ContextSource>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ChatPipeline {
    pub fn new(
        catalog: BackendCatalog,
        scorer: SelectionScorer,
        breakers: Arc<BreakerRegistry>,
        context: Option<ContextSource>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            catalog: ArcSwap::from_pointee(catalog),
            scorer,
            executor: FallbackExecutor::new(breakers),
            context,
            telemetry,
        }
    }

    /// Current catalog snapshot.
    pub fn catalog(&self) -> Arc<BackendCatalog> {
        self.catalog.load_full()
    }

    /// Swap in a new catalog. Requests already running keep the old one.
    pub fn replace_catalog(&self, catalog: BackendCatalog) {
        tracing::info!(backends = catalog.len(), "Backend catalog replaced");
        self.catalog.store(Arc::new(catalog));
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        self.executor.breakers()
    }

    pub fn retriever(&self) -> Option<&ContextSource> {
        self.context.as_ref()
    }

    /// Score without invoking anything.
    pub fn decide(&self, request: &RoutingRequest) -> RoutingResult<RoutingDecision> {
        self.scorer.decide(request, &self.catalog.load())
    }

    pub async fn handle(&self, request: ChatRequest) -> RoutingResult<ChatOutcome> {
        let request_id = request
            .request_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let catalog = self.catalog.load_full();

        let mut routing = request.routing;
        let passages = if request.use_context {
            self.context_for(&routing, request.context_limit).await
        } else {
            Vec::new()
        };
        let context_passages = passages.len();
        routing.messages = augment(std::mem::take(&mut routing.messages), &passages);

        let mut event = TelemetryEvent {
            request_id: request_id.clone(),
            primary: None,
            served_by: None,
            justification: None,
            estimated_cost: None,
            estimated_latency_ms: None,
            context_passages,
            attempts: Vec::new(),
            error: None,
        };

        let decision = match self.scorer.decide(&routing, &catalog) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "No backend can serve request");
                event.error = Some(e.to_string());
                self.telemetry.emit(event);
                return Err(e);
            }
        };
        tracing::debug!(
            request_id = %request_id,
            backend = %decision.backend.name,
            justification = %decision.justification,
            "Routing decision"
        );
        event.primary = Some(decision.backend.name.clone());
        event.justification = Some(decision.justification.clone());
        event.estimated_cost = Some(decision.estimated_cost);
        event.estimated_latency_ms = Some(decision.estimated_latency_ms);

        match self
            .executor
            .execute(&routing, &decision, &catalog, request.stream)
            .await
        {
            Ok(execution) => {
                event.served_by = Some(execution.served_by.name.clone());
                event.attempts = execution.attempts.clone();
                self.telemetry.emit(event);
                Ok(ChatOutcome {
                    request_id,
                    reply: execution.reply,
                    served_by: execution.served_by,
                    decision,
                    attempts: execution.attempts,
                    context_passages,
                })
            }
            Err(e) => {
                event.attempts = e.attempts().to_vec();
                event.error = Some(e.to_string());
                self.telemetry.emit(event);
                Err(e)
            }
        }
    }

    async fn context_for(
        &self,
        request: &RoutingRequest,
        limit: Option<usize>,
    ) -> Vec<RetrievalCandidate> {
        let (Some(source), Some(query)) = (&self.context, last_user_query(&request.messages)) else {
            return Vec::new();
        };
        source
            .retriever
            .search(query, limit.unwrap_or(source.limit), source.threshold, SearchMode::Hybrid)
            .await
            .results
    }
}

impl std::fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("backends", &self.catalog.load().len())
            .field("retrieval", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{catalog_with, descriptor, MockInvoker};
    use crate::catalog::{ProviderKind, QualityTier, Region};
    use crate::resilience::CircuitBreakerConfig;
    use crate::retrieval::{RetrievalStore, StoreError, StoreHit};
    use crate::routing::{ChatMessage, Role, RoutingError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TelemetryEvent>>,
    }

    impl TelemetrySink for RecordingSink {
        fn emit(&self, event: TelemetryEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct OnePassage;

    #[async_trait]
    impl RetrievalStore for OnePassage {
        async fn vector_search(&self, query: &str, _limit: usize) -> Result<Vec<StoreHit>, StoreError> {
            Ok(vec![StoreHit {
                id: "doc".into(),
                content: format!("notes about {query}"),
                metadata: None,
                score: 0.2,
            }])
        }

        async fn text_search(&self, _query: &str, _limit: usize) -> Result<Vec<StoreHit>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn pipeline(
        catalog: BackendCatalog,
        context: Option<ContextSource>,
    ) -> (ChatPipeline, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let breakers = Arc::new(BreakerRegistry::new(CircuitBreakerConfig::default()));
        let pipeline = ChatPipeline::new(
            catalog,
            SelectionScorer::default(),
            breakers,
            context,
            sink.clone(),
        );
        (pipeline, sink)
    }

    fn chat(text: &str) -> ChatRequest {
        ChatRequest::from(RoutingRequest {
            messages: vec![ChatMessage::new(Role::User, text)],
            prefer_local: true,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_handle_reports_fallback_backend() {
        let cat = catalog_with(vec![
            (descriptor("A", ProviderKind::SelfHosted, 0.0001, QualityTier::High), MockInvoker::failing("A")),
            (descriptor("B", ProviderKind::Hosted, 0.005, QualityTier::High), MockInvoker::ok("B")),
        ]);
        let (pipeline, sink) = pipeline(cat, None);

        let outcome = pipeline.handle(chat("hello")).await.unwrap();
        assert_eq!(outcome.decision.backend.name, "A");
        assert_eq!(outcome.served_by.name, "B");
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.context_passages, 0);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id, outcome.request_id);
        assert_eq!(events[0].primary.as_deref(), Some("A"));
        assert_eq!(events[0].served_by.as_deref(), Some("B"));
        assert!(events[0].succeeded());
    }

    #[tokio::test]
    async fn test_edge_request_id_is_kept() {
        let cat = catalog_with(vec![(
            descriptor("A", ProviderKind::SelfHosted, 0.0001, QualityTier::High),
            MockInvoker::ok("A"),
        )]);
        let (pipeline, sink) = pipeline(cat, None);

        let mut request = chat("hello");
        request.request_id = Some("edge-42".into());
        let outcome = pipeline.handle(request).await.unwrap();
        assert_eq!(outcome.request_id, "edge-42");

        let unlabelled = pipeline.handle(chat("hello")).await.unwrap();
        assert!(Uuid::parse_str(&unlabelled.request_id).is_ok());

        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].request_id, "edge-42");
        assert_eq!(events[1].request_id, unlabelled.request_id);
    }

    #[tokio::test]
    async fn test_context_is_prepended_unless_opted_out() {
        let local = MockInvoker::ok("A");
        let cat = catalog_with(vec![(
            descriptor("A", ProviderKind::SelfHosted, 0.0001, QualityTier::High),
            local.clone(),
        )]);
        let context = ContextSource {
            retriever: HybridRetriever::new(Arc::new(OnePassage)),
            limit: 4,
            threshold: 0.78,
        };
        let (pipeline, _) = pipeline(cat, Some(context));

        let outcome = pipeline.handle(chat("watch straps")).await.unwrap();
        assert_eq!(outcome.context_passages, 1);
        let seen = local.last_messages();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, Role::System);
        assert!(seen[0].content.contains("notes about watch straps"));

        let mut request = chat("watch straps");
        request.use_context = false;
        let outcome = pipeline.handle(request).await.unwrap();
        assert_eq!(outcome.context_passages, 0);
        assert_eq!(local.last_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_no_eligible_backend_is_reported() {
        let cat = catalog_with(vec![(
            descriptor("A", ProviderKind::Hosted, 0.001, QualityTier::High),
            MockInvoker::ok("A"),
        )]);
        let (pipeline, sink) = pipeline(cat, None);
        let mut request = chat("hi");
        request.routing.region = Some(Region::Eu);

        let err = pipeline.handle(request).await.unwrap_err();
        assert!(matches!(err, RoutingError::NoEligibleBackend { .. }));
        let events = sink.events.lock().unwrap();
        assert!(!events[0].succeeded());
        assert!(events[0].primary.is_none());
    }

    #[tokio::test]
    async fn test_replaced_catalog_used_by_next_request() {
        let cat = catalog_with(vec![(
            descriptor("old", ProviderKind::Hosted, 0.001, QualityTier::High),
            MockInvoker::ok("old"),
        )]);
        let (pipeline, _) = pipeline(cat, None);
        let before = pipeline.catalog();

        pipeline.replace_catalog(catalog_with(vec![(
            descriptor("new", ProviderKind::Hosted, 0.001, QualityTier::High),
            MockInvoker::ok("new"),
        )]));

        assert!(before.get("old").is_some());
        let outcome = pipeline.handle(chat("hi")).await.unwrap();
        assert_eq!(outcome.served_by.name, "new");
        assert_eq!(pipeline.decide(&chat("hi").routing).unwrap().backend.name, "new");
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"messages": [{"role": "user", "content": "hi"}], "quality": "max", "stream": true}"#,
        )
        .unwrap();
        assert!(request.stream);
        assert!(request.use_context);
        assert_eq!(request.routing.quality, crate::routing::QualityPreference::Max);
        assert!(!request.routing.prefer_local);
        assert!(request.request_id.is_none());
    }
}
