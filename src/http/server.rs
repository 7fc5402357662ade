//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the chat pipeline from configuration
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Apply catalog reloads while serving
//! - Serve until the shutdown signal, then drain

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::catalog::BackendCatalog;
use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::http::request::{make_span, X_REQUEST_ID};
use crate::observability::telemetry::TelemetrySink;
use crate::pipeline::{ChatPipeline, ContextSource};
use crate::resilience::{BreakerRegistry, CircuitBreakerConfig};
use crate::retrieval::{HybridRetriever, RpcStore};
use crate::routing::SelectionScorer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub started: Instant,
}

/// HTTP server for the model gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    pipeline: Arc<ChatPipeline>,
}

impl HttpServer {
    /// Create a server, building the catalog, breakers and retrieval store
    /// from `config`.
    pub fn new(
        config: GatewayConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, reqwest::Error> {
        let catalog = BackendCatalog::from_config(&config.backends, &config.timeouts)?;
        let breakers = Arc::new(BreakerRegistry::new(CircuitBreakerConfig::from(&config.breaker)));

        let context = if config.retrieval.enabled {
            let store = RpcStore::from_config(&config.retrieval, &config.timeouts)?;
            tracing::info!(store = %config.retrieval.store_url, "Retrieval enabled");
            Some(ContextSource::new(
                HybridRetriever::new(Arc::new(store)),
                &config.retrieval,
            ))
        } else {
            None
        };

        let pipeline = Arc::new(ChatPipeline::new(
            catalog,
            SelectionScorer::new(&config.routing),
            breakers,
            context,
            telemetry,
        ));
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create a server around an existing pipeline.
    pub fn with_pipeline(config: GatewayConfig, pipeline: Arc<ChatPipeline>) -> Self {
        let state = AppState {
            pipeline: pipeline.clone(),
            started: Instant::now(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pipeline,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/chat", post(handlers::chat))
            .route("/route", post(handlers::route))
            .route("/rag/query", post(handlers::rag_query))
            .route("/models", get(handlers::models))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_size))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(make_span::<axum::body::Body>))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Each configuration received on `config_updates` replaces the backend
    /// catalog. Breaker state carries over by backend name.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: Option<mpsc::UnboundedReceiver<GatewayConfig>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pipeline.catalog().len(),
            "HTTP server starting"
        );

        if let Some(updates) = config_updates {
            tokio::spawn(apply_reloads(
                self.pipeline.clone(),
                updates,
                shutdown.resubscribe(),
            ));
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<ChatPipeline> {
        &self.pipeline
    }
}

async fn apply_reloads(
    pipeline: Arc<ChatPipeline>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match BackendCatalog::from_config(&config.backends, &config.timeouts) {
                    Ok(catalog) => pipeline.replace_catalog(catalog),
                    Err(e) => tracing::error!(error = %e, "Failed to build reloaded catalog; keeping current"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config reload task stopped");
}
