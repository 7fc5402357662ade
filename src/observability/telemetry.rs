//! Routing telemetry.
//!
//! # Responsibilities
//! - Describe one completed chat request (decision, attempts, outcome)
//! - Hand events to a consumer without ever blocking the request path
//!
//! # Design Decisions
//! - Bounded channel with `try_send`: a slow consumer loses events,
//!   requests never wait
//! - The default consumer writes events to the log

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::routing::AttemptRecord;

/// Everything known about one request once it finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    /// Same value as the `x-request-id` response header.
    pub request_id: String,
    /// Backend the scorer picked.
    pub primary: Option<String>,
    /// Backend that actually answered, if any did.
    pub served_by: Option<String>,
    pub justification: Option<String>,
    pub estimated_cost: Option<f64>,
    pub estimated_latency_ms: Option<u64>,
    pub context_passages: usize,
    pub attempts: Vec<AttemptRecord>,
    pub error: Option<String>,
}

impl TelemetryEvent {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Receives telemetry events. Implementations must not block.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Sink backed by a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelSink {
    fn emit(&self, event: TelemetryEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!(error = %e, "Telemetry event dropped");
        }
    }
}

/// Log every event until the channel closes or shutdown fires.
pub async fn run_logger(
    mut rx: mpsc::Receiver<TelemetryEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
            _ = shutdown.recv() => {
                while let Ok(event) = rx.try_recv() {
                    log_event(&event);
                }
                break;
            }
        }
    }
    tracing::debug!("Telemetry logger stopped");
}

fn log_event(event: &TelemetryEvent) {
    let attempts = serde_json::to_string(&event.attempts).unwrap_or_default();
    if event.succeeded() {
        tracing::info!(
            target: "telemetry",
            request_id = %event.request_id,
            primary = event.primary.as_deref().unwrap_or("-"),
            served_by = event.served_by.as_deref().unwrap_or("-"),
            estimated_cost = event.estimated_cost.unwrap_or_default(),
            context_passages = event.context_passages,
            attempts = %attempts,
            justification = event.justification.as_deref().unwrap_or(""),
            "Request completed"
        );
    } else {
        tracing::warn!(
            target: "telemetry",
            request_id = %event.request_id,
            primary = event.primary.as_deref().unwrap_or("-"),
            attempts = %attempts,
            error = event.error.as_deref().unwrap_or(""),
            "Request failed"
        );
    }
}
