//! Model gateway server.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                    MODEL GATEWAY                     │
//!                          │                                                      │
//!     Client Request       │  ┌─────────┐    ┌───────────┐    ┌──────────────┐    │
//!     ─────────────────────┼─▶│  http   │───▶│ pipeline  │───▶│  retrieval   │◀───┼──── Document
//!                          │  │ server  │    │           │    │ vector∥text  │    │     Store
//!                          │  └─────────┘    └─────┬─────┘    └──────────────┘    │
//!                          │                       │                              │
//!                          │                       ▼                              │
//!                          │                ┌──────────────┐                      │
//!                          │                │   routing    │                      │
//!                          │                │   scorer     │                      │
//!                          │                └──────┬───────┘                      │
//!                          │                       ▼                              │
//!     Client Response      │  ┌─────────┐    ┌──────────────┐    ┌────────────┐   │
//!     ◀────────────────────┼──│response │◀───│   fallback   │───▶│  breakers  │   │
//!                          │  │ / SSE   │    │   executor   │    │ per backend│   │
//!                          │  └─────────┘    └──────┬───────┘    └────────────┘   │
//!                          │                        │                             │
//!                          │                        ▼                             │
//!                          │                ┌──────────────┐                      │
//!                          │                │   catalog    │──────────────────────┼──── Hosted /
//!                          │                │   adapters   │                      │     Self-hosted
//!                          │                └──────────────┘                      │     Backends
//!                          │                                                      │
//!                          │  Cross-cutting: config (hot reload), observability,  │
//!                          │  lifecycle (signals, shutdown)                       │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use model_gateway::config::{load_config, watcher::ConfigWatcher};
use model_gateway::lifecycle::{wait_for_signal, Shutdown};
use model_gateway::observability::{logging, metrics, telemetry};
use model_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "model-gateway", version)]
#[command(about = "Routes chat requests across hosted and self-hosted model backends")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = "gateway.toml")]
    config: PathBuf,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!("model-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %args.config.display(),
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        retrieval = config.retrieval.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    let (sink, events) = telemetry::ChannelSink::new(config.observability.telemetry_capacity);
    let telemetry_task = tokio::spawn(telemetry::run_logger(events, shutdown.subscribe()));

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = if args.no_watch {
        (None, None)
    } else {
        let (watcher, updates) = ConfigWatcher::new(&args.config);
        match watcher.run() {
            Ok(handle) => (Some(handle), Some(updates)),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable; hot reload disabled");
                (None, None)
            }
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, Arc::new(sink))?;

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    let _ = telemetry_task.await;
    tracing::info!("Shutdown complete");
    Ok(())
}
