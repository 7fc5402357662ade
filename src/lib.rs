//! Model gateway library.
//!
//! Routes chat requests across a catalog of hosted and self-hosted model
//! backends, with per-backend circuit breakers, ordered fallback and
//! optional hybrid retrieval for prompt augmentation.

pub mod catalog;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod retrieval;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{ChatOutcome, ChatPipeline, ChatRequest};
