//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! ChatRequest
//!     → retrieval (context for the last user message, optional)
//!     → augment.rs (system message with numbered passages)
//!     → routing scorer (RoutingDecision)
//!     → fallback executor (Execution)
//!     → telemetry sink (one event) → ChatOutcome
//! ```

pub mod augment;
pub mod chat;

pub use augment::{augment, last_user_query};
pub use chat::{ChatOutcome, ChatPipeline, ChatRequest, ContextSource};
