//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, trace span)
//!     → handlers.rs (/chat, /route, /rag/query, /models, /health)
//!     → pipeline (retrieve → route → execute)
//!     → response.rs (JSON, event stream, error mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{X_REQUEST_ID, X_SERVED_BY};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
