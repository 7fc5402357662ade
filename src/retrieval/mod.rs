//! Hybrid retrieval subsystem.
//!
//! # Data Flow
//! ```text
//! query text
//!     → engine.rs (vector ∥ text sub-searches)
//!     → store.rs (RPC calls against the document store)
//!     → types.rs (rows normalised to distance orientation)
//!     → merge, dedup, sort ascending, truncate
//!     → RetrievalResult (consumed by the pipeline or /rag/query)
//! ```

pub mod engine;
pub mod store;
pub mod types;

pub use engine::{merge, HybridRetriever};
pub use store::{RetrievalStore, RpcStore, StoreError};
pub use types::{CandidateSource, RetrievalCandidate, RetrievalResult, SearchMode, StoreHit};
