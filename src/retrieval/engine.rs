//! Hybrid retrieval engine.
//!
//! # Responsibilities
//! - Run vector and lexical sub-searches concurrently
//! - Merge with first-occurrence-wins dedup, rank ascending, truncate
//! - Degrade sub-search failures to empty results
//!
//! # Design Decisions
//! - Vector hits are merged before lexical hits, so a vector duplicate
//!   keeps its score and metadata
//! - The threshold applies to vector distance only
//! - Errors never leave this module: missing context is not fatal

use std::collections::HashSet;
use std::sync::Arc;

use crate::observability::metrics;
use crate::retrieval::store::RetrievalStore;
use crate::retrieval::types::{RetrievalCandidate, RetrievalResult, SearchMode, StoreHit};

/// Composes the store's two read operations into one ranked result.
#[derive(Clone)]
pub struct HybridRetriever {
    store: Arc<dyn RetrievalStore>,
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever").finish_non_exhaustive()
    }
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn RetrievalStore>) -> Self {
        Self { store }
    }

    /// Search the store. Always returns a result, possibly empty.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
        mode: SearchMode,
    ) -> RetrievalResult {
        let results = if limit == 0 {
            Vec::new()
        } else {
            match mode {
                SearchMode::Vector => {
                    let mut hits = vector_candidates(self.vector(query, limit).await, threshold);
                    hits.truncate(limit);
                    hits
                }
                SearchMode::Text => {
                    let mut hits = text_candidates(self.text(query, limit).await);
                    hits.truncate(limit);
                    hits
                }
                SearchMode::Hybrid => {
                    let per_source = limit.div_ceil(2);
                    let (vector, text) =
                        tokio::join!(self.vector(query, per_source), self.text(query, per_source));
                    merge(
                        vec![vector_candidates(vector, threshold), text_candidates(text)],
                        limit,
                    )
                }
            }
        };

        tracing::debug!(mode = ?mode, limit, results = results.len(), "Retrieval complete");
        metrics::record_retrieval(mode, results.len());

        RetrievalResult {
            query: query.to_string(),
            mode,
            results,
        }
    }

    async fn vector(&self, query: &str, limit: usize) -> Vec<StoreHit> {
        self.store
            .vector_search(query, limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Vector search failed, continuing without it");
                Vec::new()
            })
    }

    async fn text(&self, query: &str, limit: usize) -> Vec<StoreHit> {
        self.store
            .text_search(query, limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Text search failed, continuing without it");
                Vec::new()
            })
    }
}

fn vector_candidates(hits: Vec<StoreHit>, threshold: f64) -> Vec<RetrievalCandidate> {
    hits.into_iter()
        .filter(|hit| hit.score <= threshold)
        .map(RetrievalCandidate::from_vector)
        .collect()
}

fn text_candidates(hits: Vec<StoreHit>) -> Vec<RetrievalCandidate> {
    hits.into_iter().map(RetrievalCandidate::from_text).collect()
}

/// Merge candidate lists in the order given.
///
/// The first occurrence of an id wins. The survivors are stably sorted
/// ascending by `search_score` and truncated to `limit`.
pub fn merge(sources: Vec<Vec<RetrievalCandidate>>, limit: usize) -> Vec<RetrievalCandidate> {
    let mut seen = HashSet::new();
    let mut merged: Vec<RetrievalCandidate> = sources
        .into_iter()
        .flatten()
        .filter(|c| seen.insert(c.id.clone()))
        .collect();
    merged.sort_by(|a, b| a.search_score.total_cmp(&b.search_score));
    merged.truncate(limit);
    merged
}
