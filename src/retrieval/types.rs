//! Retrieval types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Which sub-searches a query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    Text,
    #[default]
    Hybrid,
}

/// Sub-search a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Vector,
    Text,
}

/// A row as returned by the document store.
///
/// `score` is a distance (lower is better) for vector search and a
/// relevance rank (higher is better) for text search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreHit {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(alias = "distance", alias = "rank")]
    pub score: f64,
}

/// A candidate with its score in distance orientation (lower is better).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalCandidate {
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub search_score: f64,
    pub source: CandidateSource,
}

impl RetrievalCandidate {
    pub fn from_vector(hit: StoreHit) -> Self {
        Self {
            id: hit.id,
            content: hit.content,
            metadata: hit.metadata,
            search_score: hit.score,
            source: CandidateSource::Vector,
        }
    }

    /// Text ranks are flipped into distance orientation: `1 / (1 + rank)`.
    pub fn from_text(hit: StoreHit) -> Self {
        Self {
            id: hit.id,
            content: hit.content,
            metadata: hit.metadata,
            search_score: 1.0 / (1.0 + hit.score.max(0.0)),
            source: CandidateSource::Text,
        }
    }
}

/// Ranked, deduplicated result of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub query: String,
    pub mode: SearchMode,
    pub results: Vec<RetrievalCandidate>,
}

fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "document id must be a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_rows_decode() {
        let vector: StoreHit =
            serde_json::from_str(r#"{"id": 42, "content": "watch", "distance": 0.12}"#).unwrap();
        assert_eq!(vector.id, "42");
        assert_eq!(vector.score, 0.12);
        assert!(vector.metadata.is_none());

        let text: StoreHit = serde_json::from_str(
            r#"{"id": "doc-1", "content": "watch", "metadata": {"lang": "en"}, "rank": 0.9}"#,
        )
        .unwrap();
        assert_eq!(text.id, "doc-1");
        assert_eq!(text.metadata.unwrap()["lang"], "en");
    }

    #[test]
    fn test_text_rank_normalised() {
        let hit = |score| StoreHit {
            id: "1".into(),
            content: String::new(),
            metadata: None,
            score,
        };
        let strong = RetrievalCandidate::from_text(hit(3.0));
        let weak = RetrievalCandidate::from_text(hit(0.5));
        assert!(strong.search_score < weak.search_score);
        assert_eq!(strong.search_score, 0.25);
    }
}
