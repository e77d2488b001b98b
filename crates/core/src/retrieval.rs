//! Retrieval traits: vector storage and the query-to-documents step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A document returned for a query, closest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,

    /// Taken from the stored row's `metadata.source`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Cosine distance to the query (lower is closer)
    pub distance: f64,
}

impl RetrievedDocument {
    pub fn new(content: impl Into<String>, source: Option<&str>, distance: f64) -> Self {
        Self {
            content: content.into(),
            source: source.map(str::to_string),
            distance,
        }
    }
}

/// A raw row from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRow {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub distance: f64,
}

impl From<VectorRow> for RetrievedDocument {
    fn from(row: VectorRow) -> Self {
        let source = row
            .metadata
            .get("source")
            .and_then(|s| s.as_str())
            .map(str::to_string);
        Self {
            content: row.content,
            source,
            distance: row.distance,
        }
    }
}

/// Nearest-neighbour storage for document embeddings.
///
/// Implementations: PostgreSQL + pgvector, in-memory (for testing).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "postgres", "in_memory").
    fn name(&self) -> &str;

    /// Store a document and its embedding. Returns the new row id.
    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: serde_json::Value,
    ) -> std::result::Result<String, RetrievalError>;

    /// The `top_k` rows closest to `embedding`, ascending by cosine distance.
    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> std::result::Result<Vec<VectorRow>, RetrievalError>;

    async fn count(&self) -> std::result::Result<usize, RetrievalError>;

    /// Readiness probe.
    async fn ping(&self) -> std::result::Result<(), RetrievalError>;

    /// Release pooled connections. Safe to call more than once.
    async fn close(&self) {}
}

/// Turns a user query into ranked context documents.
///
/// Never fails: an unavailable embedding service or store yields an empty
/// list, so the turn continues without context.
#[async_trait]
pub trait Retrieve: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievedDocument>;
}
