//! In-memory vector store, useful for testing and for running without a
//! database.

use async_trait::async_trait;
use ragent_core::error::RetrievalError;
use ragent_core::retrieval::{VectorRow, VectorStore};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::vector::cosine_distance;

struct StoredDocument {
    id: String,
    content: String,
    metadata: serde_json::Value,
    embedding: Vec<f32>,
}

/// Brute-force cosine search over a `Vec`.
#[derive(Default)]
pub struct InMemoryStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: serde_json::Value,
    ) -> Result<String, RetrievalError> {
        let id = Uuid::new_v4().to_string();
        self.documents.write().await.push(StoredDocument {
            id: id.clone(),
            content: content.to_string(),
            metadata,
            embedding: embedding.to_vec(),
        });
        Ok(id)
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorRow>, RetrievalError> {
        let documents = self.documents.read().await;

        let mut rows: Vec<VectorRow> = documents
            .iter()
            .filter(|d| d.embedding.len() == embedding.len())
            .map(|d| VectorRow {
                id: d.id.clone(),
                content: d.content.clone(),
                metadata: d.metadata.clone(),
                distance: cosine_distance(&d.embedding, embedding),
            })
            .collect();

        rows.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        rows.truncate(top_k);
        Ok(rows)
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.documents.read().await.len())
    }

    async fn ping(&self) -> Result<(), RetrievalError> {
        Ok(())
    }
}
