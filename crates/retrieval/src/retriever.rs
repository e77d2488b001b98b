//! The retrieval client: embed the query, search the store, map rows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ragent_core::error::RetrievalError;
use ragent_core::provider::{EmbeddingRequest, Provider};
use ragent_core::retrieval::{Retrieve, RetrievedDocument, VectorStore};
use tracing::{debug, info, warn};

/// Embedding service + vector store, each call bounded by `timeout`.
pub struct Retriever {
    embedder: Arc<dyn Provider>,
    store: Arc<dyn VectorStore>,
    embedding_model: String,
    timeout: Duration,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Provider>,
        store: Arc<dyn VectorStore>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            embedding_model: embedding_model.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            inputs: vec![text.to_string()],
        };
        let response = tokio::time::timeout(self.timeout, self.embedder.embed(request))
            .await
            .map_err(|_| RetrievalError::Timeout {
                operation: "embedding".into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("empty embedding response".into()))
    }

    /// The fallible path behind [`Retrieve::retrieve`].
    pub async fn try_retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let embedding = self.embed(query).await?;

        let rows = tokio::time::timeout(self.timeout, self.store.search(&embedding, top_k))
            .await
            .map_err(|_| RetrievalError::Timeout {
                operation: "vector search".into(),
                timeout_secs: self.timeout.as_secs(),
            })??;

        let mut docs: Vec<RetrievedDocument> = rows.into_iter().map(RetrievedDocument::from).collect();
        docs.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        docs.truncate(top_k);

        debug!(
            count = docs.len(),
            top_k,
            duration_ms = started.elapsed().as_millis() as u64,
            "Retrieved documents"
        );
        Ok(docs)
    }

    /// Embed and store one document. Returns the new id.
    pub async fn ingest(
        &self,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<String, RetrievalError> {
        if content.trim().is_empty() {
            return Err(RetrievalError::InvalidDocument("content is empty".into()));
        }
        if !metadata.is_object() {
            return Err(RetrievalError::InvalidDocument("metadata must be a JSON object".into()));
        }

        let embedding = self.embed(content).await?;
        let id = tokio::time::timeout(self.timeout, self.store.insert(content, &embedding, metadata))
            .await
            .map_err(|_| RetrievalError::Timeout {
                operation: "document insert".into(),
                timeout_secs: self.timeout.as_secs(),
            })??;

        info!(id = %id, chars = content.chars().count(), "Ingested document");
        Ok(id)
    }
}

#[async_trait]
impl Retrieve for Retriever {
    /// Failures are logged and degrade to no context.
    async fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievedDocument> {
        match self.try_retrieve(query, top_k).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "Retrieval unavailable, continuing without context");
                Vec::new()
            }
        }
    }
}
