//! Test doubles for the gateway tests.

use std::sync::Arc;

use async_trait::async_trait;
use ragent_config::AppConfig;
use ragent_core::error::{ProviderError, RetrievalError};
use ragent_core::message::Message;
use ragent_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
};
use ragent_core::retrieval::{VectorRow, VectorStore};
use ragent_providers::ModelBackends;
use ragent_retrieval::InMemoryStore;

use crate::state::{AppState, SharedState};

const EMBEDDING: [f32; 3] = [1.0, 0.0, 0.0];

/// Answers every chat call with a fixed text and embeds everything to the
/// same vector, so every stored document matches every query.
pub struct MockProvider {
    reply: Option<String>,
}

impl MockProvider {
    pub fn new(reply: &str) -> Self {
        Self { reply: Some(reply.into()) }
    }

    /// Chat calls fail; embeddings still work.
    pub fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match &self.reply {
            Some(text) => Ok(ProviderResponse {
                message: Message::assistant(text.clone()),
                usage: None,
                model: "mock-model".into(),
            }),
            None => Err(ProviderError::Network("upstream down".into())),
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|_| EMBEDDING.to_vec()).collect(),
            model: request.model,
            usage: None,
        })
    }
}

/// Fails every operation, like a database that is down.
pub struct DownStore;

#[async_trait]
impl VectorStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn insert(&self, _: &str, _: &[f32], _: serde_json::Value) -> Result<String, RetrievalError> {
        Err(RetrievalError::Storage("connection refused".into()))
    }

    async fn search(&self, _: &[f32], _: usize) -> Result<Vec<VectorRow>, RetrievalError> {
        Err(RetrievalError::QueryFailed("connection refused".into()))
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Err(RetrievalError::QueryFailed("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), RetrievalError> {
        Err(RetrievalError::Storage("connection refused".into()))
    }
}

fn backends(provider: MockProvider) -> ModelBackends {
    let provider: Arc<dyn Provider> = Arc::new(provider);
    ModelBackends {
        chat: provider.clone(),
        chat_model: "mock-model".into(),
        embedder: provider,
    }
}

pub fn state_with_store(provider: MockProvider, store: Arc<dyn VectorStore>) -> SharedState {
    let state = AppState::new(AppConfig::default(), backends(provider), store).unwrap();
    Arc::new(state)
}

pub fn state_with_config(config: AppConfig, provider: MockProvider) -> SharedState {
    let state = AppState::new(config, backends(provider), Arc::new(InMemoryStore::new())).unwrap();
    Arc::new(state)
}

/// Default config over an empty in-memory store. The store is returned for
/// seeding and assertions.
pub fn test_state(provider: MockProvider) -> (SharedState, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with_store(provider, store.clone());
    (state, store)
}

pub async fn seed(store: &InMemoryStore, content: &str, source: &str) {
    store
        .insert(content, &EMBEDDING, serde_json::json!({"source": source}))
        .await
        .unwrap();
}
