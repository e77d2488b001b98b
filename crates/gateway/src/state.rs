//! Shared application state and its construction from configuration.

use std::sync::Arc;

use ragent_agent::RagAgent;
use ragent_config::AppConfig;
use ragent_core::error::Error;
use ragent_core::retrieval::VectorStore;
use ragent_providers::{ModelBackends, build_from_config};
use ragent_retrieval::{PgVectorStore, Retriever};
use tracing::{info, warn};

/// Everything a request handler needs. Built once, shared by `Arc`.
pub struct AppState {
    pub config: AppConfig,
    pub agent: RagAgent,
    /// Also used directly for ingestion and readiness.
    pub retriever: Arc<Retriever>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the tool registry, retriever and agent around the given model
    /// backends and vector store.
    pub fn new(
        config: AppConfig,
        backends: ModelBackends,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, Error> {
        let retriever = Arc::new(
            Retriever::new(backends.embedder.clone(), store, &config.retrieval.embedding_model)
                .with_timeout(config.retrieval.timeout()),
        );
        let tools = Arc::new(ragent_tools::default_registry(config.tools.timeout())?);

        info!(
            provider = backends.chat.name(),
            model = %backends.chat_model,
            embedder = backends.embedder.name(),
            store = retriever.store().name(),
            tools = tools.len(),
            "Services ready"
        );

        let agent = RagAgent::new(backends.chat, retriever.clone(), tools, backends.chat_model)
            .with_temperature(config.model.temperature)
            .with_max_tokens(config.model.max_tokens)
            .with_top_k(config.retrieval.top_k)
            .with_model_timeout(config.model.timeout());

        Ok(Self {
            config,
            agent,
            retriever,
        })
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        self.retriever.store()
    }
}

/// Build the production state: configured model backends and the
/// PostgreSQL vector store.
///
/// The pool is lazy, so a database that is down at startup only makes
/// retrieval return no context and `/ready` report `not_ready`.
pub async fn build_state(config: AppConfig) -> Result<SharedState, Error> {
    let backends = build_from_config(&config.model)?;
    let store = PgVectorStore::connect_lazy(&config.vector_store, config.retrieval.vector_dimension)?;

    if config.vector_store.auto_migrate {
        if let Err(e) = store.migrate().await {
            warn!(error = %e, "Schema migration failed, continuing without it");
        }
    }

    let state = AppState::new(config, backends, Arc::new(store))?;
    Ok(Arc::new(state))
}
