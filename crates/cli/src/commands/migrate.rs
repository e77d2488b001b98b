//! `ragent migrate`: create the pgvector extension, documents table and index.

use anyhow::Context;
use ragent_config::AppConfig;
use ragent_core::retrieval::VectorStore;
use ragent_retrieval::PgVectorStore;
use tracing::info;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let store = PgVectorStore::connect_lazy(&config.vector_store, config.retrieval.vector_dimension)
        .context("Invalid vector store settings")?;

    let outcome = store.migrate().await;
    store.close().await;
    outcome.context("Migration failed")?;

    info!(
        table = %config.vector_store.table,
        dimension = config.retrieval.vector_dimension,
        "Vector store schema is up to date"
    );
    Ok(())
}
