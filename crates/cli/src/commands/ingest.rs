//! `ragent ingest`: embed a text file and store it.

use std::path::Path;

use anyhow::Context;
use ragent_config::AppConfig;

pub async fn run(config: AppConfig, file: &Path, source: Option<String>) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let source = source.unwrap_or_else(|| default_source(file));

    let state = ragent_gateway::build_state(config)
        .await
        .context("Failed to initialise services")?;
    let outcome = state
        .retriever
        .ingest(&content, serde_json::json!({ "source": source }))
        .await;
    state.store().close().await;

    let id = outcome.with_context(|| format!("Failed to ingest {}", file.display()))?;
    println!("{id}");
    Ok(())
}

fn default_source(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}
