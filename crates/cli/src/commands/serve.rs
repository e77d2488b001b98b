//! `ragent serve`: start the HTTP and WebSocket API.

use anyhow::Context;
use ragent_config::AppConfig;
use tracing::info;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.server.port = port;
    }

    info!(
        addr = %config.server.bind_addr(),
        origins = ?config.server.allowed_origins,
        "Starting ragent gateway"
    );

    let state = ragent_gateway::build_state(config)
        .await
        .context("Failed to initialise services")?;
    ragent_gateway::serve(state).await.context("Server error")?;
    Ok(())
}
