//! HTTP and WebSocket gateway for ragent.
//!
//! Serves the v1 chat API, health probes, the tool catalogue and document
//! ingestion. Built on Axum.

pub mod api_v1;
pub mod error;
pub mod state;

#[cfg(test)]
mod test_helpers;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

pub use state::{AppState, SharedState, build_state};

/// Reported by `/` and the health probe.
pub const SERVICE_NAME: &str = "RAG LLM Agent Platform";

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: SERVICE_NAME.into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// CORS from `server.allowed_origins`. A `*` entry allows any origin
/// without credentials; otherwise the listed origins are allowed with
/// credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(parsed))
        .allow_credentials(true)
}

/// Build the full router: `/` plus the v1 API under `/api/v1`.
///
/// Layers: body size limit, CORS, HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let cors = cors_layer(&state.config.server.allowed_origins);

    Router::new()
        .route("/", get(root_handler))
        .nest("/api/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the HTTP server and run until Ctrl-C or SIGTERM.
///
/// In-flight requests finish before the store's connections are released.
pub async fn serve(state: SharedState) -> Result<(), std::io::Error> {
    let addr = state.config.server.bind_addr();
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing vector store");
    state.store().close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
