//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /api/v1/chat`: Send a message, get the answer and its sources
//! - `GET  /api/v1/ws/chat`: WebSocket for streamed answers
//! - `GET  /api/v1/health`: Liveness
//! - `GET  /api/v1/ready`: Readiness (checks the vector store)
//! - `GET  /api/v1/tools`: Tools the model may call
//! - `POST /api/v1/documents`: Embed and store a document

use axum::{
    Router,
    extract::State,
    extract::rejection::JsonRejection,
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ragent_agent::AgentStreamEvent;
use ragent_core::provider::ToolDefinition;
use ragent_core::turn::{ConversationTurn, TurnResult};

use crate::SERVICE_NAME;
use crate::error::ApiError;
use crate::state::SharedState;

/// Build the v1 API router. Nest this under "/api/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/ws/chat", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/tools", get(list_tools_handler))
        .route("/documents", post(ingest_document_handler))
        .with_state(state)
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TurnResult>, ApiError> {
    let Json(payload) = payload?;
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    info!(stream = payload.stream, "v1/chat request");
    let turn = ConversationTurn::new(payload.message, payload.conversation_id)
        .streaming(payload.stream);
    let result = state.agent.chat(turn).await?;
    Ok(Json(result))
}

// ── WebSocket ─────────────────────────────────────────────────────────────

/// `GET /api/v1/ws/chat`: streamed chat.
///
/// Protocol:
/// - Client → Server: `{ "message": "...", "conversation_id": "..."? }`
/// - Server → Client: `AgentStreamEvent` JSON frames (chunk, tool_result, done)
///
/// A conversation id, once given or generated, is reused for later frames
/// that omit it. An empty message gets an error frame and the connection
/// stays open; a failed turn gets an error frame and the connection closes.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

#[derive(Deserialize)]
struct WsClientMessage {
    #[serde(default)]
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

/// Returns false once the client is gone.
async fn send_event(socket: &mut WebSocket, event: &AgentStreamEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to encode stream event");
            return true;
        }
    };
    socket.send(WsMessage::Text(json.into())).await.is_ok()
}

async fn send_error(socket: &mut WebSocket, message: impl Into<String>) -> bool {
    send_event(socket, &AgentStreamEvent::Error { message: message.into() }).await
}

async fn handle_ws_connection(mut socket: WebSocket, state: SharedState) {
    let idle = state.config.websocket.idle_timeout();
    let mut conversation_id: Option<String> = None;
    info!("WebSocket connection established");

    loop {
        let text = match tokio::time::timeout(idle, socket.recv()).await {
            Err(_) => {
                info!(idle_secs = idle.as_secs(), "WebSocket idle, closing");
                let _ = socket.send(WsMessage::Close(None)).await;
                break;
            }
            Ok(None) | Ok(Some(Ok(WsMessage::Close(_)))) => break,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "WebSocket receive failed");
                break;
            }
            Ok(Some(Ok(WsMessage::Text(text)))) => text,
            Ok(Some(Ok(_))) => continue, // ignore binary, ping, pong
        };

        let client_msg: WsClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                if !send_error(&mut socket, format!("Invalid message: {e}")).await {
                    break;
                }
                continue;
            }
        };

        if let Some(id) = client_msg.conversation_id.filter(|id| !id.trim().is_empty()) {
            conversation_id = Some(id);
        }
        if client_msg.message.trim().is_empty() {
            if !send_error(&mut socket, "message must not be empty").await {
                break;
            }
            continue;
        }

        let turn = ConversationTurn::new(client_msg.message, conversation_id.clone()).streaming(true);
        conversation_id = Some(turn.conversation_id.to_string());

        let mut events = state.agent.chat_stream(turn);
        let mut failed = false;
        while let Some(event) = events.recv().await {
            let is_error = matches!(event, AgentStreamEvent::Error { .. });
            if !send_event(&mut socket, &event).await {
                info!("WebSocket client disconnected mid-stream");
                return;
            }
            if is_error {
                failed = true;
                break;
            }
        }

        if failed {
            let _ = socket.send(WsMessage::Close(None)).await;
            break;
        }
    }

    info!("WebSocket connection closed");
}

// ── Probes ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub service: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: timestamp(),
        service: SERVICE_NAME.into(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn ready_handler(State(state): State<SharedState>) -> (StatusCode, Json<ReadyResponse>) {
    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready".into(),
                timestamp: timestamp(),
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "not_ready".into(),
                    timestamp: timestamp(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

// ── Tools ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDefinition>,
    pub count: usize,
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools = state.agent.tools().definitions();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}

// ── Documents ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IngestDocumentRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestDocumentResponse {
    pub id: String,
}

async fn ingest_document_handler(
    State(state): State<SharedState>,
    payload: Result<Json<IngestDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestDocumentResponse>), ApiError> {
    let Json(req) = payload?;
    let metadata = req
        .metadata
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

    let id = state.retriever.ingest(&req.content, metadata).await?;
    Ok((StatusCode::CREATED, Json(IngestDocumentResponse { id })))
}

// ── Tests ─────────────────────────────────────────────────────────────────
