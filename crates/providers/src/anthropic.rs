//! Anthropic Messages API provider.
//!
//! Differences from the OpenAI wire format:
//! - `x-api-key` header authentication plus `anthropic-version`
//! - System prompt as a top-level field
//! - Tool use via `tool_use` / `tool_result` content blocks
//! - Typed SSE events (`content_block_delta`, `message_stop`, ...)
//!
//! Anthropic has no embedding endpoint; `embed` keeps the trait default.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragent_core::error::ProviderError;
use ragent_core::message::{Message, MessageToolCall, Role};
use ragent_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::http::{SseBuffer, check_status, client, network_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: client(Duration::from_secs(120)),
        }
    }

    /// Custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = client(timeout);
        self
    }

    /// Split system messages out; Anthropic takes them as a top-level field.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let (system, rest): (Vec<&Message>, Vec<&Message>) =
            messages.iter().partition(|m| m.role == Role::System);
        let system = if system.is_empty() {
            None
        } else {
            Some(
                system
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };
        (system, rest)
    }

    fn to_api_messages(messages: &[&Message]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            let (role, blocks) = match msg.role {
                Role::User => ("user", vec![ContentBlock::Text { text: msg.content.clone() }]),
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(ContentBlock::Text { text: msg.content.clone() });
                    }
                    for tc in &msg.tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: serde_json::from_str(&tc.arguments)
                                .unwrap_or_else(|_| serde_json::json!({})),
                        });
                    }
                    ("assistant", blocks)
                }
                Role::Tool => (
                    "user",
                    vec![ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                    }],
                ),
                Role::System => continue,
            };

            // Consecutive tool results must share one user message.
            match result.last_mut() {
                Some(last)
                    if last.role == role
                        && role == "user"
                        && blocks.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                {
                    last.content.extend(blocks);
                }
                _ => result.push(AnthropicMessage {
                    role: role.to_string(),
                    content: blocks,
                }),
            }
        }

        result
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let (system, messages) = Self::extract_system(&request.messages);
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&messages),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(system) = system {
            body["system"] = serde_json::json!(system);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        check_status("anthropic", response).await
    }

    fn response_to_provider_response(resp: AnthropicResponse) -> ProviderResponse {
        let mut text = Vec::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text: t } => text.push(t),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(MessageToolCall {
                        id,
                        name,
                        arguments: input.to_string(),
                    });
                }
                ResponseContentBlock::Other => {}
            }
        }

        ProviderResponse {
            message: Message::assistant_tool_calls(text.join("\n"), tool_calls),
            usage: Some(resp.usage.into()),
            model: resp.model,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        debug!(provider = "anthropic", model = %request.model, tools = request.tools.len(), "Sending completion request");

        let response = self.post(&Self::request_body(&request, false)).await?;
        let api_resp: AnthropicResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        Ok(Self::response_to_provider_response(api_resp))
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let response = self.post(&Self::request_body(&request, true)).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut sse = SseBuffer::default();
            let mut state = StreamState::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for data in sse.push(&bytes) {
                    let Some(item) = state.handle(&data) else {
                        continue;
                    };
                    let last = item.as_ref().map_or(true, |c| c.done);
                    if tx.send(item).await.is_err() || last {
                        return;
                    }
                }
            }

            // Stream ended without message_stop
            let _ = tx.send(Ok(state.finish())).await;
        });

        Ok(rx)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(network_error)?;
        Ok(response.status().is_success())
    }
}

/// Folds typed stream events into chunks.
#[derive(Default)]
struct StreamState {
    current_tool: Option<MessageToolCall>,
    tool_calls: Vec<MessageToolCall>,
    input_tokens: u32,
    output_tokens: u32,
}

impl StreamState {
    fn handle(&mut self, data: &str) -> Option<std::result::Result<StreamChunk, ProviderError>> {
        let event = match serde_json::from_str::<StreamEvent>(data) {
            Ok(event) => event,
            Err(e) => {
                trace!(error = %e, data, "Ignoring unparseable Anthropic SSE");
                return None;
            }
        };

        match event {
            StreamEvent::MessageStart { message } => {
                self.input_tokens = message.usage.input_tokens;
                None
            }
            StreamEvent::ContentBlockStart { content_block } => {
                self.close_tool();
                if let StreamBlock::ToolUse { id, name } = content_block {
                    self.current_tool = Some(MessageToolCall {
                        id,
                        name,
                        arguments: String::new(),
                    });
                }
                None
            }
            StreamEvent::ContentBlockDelta { delta } => match delta {
                StreamDelta::TextDelta { text } if !text.is_empty() => {
                    Some(Ok(StreamChunk::text(text, false)))
                }
                StreamDelta::InputJsonDelta { partial_json } => {
                    if let Some(tool) = self.current_tool.as_mut() {
                        tool.arguments.push_str(&partial_json);
                    }
                    None
                }
                _ => None,
            },
            StreamEvent::ContentBlockStop => {
                self.close_tool();
                None
            }
            StreamEvent::MessageDelta { usage } => {
                if let Some(usage) = usage {
                    self.output_tokens = usage.output_tokens;
                }
                None
            }
            StreamEvent::MessageStop => Some(Ok(self.finish())),
            StreamEvent::Error { error } => Some(Err(ProviderError::StreamInterrupted(format!(
                "{}: {}",
                error.r#type, error.message
            )))),
            StreamEvent::Other => None,
        }
    }

    fn close_tool(&mut self) {
        if let Some(tool) = self.current_tool.take() {
            self.tool_calls.push(tool);
        }
    }

    fn finish(&mut self) -> StreamChunk {
        self.close_tool();
        StreamChunk {
            usage: Some(Usage {
                prompt_tokens: self.input_tokens,
                completion_tokens: self.output_tokens,
                total_tokens: self.input_tokens + self.output_tokens,
            }),
            ..StreamChunk::finished(std::mem::take(&mut self.tool_calls))
        }
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<AnthropicUsage> for Usage {
    fn from(u: AnthropicUsage) -> Self {
        Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: StreamMessage,
    },
    ContentBlockStart {
        content_block: StreamBlock,
    },
    ContentBlockDelta {
        delta: StreamDelta,
    },
    ContentBlockStop,
    MessageDelta {
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    Error {
        error: StreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamBlock {
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    r#type: String,
    message: String,
}
