//! The RAG orchestration loop.
//!
//! One turn walks a fixed state machine:
//!
//! ```text
//! Retrieving → Prompting → ModelCall1 → (ToolDispatch → ModelCall2)? → Done
//! ```
//!
//! 1. **Retrieve** context for the user message (never fails, may be empty)
//! 2. **Prompt**: fold the documents and the message into one user prompt
//! 3. **Call the model** with the registry's tool definitions
//! 4. **If tool calls**: run them concurrently, then call the model once more
//!    without tools. Tool calls in that second reply are ignored.
//!
//! Streaming turns run the same machine in a spawned task and report progress
//! as [`AgentStreamEvent`]s.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use ragent_core::error::{Error, ProviderError};
use ragent_core::message::{ConversationId, Message};
use ragent_core::prompt::{build_context, build_prompt};
use ragent_core::provider::{ChunkReceiver, ModelResponse, Provider, ProviderRequest, ToolDefinition};
use ragent_core::retrieval::Retrieve;
use ragent_core::tool::{ToolCall, ToolCallResult, ToolRegistry};
use ragent_core::turn::{ConversationTurn, TurnResult, collect_sources};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::stream_event::AgentStreamEvent;

/// Events buffered between the turn task and a slow consumer.
const STREAM_BUFFER: usize = 128;

/// Where a turn is in the orchestration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Retrieving,
    Prompting,
    ModelCall1,
    ToolDispatch,
    ModelCall2,
    Done,
}

/// Retrieval, prompt and tools, computed once per turn.
struct PreparedTurn {
    prompt: String,
    tools: Vec<ToolDefinition>,
    sources: Vec<Option<String>>,
}

/// Why a streaming turn stopped early.
enum StreamStop {
    /// The consumer dropped its receiver.
    Closed,
    Failed(ProviderError),
}

impl From<ProviderError> for StreamStop {
    fn from(e: ProviderError) -> Self {
        Self::Failed(e)
    }
}

/// Retrieval-augmented agent with one optional round of tool calls.
#[derive(Clone)]
pub struct RagAgent {
    provider: Arc<dyn Provider>,
    retriever: Arc<dyn Retrieve>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    top_k: usize,
    model_timeout: Duration,
}

impl RagAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Arc<dyn Retrieve>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            retriever,
            tools,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            top_k: 5,
            model_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Documents retrieved per turn.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Bound on each model call, and on opening a model stream.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    fn enter(&self, conversation_id: &ConversationId, state: TurnState) {
        debug!(conversation_id = %conversation_id, ?state, "Turn state");
    }

    async fn prepare(&self, turn: &ConversationTurn) -> PreparedTurn {
        self.enter(&turn.conversation_id, TurnState::Retrieving);
        let docs = self.retriever.retrieve(&turn.message, self.top_k).await;

        self.enter(&turn.conversation_id, TurnState::Prompting);
        let context = build_context(&docs);
        PreparedTurn {
            prompt: build_prompt(&turn.message, &context),
            tools: self.tools.definitions(),
            sources: collect_sources(&docs),
        }
    }

    fn request(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
            stream,
        }
    }

    fn timed_out(&self) -> ProviderError {
        ProviderError::Timeout(format!(
            "model call exceeded {}s",
            self.model_timeout.as_secs()
        ))
    }

    async fn open_stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        tokio::time::timeout(self.model_timeout, self.provider.stream(request))
            .await
            .map_err(|_| self.timed_out())?
    }

    /// One model call, as a single reply. A streamed reply is collected:
    /// content concatenated, tool calls taken from the final chunk.
    async fn call_model(&self, request: ProviderRequest) -> Result<ModelResponse, ProviderError> {
        if !request.stream {
            return tokio::time::timeout(self.model_timeout, self.provider.complete(request))
                .await
                .map_err(|_| self.timed_out())?
                .map(ModelResponse::from);
        }

        let collect = async {
            let mut rx = self.provider.stream(request).await?;
            let mut content = String::new();
            let mut tool_calls = Vec::new();
            while let Some(chunk) = rx.recv().await {
                let chunk = chunk?;
                if let Some(text) = chunk.content {
                    content.push_str(&text);
                }
                if !chunk.tool_calls.is_empty() {
                    tool_calls = chunk.tool_calls;
                }
                if chunk.done {
                    break;
                }
            }
            Ok::<_, ProviderError>(ModelResponse {
                content: (!content.is_empty()).then_some(content),
                tool_calls,
            })
        };
        tokio::time::timeout(self.model_timeout, collect)
            .await
            .map_err(|_| self.timed_out())?
    }

    async fn dispatch(&self, turn: &ConversationTurn, first: &ModelResponse) -> Vec<ToolCallResult> {
        self.enter(&turn.conversation_id, TurnState::ToolDispatch);
        let calls: Vec<ToolCall> = first.tool_calls.iter().map(ToolCall::from).collect();
        info!(
            conversation_id = %turn.conversation_id,
            count = calls.len(),
            tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Dispatching tool calls"
        );
        self.tools.execute_batch(&calls).await
    }

    /// Messages for the second model call: the prompt, the assistant's
    /// tool-call message, then one tool message per result.
    fn follow_up(prompt: &str, first: &ModelResponse, results: &[ToolCallResult]) -> Vec<Message> {
        let mut messages = vec![
            Message::user(prompt),
            Message::assistant_tool_calls(first.text(), first.tool_calls.clone()),
        ];
        messages.extend(
            results
                .iter()
                .map(|r| Message::tool_result(&r.call_id, r.model_content())),
        );
        messages
    }

    fn ignore_stray_tool_calls(turn: &ConversationTurn, second: &ModelResponse) {
        if second.has_tool_calls() {
            warn!(
                conversation_id = %turn.conversation_id,
                count = second.tool_calls.len(),
                "Second model reply requested tools again, ignoring"
            );
        }
    }

    /// Run one turn to completion.
    ///
    /// Retrieval problems only shrink the context. Model failures end the
    /// turn with [`Error::Provider`].
    pub async fn chat(&self, turn: ConversationTurn) -> Result<TurnResult, Error> {
        info!(
            conversation_id = %turn.conversation_id,
            streaming = turn.streaming,
            "Processing turn"
        );
        let prepared = self.prepare(&turn).await;

        self.enter(&turn.conversation_id, TurnState::ModelCall1);
        let first = self
            .call_model(self.request(
                vec![Message::user(&prepared.prompt)],
                prepared.tools.clone(),
                turn.streaming,
            ))
            .await?;

        let response = if first.has_tool_calls() {
            let results = self.dispatch(&turn, &first).await;

            self.enter(&turn.conversation_id, TurnState::ModelCall2);
            let second = self
                .call_model(self.request(
                    Self::follow_up(&prepared.prompt, &first, &results),
                    Vec::new(),
                    turn.streaming,
                ))
                .await?;
            Self::ignore_stray_tool_calls(&turn, &second);
            second.content.unwrap_or_default()
        } else {
            first.content.unwrap_or_default()
        };

        self.enter(&turn.conversation_id, TurnState::Done);
        info!(
            conversation_id = %turn.conversation_id,
            sources = prepared.sources.len(),
            "Turn complete"
        );
        Ok(TurnResult {
            response,
            conversation_id: turn.conversation_id,
            sources: prepared.sources,
        })
    }

    /// Run one turn in a background task, streaming its events.
    ///
    /// Chunks are forwarded as they arrive. When the first reply ends in tool
    /// calls its terminal chunk goes out with `done == false`, a `tool_result`
    /// event follows per call, then the second reply is streamed. Only the
    /// turn's last chunk has `done == true`, and a `done` event closes the
    /// turn. Failures send one `error` event instead.
    ///
    /// Dropping the receiver stops the task. A turn that panics still ends
    /// with an `error` event.
    pub fn chat_stream(&self, turn: ConversationTurn) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let agent = self.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(agent.run_stream(&turn, &tx))
                .catch_unwind()
                .await;
            let error = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(StreamStop::Closed)) => {
                    debug!(conversation_id = %turn.conversation_id, "Stream consumer went away");
                    return;
                }
                Ok(Err(StreamStop::Failed(e))) => {
                    warn!(conversation_id = %turn.conversation_id, error = %e, "Streaming turn failed");
                    Error::Provider(e)
                }
                Err(_) => {
                    warn!(conversation_id = %turn.conversation_id, "Streaming turn panicked");
                    Error::Internal("streaming turn panicked".into())
                }
            };
            let _ = tx
                .send(AgentStreamEvent::Error {
                    message: error.to_string(),
                })
                .await;
        });

        rx
    }

    async fn run_stream(
        &self,
        turn: &ConversationTurn,
        tx: &mpsc::Sender<AgentStreamEvent>,
    ) -> Result<(), StreamStop> {
        info!(conversation_id = %turn.conversation_id, "Processing streaming turn");
        let prepared = self.prepare(turn).await;

        self.enter(&turn.conversation_id, TurnState::ModelCall1);
        let request = self.request(
            vec![Message::user(&prepared.prompt)],
            prepared.tools.clone(),
            true,
        );
        let first = self.forward(turn, request, tx, false).await?;

        if first.has_tool_calls() {
            let results = self.dispatch(turn, &first).await;
            for result in &results {
                let event = AgentStreamEvent::ToolResult {
                    tool_name: result.tool_name.clone(),
                    success: result.success,
                    output: result.model_content(),
                };
                tx.send(event).await.map_err(|_| StreamStop::Closed)?;
            }

            self.enter(&turn.conversation_id, TurnState::ModelCall2);
            let request = self.request(
                Self::follow_up(&prepared.prompt, &first, &results),
                Vec::new(),
                true,
            );
            let second = self.forward(turn, request, tx, true).await?;
            Self::ignore_stray_tool_calls(turn, &second);
        }

        self.enter(&turn.conversation_id, TurnState::Done);
        tx.send(AgentStreamEvent::Done {
            conversation_id: turn.conversation_id.clone(),
            sources: prepared.sources,
        })
        .await
        .map_err(|_| StreamStop::Closed)
    }

    /// Stream one model call to the consumer and return what it said.
    ///
    /// `last_call` marks the turn's final model call. On the first call the
    /// terminal chunk only ends the turn when it carries no tool calls.
    ///
    /// Each wait for the next chunk is bounded by the model timeout.
    async fn forward(
        &self,
        turn: &ConversationTurn,
        request: ProviderRequest,
        tx: &mpsc::Sender<AgentStreamEvent>,
        last_call: bool,
    ) -> Result<ModelResponse, StreamStop> {
        let mut rx = self.open_stream(request).await?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        while let Some(chunk) = tokio::time::timeout(self.model_timeout, rx.recv())
            .await
            .map_err(|_| self.timed_out())?
        {
            let chunk = chunk?;
            if !chunk.tool_calls.is_empty() {
                tool_calls = chunk.tool_calls;
            }
            let text = chunk.content.unwrap_or_default();
            content.push_str(&text);

            if !text.is_empty() || chunk.done {
                let event = AgentStreamEvent::Chunk {
                    content: text,
                    conversation_id: turn.conversation_id.clone(),
                    done: chunk.done && (last_call || tool_calls.is_empty()),
                };
                tx.send(event).await.map_err(|_| StreamStop::Closed)?;
            }

            if chunk.done {
                return Ok(ModelResponse {
                    content: (!content.is_empty()).then_some(content),
                    tool_calls,
                });
            }
        }

        Err(StreamStop::Failed(ProviderError::StreamInterrupted(
            "model stream ended before its final chunk".into(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use ragent_core::provider::StreamChunk;
    use ragent_core::retrieval::RetrievedDocument;
    use ragent_core::message::Role;
    use std::sync::atomic::Ordering;

    fn agent(provider: Arc<ScriptedProvider>, retriever: Arc<StaticRetriever>, tools: ToolRegistry) -> RagAgent {
        RagAgent::new(provider, retriever, Arc::new(tools), "mock-model")
    }

    fn two_docs() -> Arc<StaticRetriever> {
        Arc::new(StaticRetriever::new(vec![
            RetrievedDocument::new("测试文档1", Some("doc1"), 0.1),
            RetrievedDocument::new("测试文档2", Some("doc2"), 0.2),
        ]))
    }

    async fn drain(mut rx: mpsc::Receiver<AgentStreamEvent>) -> Vec<AgentStreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn answers_with_retrieved_sources() {
        let provider = Arc::new(ScriptedProvider::text("这是测试响应"));
        let agent = agent(provider.clone(), two_docs(), ToolRegistry::empty());

        let result = agent.chat(ConversationTurn::new("测试问题", None)).await.unwrap();

        assert_eq!(result.response, "这是测试响应");
        assert_eq!(result.sources, vec![Some("doc1".to_string()), Some("doc2".to_string())]);
        assert_eq!(result.conversation_id.as_str().len(), 36);
        assert_eq!(provider.call_count(), 1);

        let request = &provider.requests()[0];
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0].content.starts_with("Context information:\n"));
        assert!(request.messages[0].content.contains("[1] 测试文档1"));
        assert!(request.messages[0].content.contains("User question: 测试问题"));
    }

    #[tokio::test]
    async fn supplied_conversation_id_is_echoed() {
        let provider = Arc::new(ScriptedProvider::text("ok"));
        let agent = agent(provider, Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        let result = agent
            .chat(ConversationTurn::new("hi", Some("conv-42".into())))
            .await
            .unwrap();
        assert_eq!(result.conversation_id.as_str(), "conv-42");
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn empty_context_has_no_header() {
        let provider = Arc::new(ScriptedProvider::text("ok"));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        agent.chat(ConversationTurn::new("hi", None)).await.unwrap();
        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.starts_with("User question: hi"));
    }

    #[tokio::test]
    async fn tool_call_triggers_one_follow_up() {
        let create = CountingTool::ok(
            "create_order",
            serde_json::json!({"order_id": "ORD-12345", "status": "created"}),
        );
        let calls = create.calls.clone();
        let tools = ToolRegistry::builder().register(Box::new(create)).build().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            Reply::ToolCalls(vec![tool_call(
                "call_1",
                "create_order",
                serde_json::json!({"customer_id": "C-1", "items": []}),
            )]),
            Reply::Text("订单创建成功".into()),
        ]));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), tools);

        let result = agent.chat(ConversationTurn::new("创建订单", None)).await.unwrap();

        assert_eq!(result.response, "订单创建成功");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.call_count(), 2);

        let requests = provider.requests();
        assert_eq!(requests[0].tools.len(), 1);
        assert!(requests[1].tools.is_empty());

        let follow_up = &requests[1].messages;
        assert_eq!(follow_up.len(), 3);
        assert_eq!(follow_up[0].role, Role::User);
        assert_eq!(follow_up[1].role, Role::Assistant);
        assert_eq!(follow_up[1].tool_calls[0].name, "create_order");
        assert_eq!(follow_up[2].role, Role::Tool);
        assert_eq!(follow_up[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(follow_up[2].content.contains("ORD-12345"));
    }

    #[tokio::test]
    async fn failing_tool_is_reported_not_raised() {
        let tools = ToolRegistry::builder()
            .register(Box::new(CountingTool::ok("get_price", serde_json::json!({"price": 100.0}))))
            .register(Box::new(CountingTool::failing("update_price", "price locked")))
            .build()
            .unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            Reply::ToolCalls(vec![
                tool_call("a", "update_price", serde_json::json!({})),
                tool_call("b", "get_price", serde_json::json!({})),
            ]),
            Reply::Text("done".into()),
        ]));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), tools);

        let result = agent.chat(ConversationTurn::new("q", None)).await.unwrap();
        assert_eq!(result.response, "done");

        let follow_up = &provider.requests()[1].messages;
        assert_eq!(follow_up.len(), 4);
        assert_eq!(follow_up[2].tool_call_id.as_deref(), Some("a"));
        assert!(follow_up[2].content.contains(r#""success":false"#));
        assert!(follow_up[2].content.contains("price locked"));
        assert_eq!(follow_up[3].tool_call_id.as_deref(), Some("b"));
        assert!(follow_up[3].content.contains(r#""success":true"#));
    }

    #[tokio::test]
    async fn unknown_tool_still_gets_a_result() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Reply::ToolCalls(vec![tool_call("x", "launch_rocket", serde_json::json!({}))]),
            Reply::Text("cannot do that".into()),
        ]));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        let result = agent.chat(ConversationTurn::new("q", None)).await.unwrap();
        assert_eq!(result.response, "cannot do that");
        let tool_msg = &provider.requests()[1].messages[2];
        assert!(tool_msg.content.contains("Tool not found: launch_rocket"));
    }

    #[tokio::test]
    async fn second_round_tool_calls_are_ignored() {
        let tools = ToolRegistry::builder()
            .register(Box::new(CountingTool::ok("get_order", serde_json::json!({}))))
            .build()
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Reply::ToolCalls(vec![tool_call("a", "get_order", serde_json::json!({}))]),
            Reply::ToolCalls(vec![tool_call("b", "get_order", serde_json::json!({}))]),
        ]));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), tools);

        let result = agent.chat(ConversationTurn::new("q", None)).await.unwrap();
        assert_eq!(result.response, "");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn provider_failure_fails_the_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![Reply::Fail(
            ProviderError::Network("connection refused".into()),
        )]));
        let agent = agent(provider, Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        let err = agent.chat(ConversationTurn::new("q", None)).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn streaming_flag_collects_chunks() {
        let provider = Arc::new(ScriptedProvider::new(vec![Reply::Chunks(vec![
            StreamChunk::text("这是", false),
            StreamChunk::text("流式", false),
            StreamChunk::text("响应", true),
        ])]));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        let result = agent
            .chat(ConversationTurn::new("q", None).streaming(true))
            .await
            .unwrap();
        assert_eq!(result.response, "这是流式响应");
        assert!(provider.requests()[0].stream);
    }

    #[tokio::test]
    async fn stream_forwards_every_chunk() {
        let provider = Arc::new(ScriptedProvider::new(vec![Reply::Chunks(vec![
            StreamChunk::text("这是", false),
            StreamChunk::text("流式", false),
            StreamChunk::text("响应", true),
        ])]));
        let agent = agent(provider, two_docs(), ToolRegistry::empty());

        let turn = ConversationTurn::new("q", Some("c1".into())).streaming(true);
        let events = drain(agent.chat_stream(turn)).await;

        let chunks: Vec<(String, bool)> = events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::Chunk { content, done, .. } => Some((content.clone(), *done)),
                _ => None,
            })
            .collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().filter(|(_, done)| *done).count(), 1);
        assert!(chunks[2].1);
        assert_eq!(chunks.iter().map(|(c, _)| c.as_str()).collect::<String>(), "这是流式响应");

        assert_eq!(
            events.last(),
            Some(&AgentStreamEvent::Done {
                conversation_id: "c1".into(),
                sources: vec![Some("doc1".into()), Some("doc2".into())],
            })
        );
    }

    #[tokio::test]
    async fn stream_runs_the_tool_cycle() {
        let tools = ToolRegistry::builder()
            .register(Box::new(CountingTool::ok(
                "create_order",
                serde_json::json!({"order_id": "ORD-12345"}),
            )))
            .build()
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Reply::Chunks(vec![
                StreamChunk::text("好的", false),
                StreamChunk::finished(vec![tool_call("c", "create_order", serde_json::json!({}))]),
            ]),
            Reply::Chunks(vec![
                StreamChunk::text("订单", false),
                StreamChunk::text("创建成功", true),
            ]),
        ]));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), tools);

        let events = drain(agent.chat_stream(ConversationTurn::new("创建订单", None))).await;
        let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec!["chunk", "chunk", "tool_result", "chunk", "chunk", "done"]
        );

        let done_flags: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::Chunk { done, .. } => Some(*done),
                _ => None,
            })
            .collect();
        assert_eq!(done_flags, vec![false, false, false, true]);

        match &events[2] {
            AgentStreamEvent::ToolResult { tool_name, success, output } => {
                assert_eq!(tool_name, "create_order");
                assert!(success);
                assert!(output.contains("ORD-12345"));
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
        assert!(provider.requests()[1].tools.is_empty());
    }

    #[tokio::test]
    async fn stream_failure_sends_error_event() {
        let provider = Arc::new(ScriptedProvider::new(vec![Reply::Fail(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let agent = agent(provider, Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        let events = drain(agent.chat_stream(ConversationTurn::new("q", None))).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            AgentStreamEvent::Error { message } => assert!(message.contains("bad key")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_without_final_chunk_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Reply::Chunks(vec![
            StreamChunk::text("partial", false),
        ])]));
        let agent = agent(provider, Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        let events = drain(agent.chat_stream(ConversationTurn::new("q", None))).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "chunk");
        assert_eq!(events[1].event_type(), "error");
    }

    #[tokio::test]
    async fn panicking_tool_does_not_sink_the_turn() {
        let sibling = CountingTool::ok("get_stock", serde_json::json!({"stock": 50}));
        let sibling_calls = sibling.calls.clone();
        let tools = ToolRegistry::builder()
            .register(Box::new(PanickingTool("explode")))
            .register(Box::new(sibling))
            .build()
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Reply::ToolCalls(vec![
                tool_call("a", "explode", serde_json::json!({})),
                tool_call("b", "get_stock", serde_json::json!({})),
            ]),
            Reply::Text("partly done".into()),
        ]));
        let agent = agent(provider.clone(), Arc::new(StaticRetriever::empty()), tools);

        let result = agent.chat(ConversationTurn::new("q", None)).await.unwrap();
        assert_eq!(result.response, "partly done");
        assert_eq!(sibling_calls.load(Ordering::SeqCst), 1);

        let follow_up = &provider.requests()[1].messages;
        assert!(follow_up[2].content.contains("tool panicked"));
        assert!(follow_up[3].content.contains(r#""success":true"#));
    }

    #[tokio::test]
    async fn stream_keeps_sibling_results_when_a_tool_panics() {
        let tools = ToolRegistry::builder()
            .register(Box::new(PanickingTool("explode")))
            .register(Box::new(CountingTool::ok("get_stock", serde_json::json!({"stock": 50}))))
            .build()
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Reply::ToolCalls(vec![
                tool_call("a", "explode", serde_json::json!({})),
                tool_call("b", "get_stock", serde_json::json!({})),
            ]),
            Reply::Text("partly done".into()),
        ]));
        let agent = agent(provider, Arc::new(StaticRetriever::empty()), tools);

        let events = drain(agent.chat_stream(ConversationTurn::new("q", None))).await;
        let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["chunk", "tool_result", "tool_result", "chunk", "done"]);

        let outcomes: Vec<(&str, bool)> = events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::ToolResult { tool_name, success, .. } => {
                    Some((tool_name.as_str(), *success))
                }
                _ => None,
            })
            .collect();
        assert_eq!(outcomes, vec![("explode", false), ("get_stock", true)]);
    }

    #[tokio::test]
    async fn stream_turn_that_panics_sends_error_event() {
        // No scripted reply: the provider panics on the first call.
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let agent = agent(provider, Arc::new(StaticRetriever::empty()), ToolRegistry::empty());

        let events = drain(agent.chat_stream(ConversationTurn::new("q", None))).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            AgentStreamEvent::Error { message } => assert!(message.contains("panicked")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_the_receiver_closes_the_model_stream() {
        let provider = Arc::new(HeldStreamProvider::new());
        let agent = RagAgent::new(
            provider.clone(),
            Arc::new(StaticRetriever::empty()),
            Arc::new(ToolRegistry::empty()),
            "mock-model",
        );

        let mut rx = agent.chat_stream(ConversationTurn::new("q", None));
        let model = provider.opened().await;
        model.send(Ok(StreamChunk::text("a", false))).await.unwrap();
        match rx.recv().await {
            Some(AgentStreamEvent::Chunk { content, done, .. }) => {
                assert_eq!(content, "a");
                assert!(!done);
            }
            other => panic!("expected chunk, got {other:?}"),
        }

        drop(rx);
        let _ = model.send(Ok(StreamChunk::text("b", false))).await;
        tokio::time::timeout(Duration::from_secs(5), model.closed())
            .await
            .expect("model stream was not dropped");
        assert!(model.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_times_out_between_chunks() {
        let provider = Arc::new(HeldStreamProvider::new());
        let agent = RagAgent::new(
            provider.clone(),
            Arc::new(StaticRetriever::empty()),
            Arc::new(ToolRegistry::empty()),
            "mock-model",
        )
        .with_model_timeout(Duration::from_secs(1));

        let rx = agent.chat_stream(ConversationTurn::new("q", None));
        let model = provider.opened().await;
        model.send(Ok(StreamChunk::text("a", false))).await.unwrap();

        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "chunk");
        match &events[1] {
            AgentStreamEvent::Error { message } => {
                assert!(message.contains("model call exceeded 1s"), "{message}");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn top_k_is_passed_to_retrieval() {
        let retriever = two_docs();
        let provider = Arc::new(ScriptedProvider::text("ok"));
        let agent = agent(provider, retriever.clone(), ToolRegistry::empty()).with_top_k(1);

        let result = agent.chat(ConversationTurn::new("q", None)).await.unwrap();
        assert_eq!(result.sources, vec![Some("doc1".to_string())]);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
    }
}
