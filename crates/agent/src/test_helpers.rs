//! Shared test doubles for the orchestration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragent_core::error::{ProviderError, ToolError};
use ragent_core::message::{Message, MessageToolCall};
use ragent_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use ragent_core::retrieval::{Retrieve, RetrievedDocument};
use ragent_core::tool::Tool;
use tokio::sync::mpsc;

/// One scripted model reply.
pub enum Reply {
    Text(String),
    ToolCalls(Vec<MessageToolCall>),
    Chunks(Vec<StreamChunk>),
    Fail(ProviderError),
}

/// Returns the scripted replies in order and records every request.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![Reply::Text(text.into())])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> Reply {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no reply for call #{}", requests.len()))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let message = match self.next(request) {
            Reply::Text(text) => Message::assistant(text),
            Reply::ToolCalls(calls) => Message::assistant_tool_calls("", calls),
            Reply::Chunks(chunks) => {
                let text: String = chunks.iter().filter_map(|c| c.content.clone()).collect();
                let calls = chunks.into_iter().flat_map(|c| c.tool_calls).collect();
                Message::assistant_tool_calls(text, calls)
            }
            Reply::Fail(e) => return Err(e),
        };
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "scripted-model".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let chunks = match self.next(request) {
            Reply::Text(text) => vec![StreamChunk::text(text, true)],
            Reply::ToolCalls(calls) => vec![StreamChunk::finished(calls)],
            Reply::Chunks(chunks) => chunks,
            Reply::Fail(e) => return Err(e),
        };
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            let _ = tx.send(Ok(chunk)).await;
        }
        Ok(rx)
    }
}

/// Opens a stream whose sending half stays with the provider, so a test can
/// feed chunks by hand, stall, or watch the consumer side close it.
#[derive(Default)]
pub struct HeldStreamProvider {
    sender: Mutex<Option<mpsc::Sender<Result<StreamChunk, ProviderError>>>>,
}

impl HeldStreamProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the agent has opened the stream.
    pub async fn opened(&self) -> mpsc::Sender<Result<StreamChunk, ProviderError>> {
        loop {
            let sender = self.sender.lock().unwrap().clone();
            if let Some(sender) = sender {
                return sender;
            }
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Provider for HeldStreamProvider {
    fn name(&self) -> &str {
        "held"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("held provider only streams".into()))
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (tx, rx) = mpsc::channel(8);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

/// Returns the same documents for every query.
pub struct StaticRetriever {
    docs: Vec<RetrievedDocument>,
    pub calls: AtomicUsize,
}

impl StaticRetriever {
    pub fn new(docs: Vec<RetrievedDocument>) -> Self {
        Self { docs, calls: AtomicUsize::new(0) }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Retrieve for StaticRetriever {
    async fn retrieve(&self, _query: &str, top_k: usize) -> Vec<RetrievedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.docs.iter().take(top_k).cloned().collect()
    }
}

/// A tool that counts invocations and answers with a fixed payload, or fails.
/// Keep a clone of `calls` before boxing it into a registry.
pub struct CountingTool {
    name: &'static str,
    reply: Result<serde_json::Value, String>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn ok(name: &'static str, reply: serde_json::Value) -> Self {
        Self { name, reply: Ok(reply), calls: Arc::default() }
    }

    pub fn failing(name: &'static str, reason: &str) -> Self {
        Self { name, reply: Err(reason.into()), calls: Arc::default() }
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Counts its calls"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name.into(),
            reason,
        })
    }
}

/// A tool whose handler panics.
pub struct PanickingTool(pub &'static str);

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        self.0
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let empty: Vec<serde_json::Value> = Vec::new();
        Ok(empty[0].clone())
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}
