//! Tool trait, tool groups and the registry that dispatches calls.
//!
//! Tools are grouped by business area. Each group contributes its tools to a
//! [`ToolRegistryBuilder`]; `build()` merges them into an immutable
//! [`ToolRegistry`] that is shared by `Arc` for the lifetime of the process.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl From<&MessageToolCall> for ToolCall {
    /// Parse the wire arguments. Unparseable text is passed through as a JSON
    /// string so the handler rejects it as a failed result.
    fn from(call: &MessageToolCall) -> Self {
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()))
        };
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }
    }
}

/// The normalized outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,

    pub tool_name: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn succeeded(call: &ToolCall, result: serde_json::Value) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// The payload shown to the model in the tool-result message.
    pub fn model_content(&self) -> String {
        let body = if self.success {
            serde_json::json!({
                "tool_name": self.tool_name,
                "success": true,
                "result": self.result,
            })
        } else {
            serde_json::json!({
                "tool_name": self.tool_name,
                "success": false,
                "error": self.error,
            })
        };
        body.to_string()
    }
}

/// A single business capability the model may call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_order").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A named set of tools contributed to the registry as a unit.
pub trait ToolGroup {
    fn name(&self) -> &str;

    fn tools(&self) -> Vec<Box<dyn Tool>>;
}

/// Bind a JSON argument object to a tool's typed parameter struct.
pub fn parse_args<T: DeserializeOwned>(
    tool_name: &str,
    arguments: serde_json::Value,
) -> std::result::Result<T, ToolError> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::InvalidArguments(format!("{tool_name}: {e}")))
}

/// Collects tools from groups. Nothing is checked until [`build`](Self::build).
pub struct ToolRegistryBuilder {
    tools: Vec<Box<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Bound on each handler invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn register_group(mut self, group: &dyn ToolGroup) -> Self {
        let tools = group.tools();
        debug!(group = group.name(), count = tools.len(), "Registering tool group");
        self.tools.extend(tools);
        self
    }

    /// Merge all contributions. Two tools with the same name are rejected.
    pub fn build(self) -> std::result::Result<ToolRegistry, ToolError> {
        let mut tools: BTreeMap<String, Box<dyn Tool>> = BTreeMap::new();
        for tool in self.tools {
            let name = tool.name().to_string();
            if tools.contains_key(&name) {
                return Err(ToolError::DuplicateName(name));
            }
            tools.insert(name, tool);
        }
        Ok(ToolRegistry {
            tools,
            timeout: self.timeout,
        })
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable name → tool map that also dispatches calls.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Model-facing definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one call.
    ///
    /// Only an unknown name is an `Err`. Argument errors, handler failures,
    /// panics and timeouts come back as a result with `success == false`.
    pub async fn execute(
        &self,
        call: &ToolCall,
    ) -> std::result::Result<ToolCallResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let started = Instant::now();
        let handler = AssertUnwindSafe(tool.execute(call.arguments.clone())).catch_unwind();
        let outcome = tokio::time::timeout(self.timeout, handler).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(Ok(value))) => {
                debug!(tool = %call.name, duration_ms, "Tool succeeded");
                ToolCallResult::succeeded(call, value)
            }
            Ok(Ok(Err(e))) => {
                warn!(tool = %call.name, error = %e, duration_ms, "Tool failed");
                ToolCallResult::failed(call, e.to_string())
            }
            Ok(Err(payload)) => {
                let reason = panic_message(payload.as_ref());
                warn!(tool = %call.name, panic = %reason, duration_ms, "Tool panicked");
                ToolCallResult::failed(call, format!("tool panicked: {reason}"))
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                };
                warn!(tool = %call.name, error = %e, "Tool timed out");
                ToolCallResult::failed(call, e.to_string())
            }
        };
        Ok(result)
    }

    /// Execute every call concurrently. One result per call, in input order;
    /// unknown tools become failed results.
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolCallResult> {
        join_all(calls.iter().map(|call| async move {
            match self.execute(call).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool dispatch failed");
                    ToolCallResult::failed(call, e.to_string())
                }
            }
        }))
        .await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
