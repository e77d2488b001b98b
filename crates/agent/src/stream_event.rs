//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps provider-level stream chunks into the events the
//! gateway forwards to WebSocket clients.

use ragent_core::message::ConversationId;
use serde::{Deserialize, Serialize};

/// Events emitted while a streaming turn runs.
///
/// Wire protocol:
/// - `chunk`       partial model text; `done` is set on the turn's last chunk
/// - `tool_result` a tool call finished between the two model calls
/// - `done`        the turn is complete
/// - `error`       the turn failed; nothing follows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    Chunk {
        content: String,
        conversation_id: ConversationId,
        done: bool,
    },

    ToolResult {
        tool_name: String,
        success: bool,
        output: String,
    },

    Done {
        conversation_id: ConversationId,
        sources: Vec<Option<String>>,
    },

    Error { message: String },
}

impl AgentStreamEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// No further events follow a terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_wire_format() {
        let event = AgentStreamEvent::Chunk {
            content: "Hello".into(),
            conversation_id: "abc".into(),
            done: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "chunk",
                "content": "Hello",
                "conversation_id": "abc",
                "done": false
            })
        );
    }

    #[test]
    fn done_carries_sources() {
        let event = AgentStreamEvent::Done {
            conversation_id: "abc".into(),
            sources: vec![Some("doc1".into()), None],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""sources":["doc1",null]"#));
        assert!(event.is_terminal());
    }

    #[test]
    fn event_type_names() {
        let tool = AgentStreamEvent::ToolResult {
            tool_name: "get_price".into(),
            success: true,
            output: "{}".into(),
        };
        assert_eq!(tool.event_type(), "tool_result");
        assert!(!tool.is_terminal());

        let err = AgentStreamEvent::Error { message: "boom".into() };
        assert_eq!(err.event_type(), "error");
        assert!(err.is_terminal());
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"chunk","content":"hi","conversation_id":"c1","done":true}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::Chunk { content, conversation_id, done } => {
                assert_eq!(content, "hi");
                assert_eq!(conversation_id.as_str(), "c1");
                assert!(done);
            }
            _ => panic!("Wrong variant"),
        }
    }
}
