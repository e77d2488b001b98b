//! One conversational turn: the request and its outcome.

use serde::{Deserialize, Serialize};

use crate::message::ConversationId;
use crate::retrieval::RetrievedDocument;

/// A single user message to answer. Turns are stateless; the id is only
/// echoed back.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub conversation_id: ConversationId,
    pub message: String,
    /// Request the model's token stream instead of a single completion.
    pub streaming: bool,
}

impl ConversationTurn {
    pub fn new(message: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            conversation_id: ConversationId::or_generate(conversation_id),
            message: message.into(),
            streaming: false,
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// The completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub response: String,
    pub conversation_id: ConversationId,
    /// One entry per retrieved document, `None` where it had no source.
    pub sources: Vec<Option<String>>,
}

/// Sources of the retrieved documents, in retrieval order, index-aligned
/// with the documents.
pub fn collect_sources(docs: &[RetrievedDocument]) -> Vec<Option<String>> {
    docs.iter().map(|d| d.source.clone()).collect()
}
