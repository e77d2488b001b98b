//! # ragent core
//!
//! Domain types, traits, and error definitions for the ragent
//! retrieval-augmented generation service. This crate has no framework
//! dependencies; it defines the model every other crate implements against.
//!
//! Model backends, vector stores and tools are traits here. Implementations
//! live in their own crates, which keeps mocks trivial in tests.

pub mod error;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod retrieval;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RetrievalError, ToolError};
pub use message::{ConversationId, Message, MessageToolCall, Role};
pub use provider::{
    ChunkReceiver, EmbeddingRequest, EmbeddingResponse, ModelResponse, Provider, ProviderRequest,
    ProviderResponse, StreamChunk, ToolDefinition, Usage,
};
pub use retrieval::{Retrieve, RetrievedDocument, VectorRow, VectorStore};
pub use tool::{Tool, ToolCall, ToolCallResult, ToolGroup, ToolRegistry, ToolRegistryBuilder};
pub use turn::{ConversationTurn, TurnResult};
