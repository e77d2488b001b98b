//! The orchestration loop for ragent.
//!
//! A turn retrieves context, builds one prompt, calls the model with the
//! registry's tools and, when the model asks for tools, runs them and calls
//! the model once more. See [`RagAgent`].

pub mod rag;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use rag::{RagAgent, TurnState};
pub use stream_event::AgentStreamEvent;
