//! Model provider implementations for ragent.
//!
//! All providers implement the `ragent_core::Provider` trait.
//! The router selects the chat and embedding backends from configuration.

mod http;

pub mod anthropic;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ModelBackends, build_from_config};
