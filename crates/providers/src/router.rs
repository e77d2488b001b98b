//! Backend selection: picks the chat and embedding providers from config.

use std::sync::Arc;

use ragent_config::{Backend, ModelConfig};
use ragent_core::error::ProviderError;
use ragent_core::provider::Provider;
use tracing::{info, warn};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// The providers a running service talks to.
#[derive(Clone)]
pub struct ModelBackends {
    /// Answers chat completions.
    pub chat: Arc<dyn Provider>,
    /// Model name passed with every chat request.
    pub chat_model: String,
    /// Produces query and document embeddings.
    pub embedder: Arc<dyn Provider>,
}

impl std::fmt::Debug for ModelBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackends")
            .field("chat", &self.chat.name())
            .field("chat_model", &self.chat_model)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

fn configured(key: &Option<String>) -> Option<&str> {
    key.as_deref().filter(|k| !k.trim().is_empty())
}

/// Build providers from configuration.
///
/// In `auto` mode Anthropic is preferred when its key is set, then OpenAI.
/// Fails with `NotConfigured` when the chosen backend has no credentials.
pub fn build_from_config(config: &ModelConfig) -> Result<ModelBackends, ProviderError> {
    let openai = configured(&config.openai_api_key).map(|key| {
        Arc::new(
            OpenAiCompatProvider::new("openai", &config.openai_base_url, key)
                .with_timeout(config.timeout()),
        ) as Arc<dyn Provider>
    });
    let anthropic = configured(&config.anthropic_api_key).map(|key| {
        Arc::new(AnthropicProvider::new(key).with_timeout(config.timeout())) as Arc<dyn Provider>
    });

    let (chat, chat_model): (Arc<dyn Provider>, String) = match (config.backend, &anthropic, &openai) {
        (Backend::Anthropic | Backend::Auto, Some(p), _) => (p.clone(), config.anthropic_model.clone()),
        (Backend::Openai | Backend::Auto, _, Some(p)) => (p.clone(), config.chat_model.clone()),
        (Backend::Anthropic, None, _) => {
            return Err(ProviderError::NotConfigured(
                "backend 'anthropic' selected but ANTHROPIC_API_KEY is not set".into(),
            ));
        }
        (Backend::Openai, _, None) => {
            return Err(ProviderError::NotConfigured(
                "backend 'openai' selected but OPENAI_API_KEY is not set".into(),
            ));
        }
        (Backend::Auto, None, None) => {
            return Err(ProviderError::NotConfigured(
                "no model backend configured: set ANTHROPIC_API_KEY or OPENAI_API_KEY".into(),
            ));
        }
    };

    let embedder = match openai {
        Some(p) => p,
        None => {
            warn!(
                provider = chat.name(),
                "No embedding-capable backend configured; retrieval will return no context"
            );
            chat.clone()
        }
    };

    info!(chat = chat.name(), model = %chat_model, embedder = embedder.name(), "Model backends ready");

    Ok(ModelBackends {
        chat,
        chat_model,
        embedder,
    })
}
