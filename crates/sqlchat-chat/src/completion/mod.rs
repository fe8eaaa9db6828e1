//! Text-completion service seam.
//!
//! The pipeline only needs `complete(messages) -> text`. Providers are
//! selected from `[llm] provider` in the configuration.

pub mod openai;
pub mod scripted;

pub use openai::OpenAiCompletion;
pub use scripted::ScriptedCompletion;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use sqlchat_core::config::LlmConfig;

use crate::types::PromptMessage;

/// Errors from a completion provider.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("provider returned no content")]
    EmptyResponse,
    #[error("invalid provider configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Provider name reported by the health endpoint.
    fn name(&self) -> &str;

    /// Complete a chat-style message sequence and return the reply text.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CompletionError>;
}

pub type ArcCompletion = Arc<dyn CompletionService>;

/// Build the provider named in the configuration.
pub fn from_config(config: &LlmConfig) -> Result<ArcCompletion, CompletionError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompletion::from_config(config)?)),
        "scripted" => Ok(Arc::new(ScriptedCompletion::default())),
        other => Err(CompletionError::Config(format!(
            "unknown provider '{}'. Must be one of: openai, scripted",
            other
        ))),
    }
}
