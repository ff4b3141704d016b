//! Model client boundary
//!
//! The executor depends only on the [`ChatModel`] contract: an ordered
//! conversation context plus one new message, a bounded wait, and either
//! reply text or a classified failure.

mod error;
mod gemini;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiChat;

use crate::transcript::Turn;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Reply from a model invocation.
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// Reply text; `None` when the endpoint returned no usable candidate text.
    pub text: Option<String>,
    pub usage: Usage,
}

/// Token usage reported by the endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub reply_tokens: u64,
}

/// Common interface for chat model backends
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one message with the given conversation context.
    async fn send_message(
        &self,
        context: &[Turn],
        text: &str,
        timeout: Duration,
    ) -> Result<ModelReply, LlmError>;

    /// Identifier of the underlying hosted model revision.
    fn model_name(&self) -> &str;
}

/// Logging wrapper for chat models
pub struct LoggingModel {
    inner: Arc<dyn ChatModel>,
    model_name: String,
}

impl LoggingModel {
    pub fn new(inner: Arc<dyn ChatModel>) -> Self {
        let model_name = inner.model_name().to_string();
        Self { inner, model_name }
    }
}

#[async_trait]
impl ChatModel for LoggingModel {
    async fn send_message(
        &self,
        context: &[Turn],
        text: &str,
        timeout: Duration,
    ) -> Result<ModelReply, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.send_message(context, text, timeout).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    model = %self.model_name,
                    duration_ms = %duration.as_millis(),
                    context_turns = context.len(),
                    prompt_tokens = reply.usage.prompt_tokens,
                    reply_tokens = reply.usage.reply_tokens,
                    empty = reply.text.is_none(),
                    "model request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_name,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.label(),
                    error = %e.message,
                    "model request failed"
                );
            }
        }

        result
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
