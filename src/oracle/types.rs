//! Model-facing request types and the language model seam.

use async_trait::async_trait;

use crate::core::config::GenerationOptions;
use crate::core::errors::Result;

/// A single-turn chat request: one user message plus sampling options
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// User message text
    pub prompt: String,
    /// Sampling options
    pub options: GenerationOptions,
}

impl ChatRequest {
    /// Create a request from a prompt and options
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

/// A chat-completion backend: prompt in, text out.
///
/// Output is not deterministic; low temperatures dampen variation for code
/// generation but nothing here relies on repeatability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier of the model answering requests
    fn model_name(&self) -> &str;

    /// Generate a reply for `request`
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}
