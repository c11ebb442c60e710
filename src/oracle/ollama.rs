//! Ollama chat API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ChatRequest, LanguageModel};
use crate::core::config::ModelConfig;
use crate::core::errors::{Result, TestgapError};

/// Ollama `/api/chat` request body
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation, a single user turn here
    pub messages: Vec<OllamaMessage>,
    /// Always `false`; replies are read whole
    pub stream: bool,
    /// Sampling options
    pub options: OllamaOptions,
}

/// Chat message exchanged with Ollama.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

/// Sampling options understood by Ollama.
#[derive(Debug, Serialize)]
pub struct OllamaOptions {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of generated tokens
    pub num_predict: u32,
}

/// Non-streaming `/api/chat` response.
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    /// Assistant reply
    pub message: OllamaMessage,
    /// Generation finished
    #[serde(default)]
    pub done: bool,
}

impl OllamaChatRequest {
    /// Build the wire request for `model` from a chat request
    pub fn from_chat(model: &str, request: &ChatRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: request.options.temperature,
                num_predict: request.options.max_tokens,
            },
        }
    }
}

/// Language model backed by a local Ollama server
pub struct OllamaClient {
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client from model configuration
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TestgapError::model(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.name.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Full URL of the chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.endpoint)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = OllamaChatRequest::from_chat(&self.model, request);
        debug!(
            "Sending {} prompt chars to {} (temperature {}, max {} tokens)",
            request.prompt.len(),
            self.model,
            request.options.temperature,
            request.options.max_tokens
        );

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| TestgapError::model_named(format!("Ollama request failed: {e}"), &self.model))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TestgapError::model_named(
                format!("Ollama API error ({status}): {error_text}"),
                &self.model,
            ));
        }

        let chat: OllamaChatResponse = response.json().await.map_err(|e| {
            TestgapError::model_named(format!("Failed to parse Ollama response: {e}"), &self.model)
        })?;

        Ok(chat.message.content)
    }
}
