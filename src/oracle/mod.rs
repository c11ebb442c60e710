//! Language model integration.
//!
//! The oracle turns coverage gaps into pytest code, proposes repairs for
//! failing runs, and writes the free-text analysis and recommendations for
//! the report. Every model call goes through the [`LanguageModel`] trait so
//! the pipeline can run against a fake in tests.

pub mod ollama;
pub mod prompts;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::config::ModelConfig;
use crate::core::errors::Result;

pub use ollama::{OllamaChatRequest, OllamaChatResponse, OllamaClient, OllamaMessage};
pub use prompts::ProjectContext;
pub use types::{ChatRequest, LanguageModel};

/// Remove Markdown code fences a model may wrap its answer in.
///
/// Only the fence markers go; the code between them is kept verbatim.
pub fn strip_code_fences(text: &str) -> String {
    text.trim()
        .replace("```python", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Generates and repairs tests through a language model
#[derive(Clone)]
pub struct TestSynthesizer {
    model: Arc<dyn LanguageModel>,
    config: ModelConfig,
}

impl TestSynthesizer {
    /// Create a synthesizer over a model backend
    pub fn new(model: Arc<dyn LanguageModel>, config: ModelConfig) -> Self {
        Self { model, config }
    }

    /// Name of the backing model
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Write a pytest test for one function.
    ///
    /// The reply is fence-stripped and otherwise returned untouched; whether
    /// it is valid Python is left to the validation loop.
    pub async fn synthesize(
        &self,
        function_name: &str,
        function_code: &str,
        existing_tests: &str,
    ) -> Result<String> {
        info!("Generating test for: {}", function_name);
        let prompt = prompts::build_generation_prompt(function_name, function_code, existing_tests);
        let reply = self
            .model
            .complete(&ChatRequest::new(prompt, self.config.generation))
            .await?;

        let code = strip_code_fences(&reply);
        debug!("Model returned {} chars for {}", code.len(), function_name);
        Ok(code)
    }

    /// Propose replacement definitions for failing tests in the latest block
    pub async fn repair(
        &self,
        test_output: &str,
        test_file: &str,
        latest_tests: &str,
    ) -> Result<String> {
        let prompt = prompts::build_repair_prompt(test_output, test_file, latest_tests);
        let reply = self
            .model
            .complete(&ChatRequest::new(prompt, self.config.repair))
            .await?;
        Ok(strip_code_fences(&reply))
    }

    /// Short written analysis of the project's test situation
    pub async fn analyze(&self, context: &ProjectContext<'_>) -> Result<String> {
        let prompt = prompts::build_analysis_prompt(context);
        let reply = self
            .model
            .complete(&ChatRequest::new(prompt, self.config.analysis))
            .await?;
        Ok(reply.trim().to_string())
    }

    /// Numbered recommendations derived from an analysis
    pub async fn recommend(&self, analysis: &str) -> Result<String> {
        let prompt = prompts::build_recommendations_prompt(analysis);
        let reply = self
            .model
            .complete(&ChatRequest::new(prompt, self.config.recommendations))
            .await?;
        Ok(reply.trim().to_string())
    }
}
