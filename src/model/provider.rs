//! `edgequake-llm` backend: any provider the factory knows about.

use super::{GenerationOptions, VisionModel};
use crate::error::{ModelError, Pdf2TablesError};
use crate::output::PageImage;
use crate::pipeline::encode::to_image_data;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// A [`VisionModel`] backed by an `edgequake-llm` provider.
pub struct LlmProviderModel {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl LlmProviderModel {
    /// Wrap a pre-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Instantiate a named provider (`openai`, `anthropic`, `gemini`, `ollama`, …).
    ///
    /// The provider reads its own API key from the environment.
    pub fn from_factory(provider_name: &str, model: &str) -> Result<Self, Pdf2TablesError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            Pdf2TablesError::Config(format!(
                "LLM provider '{provider_name}' is not configured: {e}"
            ))
        })?;
        Ok(Self::new(provider, model))
    }
}

#[async_trait]
impl VisionModel for LlmProviderModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&PageImage>,
        options: &GenerationOptions,
    ) -> Result<String, ModelError> {
        let message = match image {
            Some(image) => ChatMessage::user_with_images(prompt, vec![to_image_data(image)]),
            None => ChatMessage::user(prompt),
        };

        let response = self
            .provider
            .chat(&[message], Some(&build_options(options)))
            .await
            .map_err(|e| ModelError::Provider(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.model, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Map our sampling settings onto `CompletionOptions`.
fn build_options(options: &GenerationOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: options.max_output_tokens.map(|n| n as usize),
        ..Default::default()
    }
}
