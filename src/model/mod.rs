//! The external model as an opaque capability.
//!
//! Both pipeline stages talk to a [`VisionModel`]: given a prompt and an
//! optional page image, produce text. Two backends ship with the crate:
//!
//! - [`gemini::GeminiModel`] — the Gemini REST API over `reqwest`, with safety
//!   filtering disabled and a models listing.
//! - [`provider::LlmProviderModel`] — any `edgequake-llm` provider (OpenAI,
//!   Anthropic, Ollama, …).

pub mod gemini;
pub mod provider;

use crate::error::ModelError;
use crate::output::PageImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling settings for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

/// One entry of a backend's model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub input_token_limit: Option<u64>,
    pub output_token_limit: Option<u64>,
    pub supported_generation_methods: Vec<String>,
}

/// A generative model able to read page images.
///
/// Implementations must be cheap to share: the pipeline holds one behind an
/// `Arc` for the life of the process and calls it from concurrent tasks.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, reported by the health endpoint.
    fn model_name(&self) -> &str;

    /// Run one generation. `image`, when present, is attached as a PNG.
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&PageImage>,
        options: &GenerationOptions,
    ) -> Result<String, ModelError>;

    /// Models offered by the backend that support content generation.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ModelError> {
        Err(ModelError::Unsupported {
            backend: self.model_name().to_string(),
            operation: "list_models",
        })
    }
}
