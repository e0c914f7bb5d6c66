//! Gemini REST backend.
//!
//! Talks to `generativelanguage.googleapis.com` directly so the request can
//! carry `safetySettings`: financial statements trip the default filters
//! often enough (figures next to words like "loss" or "default") that every
//! category is set to `BLOCK_NONE`.
//!
//! Authentication follows [`Credentials`]: an API key goes in the
//! `x-goog-api-key` header, a service-account key is exchanged for an OAuth
//! bearer token through `gcp_auth`.

use super::{GenerationOptions, ModelInfo, VisionModel};
use crate::config::{Credentials, ServiceConfig};
use crate::error::{ModelError, Pdf2TablesError};
use crate::output::PageImage;
use crate::pipeline::encode::to_base64;
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Public endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/generative-language";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

enum Auth {
    ApiKey(String),
    ServiceAccount(Arc<CustomServiceAccount>),
}

/// A Gemini model reached over HTTPS.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    auth: Auth,
}

impl std::fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiModel {
    /// Build a client from the startup configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, Pdf2TablesError> {
        Self::new(&config.credentials, &config.model, DEFAULT_BASE_URL)
    }

    pub fn new(
        credentials: &Credentials,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, Pdf2TablesError> {
        let auth = match credentials {
            Credentials::ApiKey(key) => Auth::ApiKey(key.clone()),
            Credentials::ServiceAccountFile(path) => {
                let account = CustomServiceAccount::from_file(path).map_err(|e| {
                    Pdf2TablesError::Config(format!(
                        "Cannot load service-account key '{}': {e}",
                        path.display()
                    ))
                })?;
                Auth::ServiceAccount(Arc::new(account))
            }
            Credentials::ServiceAccountJson(json) => {
                let account = CustomServiceAccount::from_json(json).map_err(|e| {
                    Pdf2TablesError::Config(format!("Cannot load service-account key JSON: {e}"))
                })?;
                Auth::ServiceAccount(Arc::new(account))
            }
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Pdf2TablesError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            auth,
        })
    }

    /// `models/<id>` resource path for the configured model.
    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ModelError> {
        match &self.auth {
            Auth::ApiKey(key) => Ok(request.header("x-goog-api-key", key)),
            Auth::ServiceAccount(account) => {
                let token = account
                    .token(&[OAUTH_SCOPE])
                    .await
                    .map_err(|e| ModelError::Auth(e.to_string()))?;
                Ok(request.bearer_auth(token.as_str()))
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ModelError> {
        let response = self.authorize(request).await?.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&PageImage>,
        options: &GenerationOptions,
    ) -> Result<String, ModelError> {
        let body = build_request(prompt, image, options);
        let url = format!("{}/{}:generateContent", self.base_url, self.model_path());
        debug!(
            "generateContent: {} prompt chars, image: {}",
            prompt.len(),
            image.map(|i| i.page_number).map_or("none".to_string(), |p| format!("page {p}"))
        );

        let response: GenerateContentResponse =
            self.send(self.client.post(&url).json(&body)).await?;
        response.into_text()
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ModelError> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("pageSize", "1000")]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ListModelsResponse = self.send(request).await?;
            models.extend(
                page.models
                    .into_iter()
                    .filter(|m| {
                        m.supported_generation_methods
                            .iter()
                            .any(|method| method == "generateContent")
                    })
                    .map(ModelInfo::from),
            );
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

fn build_request<'a>(
    prompt: &'a str,
    image: Option<&PageImage>,
    options: &GenerationOptions,
) -> GenerateContentRequest<'a> {
    let mut parts = vec![Part::Text { text: prompt }];
    if let Some(image) = image {
        parts.push(Part::Inline {
            inline_data: InlineData {
                mime_type: "image/png",
                data: to_base64(&image.png),
            },
        });
    }

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
        },
        safety_settings: SAFETY_CATEGORIES
            .into_iter()
            .map(|category| SafetySetting {
                category,
                threshold: "BLOCK_NONE",
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, ModelError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ModelError::EmptyResponse {
                reason: block_reason,
            });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() && candidate.finish_reason.as_deref() != Some("STOP") {
            return Err(ModelError::EmptyResponse {
                reason: candidate.finish_reason.or(block_reason),
            });
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<RemoteModel>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteModel {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    input_token_limit: Option<u64>,
    output_token_limit: Option<u64>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl From<RemoteModel> for ModelInfo {
    fn from(m: RemoteModel) -> Self {
        ModelInfo {
            name: m.name,
            display_name: m.display_name,
            description: m.description,
            input_token_limit: m.input_token_limit,
            output_token_limit: m.output_token_limit,
            supported_generation_methods: m.supported_generation_methods,
        }
    }
}

/// Pull `error.message` out of a Google API error body, or fall back to the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> GenerationOptions {
        GenerationOptions {
            temperature: 0.1,
            max_output_tokens: Some(8192),
        }
    }

    #[test]
    fn request_with_image_has_inline_png_and_block_none() {
        let image = PageImage {
            page_number: 2,
            png: vec![0x89, b'P', b'N', b'G'],
        };
        let body = serde_json::to_value(build_request("extract", Some(&image), &options())).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "extract");
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(
            body["contents"][0]["parts"][1]["inlineData"]["data"],
            to_base64(&image.png)
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn text_only_request_omits_unset_ceiling() {
        let opts = GenerationOptions {
            temperature: 0.1,
            max_output_tokens: None,
        };
        let body = serde_json::to_value(build_request("structure", None, &opts)).unwrap();
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "<table>"}, {"text": "</table>"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "<table></table>");
    }

    #[test]
    fn stop_with_no_text_is_an_empty_answer() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "STOP"}]
        }))
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "OTHER"}
        }))
        .unwrap();
        match response.into_text() {
            Err(ModelError::EmptyResponse { reason }) => assert_eq!(reason.as_deref(), Some("OTHER")),
            other => panic!("expected EmptyResponse, got {other:?}"),
        }
    }

    #[test]
    fn api_error_message_extraction() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid");
        assert_eq!(api_error_message("  bad gateway "), "bad gateway");
    }

    #[test]
    fn model_path_prefixing() {
        let model = GeminiModel::new(
            &Credentials::ApiKey("k".into()),
            "gemini-2.0-flash",
            "https://example.test/v1beta/",
        )
        .unwrap();
        assert_eq!(model.model_path(), "models/gemini-2.0-flash");
        assert_eq!(model.base_url, "https://example.test/v1beta");

        let prefixed =
            GeminiModel::new(&Credentials::ApiKey("k".into()), "models/x", DEFAULT_BASE_URL).unwrap();
        assert_eq!(prefixed.model_path(), "models/x");
    }
}
