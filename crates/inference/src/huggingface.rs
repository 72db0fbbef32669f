//! Hugging Face Inference API client.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ApiKey, CaptionError, ImageData, InferenceClient, ModelId};
use reqwest::{header, Client, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::InferenceError;

/// Hosted Inference API root.
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Longest raw body kept in an error message.
const MAX_BODY_IN_ERROR: usize = 256;

/// Connection settings for the Inference API.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    /// API root; models are addressed as `{base_url}/models/{model}`.
    pub base_url: Url,

    /// Access token sent as a bearer credential.
    pub access_token: ApiKey,

    /// Per-request timeout. Cold models can take tens of seconds.
    pub timeout: Duration,
}

/// Image-to-text client for the Hugging Face Inference API.
#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    http: Client,
    config: HuggingFaceConfig,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: serde_json::Value,
    #[serde(default)]
    estimated_time: Option<f64>,
}

impl ProviderError {
    fn message(&self) -> String {
        let base = match &self.error {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        };
        match self.estimated_time {
            Some(secs) => format!("{base} (estimated time {secs:.0}s)"),
            None => base,
        }
    }
}

/// The endpoint answers with a list for most pipelines and a bare object for
/// some; errors can arrive with a 200.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageToTextResponse {
    Many(Vec<GeneratedText>),
    One(GeneratedText),
    Error(ProviderError),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl HuggingFaceClient {
    /// Builds a client with the configured timeout.
    pub fn new(config: HuggingFaceConfig) -> Result<Self, InferenceError> {
        if config.base_url.cannot_be_a_base() {
            return Err(InferenceError::InvalidUrl(config.base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("captioner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn model_url(&self, model: &ModelId) -> Result<Url, InferenceError> {
        let mut url = self.config.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| InferenceError::InvalidUrl(self.config.base_url.to_string()))?;
            path.pop_if_empty()
                .push("models")
                .extend(model.as_str().split('/'));
        }
        Ok(url)
    }

    /// Sends `image` to `model` and returns the first generated text.
    pub async fn caption_image(
        &self,
        image: &ImageData,
        model: &ModelId,
    ) -> Result<String, InferenceError> {
        let url = self.model_url(model)?;
        let content_type = image
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");

        let response = self
            .http
            .post(url)
            .header(header::AUTHORIZATION, self.config.access_token.bearer())
            .header(header::CONTENT_TYPE, content_type)
            .body(image.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderError>(&body)
                .map(|e| e.message())
                .unwrap_or_else(|_| truncate(body.trim()));
            return Err(InferenceError::Provider {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: ImageToTextResponse = serde_json::from_str(&body)
            .map_err(|_| InferenceError::UnexpectedBody(truncate(body.trim())))?;

        match parsed {
            ImageToTextResponse::Many(items) => items
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .ok_or(InferenceError::EmptyResponse),
            ImageToTextResponse::One(g) => Ok(g.generated_text),
            ImageToTextResponse::Error(e) => Err(InferenceError::Provider {
                status: None,
                message: e.message(),
            }),
        }
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_BODY_IN_ERROR) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl InferenceClient for HuggingFaceClient {
    #[instrument(skip(self, image), fields(model = %model, bytes = image.len()))]
    async fn image_to_text(
        &self,
        image: &ImageData,
        model: &ModelId,
    ) -> Result<String, CaptionError> {
        let text = self
            .caption_image(image, model)
            .await
            .map_err(|e| CaptionError::InferenceFailed {
                model: model.to_string(),
                message: e.to_string(),
            })?;
        debug!(generated_text = %text, "Inference completed");
        Ok(text)
    }
}
