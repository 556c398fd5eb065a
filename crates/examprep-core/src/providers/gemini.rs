//! Google Gemini provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http;
use super::types::{LlmProvider, ProviderError, ProviderKind};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

const GEMINI_ALIASES: &[(&str, &str)] = &[("gemini-1.5-flash", "gemini-2.0-flash")];

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl GeminiProvider {
    /// Blank keys are treated as absent
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: GEMINI_BASE_URL.to_string(),
            default_model: GEMINI_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Concatenate the text parts of the first candidate
    fn text_from_response(resp: GeminiApiResponse) -> Result<String, ProviderError> {
        let candidate = resp.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse {
                provider: ProviderKind::Gemini,
                message: "response had no candidates".to_string(),
            }
        })?;

        let parts: Vec<String> = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if parts.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: ProviderKind::Gemini,
            });
        }
        Ok(parts.concat())
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn model_aliases(&self) -> &'static [(&'static str, &'static str)] {
        GEMINI_ALIASES
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(self.unavailable_error());
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model
        );

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        debug!("Gemini request: model={}, prompt_chars={}", model, prompt.chars().count());

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(ProviderKind::Gemini, e))?;

        if !response.status().is_success() {
            return Err(http::status_error(ProviderKind::Gemini, response).await);
        }

        let api_response: GeminiApiResponse =
            http::json_body(ProviderKind::Gemini, response).await?;

        debug!("Gemini response: candidates={}", api_response.candidates.len());

        Self::text_from_response(api_response)
    }
}

// ── Gemini wire types ──

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}
