//! Local Ollama inference server provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http;
use super::types::{LlmProvider, ProviderError, ProviderKind};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

const OLLAMA_ALIASES: &[(&str, &str)] = &[("llama3", "llama3.2")];

/// Ollama client using the native `/api/generate` endpoint
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl OllamaProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            default_model: OLLAMA_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    /// No credential is needed; only the endpoint must be set
    fn is_available(&self) -> bool {
        !self.base_url.is_empty()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn model_aliases(&self) -> &'static [(&'static str, &'static str)] {
        OLLAMA_ALIASES
    }

    fn unavailable_error(&self) -> ProviderError {
        ProviderError::NotConfigured {
            provider: ProviderKind::Ollama,
            reason: "base URL not configured".to_string(),
        }
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        debug!("Ollama request: model={}, url={}", model, url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    debug!("Ollama unreachable at {}", self.base_url);
                    ProviderError::Connection {
                        provider: ProviderKind::Ollama,
                        message: "Is it running?".to_string(),
                    }
                } else {
                    http::send_error(ProviderKind::Ollama, e)
                }
            })?;

        if !response.status().is_success() {
            return Err(http::status_error(ProviderKind::Ollama, response).await);
        }

        let api_response: GenerateResponse =
            http::json_body(ProviderKind::Ollama, response).await?;

        debug!("Ollama response: done={:?}", api_response.done);

        Ok(api_response.response)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
}
