//! Hugging Face inference router provider
//!
//! Only reachable when a caller selects it explicitly; it is never part of
//! the default fallback chain.

use async_trait::async_trait;
use reqwest::Client;

use super::openai_compat::{OpenAiCompatClient, Sampling};
use super::types::{LlmProvider, ProviderError, ProviderKind};

pub const HUGGINGFACE_BASE_URL: &str = "https://router.huggingface.co/v1";
pub const HUGGINGFACE_DEFAULT_MODEL: &str = "zai-org/GLM-4.7-Flash:novita";

const HUGGINGFACE_SAMPLING: Sampling = Sampling {
    temperature: Some(0.7),
    max_tokens: Some(4096),
    top_p: Some(0.9),
};

#[derive(Debug)]
pub struct HuggingFaceProvider {
    inner: OpenAiCompatClient,
    default_model: String,
}

impl HuggingFaceProvider {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            inner: OpenAiCompatClient::new(
                ProviderKind::HuggingFace,
                client,
                api_key,
                HUGGINGFACE_BASE_URL,
            )
            .with_sampling(HUGGINGFACE_SAMPLING),
            default_model: HUGGINGFACE_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.inner = self.inner.with_base_url(base_url);
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[async_trait]
impl LlmProvider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn is_available(&self) -> bool {
        self.inner.has_api_key()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn unavailable_error(&self) -> ProviderError {
        ProviderError::NotConfigured {
            provider: ProviderKind::HuggingFace,
            reason: "Hugging Face API key missing (set HF_API_KEY or HF_TOKEN)".to_string(),
        }
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        self.inner.complete(prompt, model).await
    }
}
