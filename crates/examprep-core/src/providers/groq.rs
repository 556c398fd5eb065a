//! Groq provider (OpenAI-compatible API)

use async_trait::async_trait;
use reqwest::Client;

use super::openai_compat::OpenAiCompatClient;
use super::types::{LlmProvider, ProviderError, ProviderKind};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const GROQ_ALIASES: &[(&str, &str)] = &[
    ("llama3-70b-8192", "llama-3.3-70b-versatile"),
    ("llama-3.1-70b-versatile", "llama-3.3-70b-versatile"),
];

#[derive(Debug)]
pub struct GroqProvider {
    inner: OpenAiCompatClient,
    default_model: String,
}

impl GroqProvider {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            inner: OpenAiCompatClient::new(ProviderKind::Groq, client, api_key, GROQ_BASE_URL),
            default_model: GROQ_DEFAULT_MODEL.to_string(),
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
impl LlmProvider for GroqProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    fn is_available(&self) -> bool {
        self.inner.has_api_key()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn model_aliases(&self) -> &'static [(&'static str, &'static str)] {
        GROQ_ALIASES
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        self.inner.complete(prompt, model).await
    }
}
