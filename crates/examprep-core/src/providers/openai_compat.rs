//! OpenAI-compatible chat completions client shared by Groq and Hugging Face
//!
//! Both backends speak the `/chat/completions` wire format behind a bearer
//! key; only the base URL, defaults and sampling knobs differ.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http;
use super::types::{ProviderError, ProviderKind};

/// Optional sampling parameters sent with each request
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Sampling {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Single-turn chat completions client
pub struct OpenAiCompatClient {
    kind: ProviderKind,
    client: Client,
    api_key: Option<String>,
    base_url: String,
    sampling: Sampling,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl OpenAiCompatClient {
    /// - `kind`: which provider errors are attributed to
    /// - `base_url`: endpoint root including the version segment
    ///   (e.g. `https://api.groq.com/openai/v1`)
    pub fn new(
        kind: ProviderKind,
        client: Client,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sampling: Sampling::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `prompt` as a single user message and return the first choice's text
    pub async fn complete(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProviderError::NotConfigured {
                provider: self.kind,
                reason: "API key missing".to_string(),
            });
        };
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            sampling: self.sampling,
        };

        debug!(
            "{} request: model={}, prompt_chars={}",
            self.kind,
            model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(self.kind, e))?;

        if !response.status().is_success() {
            return Err(http::status_error(self.kind, response).await);
        }

        let api_response: ChatResponse = http::json_body(self.kind, response).await?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse {
                provider: self.kind,
                message: "response had no choices".to_string(),
            }
        })?;

        debug!(
            "{} response: finish_reason={:?}",
            self.kind, choice.finish_reason
        );

        choice
            .message
            .content
            .ok_or(ProviderError::EmptyResponse {
                provider: self.kind,
            })
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(flatten)]
    sampling: Sampling,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            ProviderKind::Groq,
            Client::new(),
            Some("gsk_secret".into()),
            server.uri(),
        )
    }

    #[test]
    fn test_debug_hides_key() {
        let c = OpenAiCompatClient::new(
            ProviderKind::Groq,
            Client::new(),
            Some("gsk_secret".into()),
            "https://api.groq.com/openai/v1/",
        );
        let debug = format!("{:?}", c);
        assert!(!debug.contains("gsk_secret"));
        assert_eq!(c.base_url(), "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_sampling_serializes_only_set_fields() {
        let body = ChatRequest {
            model: "m",
            messages: vec![],
            sampling: Sampling {
                temperature: Some(0.5),
                ..Sampling::default()
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["temperature"], 0.5);
        assert!(json.get("top_p").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk_secret"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "OK"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let text = client(&server)
            .complete("hello", "llama-3.3-70b-versatile")
            .await
            .unwrap();
        assert_eq!(text, "OK");
    }

    #[tokio::test]
    async fn test_complete_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("model_decommissioned"))
            .mount(&server)
            .await;

        let err = client(&server).complete("hello", "old").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Backend {
                provider: ProviderKind::Groq,
                status: 400,
                body: "model_decommissioned".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_complete_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json {{{"))
            .mount(&server)
            .await;

        let err = client(&server).complete("hello", "m").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_complete_null_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": null}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let err = client(&server).complete("hello", "m").await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
    }
}
