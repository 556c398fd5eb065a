//! Provider-agnostic types shared by every backend

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier of a text-generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Groq,
    Ollama,
    #[serde(alias = "hf")]
    HuggingFace,
}

/// Providers tried, in order, after the caller's preferred one.
///
/// Hugging Face is not part of the chain; it is only reached when a caller
/// names it explicitly.
pub const DEFAULT_FALLBACK_ORDER: [ProviderKind; 3] =
    [ProviderKind::Gemini, ProviderKind::Groq, ProviderKind::Ollama];

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Gemini,
        ProviderKind::Groq,
        ProviderKind::Ollama,
        ProviderKind::HuggingFace,
    ];

    /// Wire identifier (e.g. "gemini", "huggingface")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::HuggingFace => "huggingface",
        }
    }

    /// Human-readable label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::Groq => "Groq",
            Self::Ollama => "Ollama",
            Self::HuggingFace => "Hugging Face",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown AI provider '{0}' (expected gemini, groq, ollama or huggingface)")]
pub struct UnknownProvider(pub String);

/// Coarse failure classes. All of them are continuable inside the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credential or endpoint configuration is missing
    Configuration,
    /// Connectivity, timeout or rate-limit/quota signal
    Transient,
    /// The backend answered but reported an error or an unusable payload
    Backend,
}

/// Failure of a single provider call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("{} is not configured: {reason}", .provider.label())]
    NotConfigured { provider: ProviderKind, reason: String },

    #[error("{} rate limited (429): {body}", .provider.label())]
    RateLimited { provider: ProviderKind, body: String },

    #[error("Could not connect to {}. {message}", .provider.label())]
    Connection { provider: ProviderKind, message: String },

    #[error("{} request timed out", .provider.label())]
    Timeout { provider: ProviderKind },

    #[error("{} API request failed with status {status}: {body}", .provider.label())]
    Backend {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("{} returned a malformed response: {message}", .provider.label())]
    MalformedResponse {
        provider: ProviderKind,
        message: String,
    },

    #[error("{} returned an empty response", .provider.label())]
    EmptyResponse { provider: ProviderKind },
}

impl ProviderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotConfigured { .. } => ErrorCategory::Configuration,
            Self::RateLimited { .. } | Self::Connection { .. } | Self::Timeout { .. } => {
                ErrorCategory::Transient
            }
            Self::Backend { .. } | Self::MalformedResponse { .. } | Self::EmptyResponse { .. } => {
                ErrorCategory::Backend
            }
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::NotConfigured { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::Connection { provider, .. }
            | Self::Timeout { provider }
            | Self::Backend { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::EmptyResponse { provider } => *provider,
        }
    }
}

/// Capability interface implemented once per backend.
///
/// Instances are built once at startup and injected into the
/// [`ProviderRouter`](super::ProviderRouter).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the credentials/endpoint needed for a call are present
    fn is_available(&self) -> bool;

    /// Model used when the caller did not pick one
    fn default_model(&self) -> &str;

    /// Legacy or alias model names mapped to the name the backend accepts
    fn model_aliases(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Map a requested model id onto the one that will be dispatched.
    ///
    /// `None` or a blank id selects [`default_model`](Self::default_model);
    /// unknown names pass through untouched.
    fn resolve_model_id(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim).filter(|m| !m.is_empty()) {
            None => self.default_model().to_string(),
            Some(model) => self
                .model_aliases()
                .iter()
                .find(|(alias, _)| *alias == model)
                .map_or(model, |(_, canonical)| *canonical)
                .to_string(),
        }
    }

    /// Error recorded when [`is_available`](Self::is_available) is false
    fn unavailable_error(&self) -> ProviderError {
        ProviderError::NotConfigured {
            provider: self.kind(),
            reason: "API key missing".to_string(),
        }
    }

    /// Produce text for `prompt` using `model`
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AliasProvider;

    #[async_trait]
    impl LlmProvider for AliasProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Groq
        }
        fn is_available(&self) -> bool {
            true
        }
        fn default_model(&self) -> &str {
            "new-model"
        }
        fn model_aliases(&self) -> &'static [(&'static str, &'static str)] {
            &[("old-model", "new-model")]
        }
        async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, ProviderError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_provider_kind_round_trip_strings() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_provider_kind_parse_is_lenient() {
        assert_eq!(" Groq ".parse::<ProviderKind>().unwrap(), ProviderKind::Groq);
        assert_eq!("hf".parse::<ProviderKind>().unwrap(), ProviderKind::HuggingFace);
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::HuggingFace).unwrap();
        assert_eq!(json, "\"huggingface\"");
        let kind: ProviderKind = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(kind, ProviderKind::Ollama);
    }

    #[test]
    fn test_default_chain_excludes_huggingface() {
        assert!(!DEFAULT_FALLBACK_ORDER.contains(&ProviderKind::HuggingFace));
    }

    #[test]
    fn test_resolve_model_id() {
        let p = AliasProvider;
        assert_eq!(p.resolve_model_id(None), "new-model");
        assert_eq!(p.resolve_model_id(Some("  ")), "new-model");
        assert_eq!(p.resolve_model_id(Some("old-model")), "new-model");
        assert_eq!(p.resolve_model_id(Some("custom")), "custom");
    }

    #[test]
    fn test_error_categories() {
        let p = ProviderKind::Gemini;
        assert_eq!(
            ProviderError::NotConfigured { provider: p, reason: "x".into() }.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ProviderError::RateLimited { provider: p, body: "quota".into() }.category(),
            ErrorCategory::Transient
        );
        assert_eq!(ProviderError::Timeout { provider: p }.category(), ErrorCategory::Transient);
        assert_eq!(
            ProviderError::Backend { provider: p, status: 400, body: "bad".into() }.category(),
            ErrorCategory::Backend
        );
        assert_eq!(ProviderError::EmptyResponse { provider: p }.category(), ErrorCategory::Backend);
    }

    #[test]
    fn test_error_messages_name_provider() {
        let err = ProviderError::Backend {
            provider: ProviderKind::HuggingFace,
            status: 503,
            body: "loading".into(),
        };
        assert_eq!(
            err.to_string(),
            "Hugging Face API request failed with status 503: loading"
        );
        assert_eq!(err.provider(), ProviderKind::HuggingFace);
    }
}
