//! Multi-provider text generation layer
//!
//! Supports Google Gemini, Groq, a local Ollama server and the Hugging Face
//! inference router. Backends implement the [`LlmProvider`] trait and are
//! composed via [`ProviderRouter`] for ordered automatic fallback.

pub mod gemini;
pub mod groq;
pub mod http;
pub mod huggingface;
pub mod ollama;
pub mod openai_compat;
pub mod router;
pub mod types;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use http::{DEFAULT_REQUEST_TIMEOUT, http_client};
pub use huggingface::HuggingFaceProvider;
pub use ollama::OllamaProvider;
pub use router::{ProviderAttempt, ProviderRequest, ProviderRouter, Resolution, RouterError};
pub use types::{
    DEFAULT_FALLBACK_ORDER, ErrorCategory, LlmProvider, ProviderError, ProviderKind,
    UnknownProvider,
};
