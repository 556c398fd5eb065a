//! Provider router with ordered automatic fallback

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::types::{DEFAULT_FALLBACK_ORDER, LlmProvider, ProviderError, ProviderKind};

/// One generation request routed across providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub prompt: String,
    /// Tried first when set
    pub preferred_provider: Option<ProviderKind>,
    /// Only honoured for the preferred provider
    pub model_id: Option<String>,
    /// When false only the preferred provider is attempted
    pub allow_fallback: bool,
}

impl ProviderRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            preferred_provider: None,
            model_id: None,
            allow_fallback: true,
        }
    }

    pub fn with_provider(mut self, provider: Option<ProviderKind>) -> Self {
        self.preferred_provider = provider;
        self
    }

    pub fn with_model(mut self, model_id: Option<String>) -> Self {
        self.model_id = model_id;
        self
    }

    /// Disable fallback so a configuration error on the preferred provider is final
    pub fn exclusive(mut self) -> Self {
        self.allow_fallback = false;
        self
    }
}

/// A failed provider attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    pub provider: ProviderKind,
    /// Model dispatched, `None` when no call was made
    pub model: Option<String>,
    pub error: String,
    #[serde(skip)]
    pub cause: ProviderError,
}

impl ProviderAttempt {
    fn new(provider: ProviderKind, model: Option<String>, cause: ProviderError) -> Self {
        Self {
            provider,
            model,
            error: cause.to_string(),
            cause,
        }
    }
}

/// Raw text produced by the first provider that succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub raw_text: String,
    pub provider_used: ProviderKind,
    pub model_used: String,
    /// Attempts that failed before the successful one
    pub failed_attempts: Vec<ProviderAttempt>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("All AI providers failed. Last error: {}", last_error_message(.attempts))]
    AllProvidersFailed { attempts: Vec<ProviderAttempt> },
}

fn last_error_message(attempts: &[ProviderAttempt]) -> &str {
    attempts.last().map_or("no providers attempted", |a| a.error.as_str())
}

impl RouterError {
    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            Self::EmptyPrompt => &[],
            Self::AllProvidersFailed { attempts } => attempts,
        }
    }
}

/// Routes generation requests across providers, falling through on any error
pub struct ProviderRouter {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<ProviderKind> = self.providers.iter().map(|p| p.kind()).collect();
        f.debug_struct("ProviderRouter")
            .field("providers", &kinds)
            .finish()
    }
}

impl ProviderRouter {
    /// Later instances of an already registered kind are ignored
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        let mut unique: Vec<Arc<dyn LlmProvider>> = Vec::with_capacity(providers.len());
        for provider in providers {
            if unique.iter().any(|p| p.kind() == provider.kind()) {
                warn!("Ignoring duplicate {} provider registration", provider.kind());
                continue;
            }
            unique.push(provider);
        }
        Self { providers: unique }
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&Arc<dyn LlmProvider>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    /// Registered kinds with their availability, in registration order
    pub fn availability(&self) -> Vec<(ProviderKind, bool)> {
        self.providers
            .iter()
            .map(|p| (p.kind(), p.is_available()))
            .collect()
    }

    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.provider(kind).is_some_and(|p| p.is_available())
    }

    /// Preferred provider first, then the default chain without duplicates
    pub fn candidate_order(request: &ProviderRequest) -> Vec<ProviderKind> {
        let mut order = Vec::with_capacity(DEFAULT_FALLBACK_ORDER.len() + 1);
        if let Some(preferred) = request.preferred_provider {
            order.push(preferred);
            if !request.allow_fallback {
                return order;
            }
        }
        for kind in DEFAULT_FALLBACK_ORDER {
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        order
    }

    /// Try each candidate in turn and return the first successful text.
    ///
    /// Every failure class is recorded and skipped; only exhaustion of the
    /// candidate list is an error.
    pub async fn resolve(&self, request: &ProviderRequest) -> Result<Resolution, RouterError> {
        if request.prompt.trim().is_empty() {
            return Err(RouterError::EmptyPrompt);
        }

        let order = Self::candidate_order(request);
        let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(order.len());

        for (idx, kind) in order.iter().copied().enumerate() {
            let Some(provider) = self.provider(kind) else {
                warn!("Provider {} is not registered, skipping", kind);
                attempts.push(ProviderAttempt::new(
                    kind,
                    None,
                    ProviderError::NotConfigured {
                        provider: kind,
                        reason: "provider not registered".to_string(),
                    },
                ));
                continue;
            };

            if !provider.is_available() {
                let err = provider.unavailable_error();
                warn!("Provider {} unavailable: {}", kind, err);
                attempts.push(ProviderAttempt::new(kind, None, err));
                continue;
            }

            let requested = if request.preferred_provider == Some(kind) {
                request.model_id.as_deref()
            } else {
                None
            };
            let model = provider.resolve_model_id(requested);

            debug!(
                "Trying provider {} ({}) [{}/{}]",
                kind,
                model,
                idx + 1,
                order.len()
            );

            match provider.generate(&request.prompt, &model).await {
                Ok(raw_text) => {
                    if !attempts.is_empty() {
                        info!(
                            "Request succeeded on fallback provider {} ({}) after {} failed attempt(s)",
                            kind,
                            model,
                            attempts.len()
                        );
                    }
                    return Ok(Resolution {
                        raw_text,
                        provider_used: kind,
                        model_used: model,
                        failed_attempts: attempts,
                    });
                }
                Err(err) => {
                    warn!(
                        "Provider {} ({}) failed (category={:?}): {}",
                        kind,
                        model,
                        err.category(),
                        err
                    );
                    attempts.push(ProviderAttempt::new(kind, Some(model), err));
                }
            }
        }

        Err(RouterError::AllProvidersFailed { attempts })
    }
}
