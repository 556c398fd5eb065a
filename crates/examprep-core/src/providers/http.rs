//! Transport helpers shared by the HTTP backends

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use super::types::{ProviderError, ProviderKind};

/// Default per-attempt timeout applied by the transport
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the process-wide HTTP client handed to every backend
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("examprep/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Classify a transport-level failure. The request URL is dropped from the
/// message since it can carry a query-string API key.
pub(crate) fn send_error(provider: ProviderKind, err: reqwest::Error) -> ProviderError {
    let err = err.without_url();
    if err.is_timeout() {
        ProviderError::Timeout { provider }
    } else if err.is_decode() {
        ProviderError::MalformedResponse {
            provider,
            message: err.to_string(),
        }
    } else {
        ProviderError::Connection {
            provider,
            message: err.to_string(),
        }
    }
}

/// Turn a non-success response into a provider error, consuming the body
pub(crate) async fn status_error(provider: ProviderKind, response: Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited { provider, body }
    } else {
        ProviderError::Backend {
            provider,
            status: status.as_u16(),
            body,
        }
    }
}

/// Decode a JSON body, reporting shape mismatches as malformed responses
pub(crate) async fn json_body<T: serde::de::DeserializeOwned>(
    provider: ProviderKind,
    response: Response,
) -> Result<T, ProviderError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| send_error(provider, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::MalformedResponse {
        provider,
        message: e.to_string(),
    })
}
