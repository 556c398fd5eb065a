//! Bearer token check for the `/ai/*` routes

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::middleware::Next;
use serde_json::json;
use tracing::warn;

/// Token the middleware compares against; empty disables the check
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub token: String,
}

/// Validate a bearer token against the configured service token.
///
/// Returns `true` if:
/// - No token is configured (auth disabled)
/// - The provided token matches the configured token
pub fn validate_token(configured_token: &str, provided_token: &str) -> bool {
    if configured_token.is_empty() {
        return true;
    }
    if provided_token.is_empty() {
        return false;
    }
    constant_time_eq(configured_token.as_bytes(), provided_token.as_bytes())
}

/// Extract bearer token from an Authorization header value.
///
/// Expects format: `Bearer <token>`
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.trim().strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

pub(crate) async fn auth_middleware(
    State(cfg): State<AuthConfig>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if cfg.token.is_empty() {
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .unwrap_or("");

    if !validate_token(&cfg.token, provided) {
        warn!("Rejected {} {}: missing or invalid bearer token", req.method(), req.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"success": false, "error": "Unauthorized"})),
        )
            .into_response();
    }

    next.run(req).await
}
