//! JSON handlers for the study endpoints

use std::collections::BTreeMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use examprep_core::tasks::{DEFAULT_DIFFICULTY, DEFAULT_NUM_QUESTIONS};
use examprep_core::{ProviderKind, QuizSettings, TaskError, TaskOptions};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::server::AiState;

/// Provider used when a request does not name one
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::Gemini;

/// Body shared by every `/ai/*` endpoint; unused fields are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudyRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub topic: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub num_questions: Option<u32>,
    pub difficulty: Option<String>,
}

impl StudyRequest {
    fn options(&self) -> Result<TaskOptions, ApiError> {
        let provider = match self.provider.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_PROVIDER,
            Some(name) => name
                .parse::<ProviderKind>()
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
        };
        Ok(TaskOptions {
            provider: Some(provider),
            model: self.model.clone(),
            exclusive: false,
        })
    }

    fn quiz_settings(&self) -> QuizSettings {
        QuizSettings {
            num_questions: self.num_questions.unwrap_or(DEFAULT_NUM_QUESTIONS),
            difficulty: self
                .difficulty
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    has_gemini_key: bool,
    has_groq_key: bool,
    providers: BTreeMap<&'static str, bool>,
}

/// `{success: false, error}` with a 4xx or 5xx status
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.to_string());
        }
        match &err {
            TaskError::Provider(router_err) => {
                for attempt in router_err.attempts() {
                    warn!(
                        "  {} (model {:?}) failed: {}",
                        attempt.provider, attempt.model, attempt.error
                    );
                }
                error!("Generation failed: {}", err);
            }
            _ => error!("Generation failed: {}", err),
        }
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"success": false, "error": self.message})),
        )
            .into_response()
    }
}

/// Lenient body parsing: no content-type requirement, JSON errors as 400
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

fn success(key: &str, value: Value) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(key.to_string(), value);
    Json(Value::Object(body))
}

pub(crate) async fn health_handler(State(state): State<AiState>) -> impl IntoResponse {
    let router = state.tasks.router();
    Json(HealthResponse {
        status: "healthy",
        service: "ai-service",
        has_gemini_key: router.is_available(ProviderKind::Gemini),
        has_groq_key: router.is_available(ProviderKind::Groq),
        providers: ProviderKind::ALL
            .iter()
            .map(|kind| (kind.as_str(), router.is_available(*kind)))
            .collect(),
    })
}

pub(crate) async fn quiz_handler(
    State(state): State<AiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: StudyRequest = parse_body(&body)?;
    let options = req.options()?;
    let quiz = state
        .tasks
        .generate_quiz(&req.text, &req.quiz_settings(), &options)
        .await?;
    Ok(success("quiz", quiz))
}

pub(crate) async fn topics_handler(
    State(state): State<AiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: StudyRequest = parse_body(&body)?;
    let options = req.options()?;
    let topics = state.tasks.generate_topics(&req.text, &options).await?;
    Ok(success("topics", topics))
}

pub(crate) async fn summary_handler(
    State(state): State<AiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: StudyRequest = parse_body(&body)?;
    let options = req.options()?;
    let summary = state.tasks.generate_summary(&req.text, &options).await?;
    Ok(success("summary", Value::String(summary)))
}

pub(crate) async fn explain_handler(
    State(state): State<AiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: StudyRequest = parse_body(&body)?;
    let options = req.options()?;
    let explanation = state
        .tasks
        .explain_topic(&req.text, &req.topic, &options)
        .await?;
    Ok(success("explanation", Value::String(explanation)))
}
