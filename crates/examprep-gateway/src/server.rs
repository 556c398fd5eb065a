//! AI service HTTP server, Axum-based

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use examprep_core::StudyTasks;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers::{
    explain_handler, health_handler, quiz_handler, summary_handler, topics_handler,
};

pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared state for all request handlers
#[derive(Clone)]
pub struct AiState {
    pub tasks: StudyTasks,
    pub auth_token: String,
    pub max_body_bytes: usize,
}

impl AiState {
    /// Auth disabled, default body limit
    pub fn new(tasks: StudyTasks) -> Self {
        Self {
            tasks,
            auth_token: String::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }
}

/// Build the Axum router. `/health` is never behind auth.
pub fn build_router(state: AiState) -> Router {
    let auth = AuthConfig {
        token: state.auth_token.clone(),
    };

    let ai = Router::new()
        .route("/ai/generate-quiz", post(quiz_handler))
        .route("/ai/generate-topics", post(topics_handler))
        .route("/ai/generate-summary", post(summary_handler))
        .route("/ai/explain-topic", post(explain_handler))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes));

    Router::new()
        .route("/health", get(health_handler))
        .merge(ai)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The AI service server
pub struct AiServer {
    state: AiState,
    bind: SocketAddr,
}

impl AiServer {
    pub fn new(bind: SocketAddr, state: AiState) -> Self {
        Self { state, bind }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.state.auth_token.is_empty() && !self.bind.ip().is_loopback() {
            warn!(
                "AI service on {} has no auth token; /ai/* is open to the network",
                self.bind
            );
        }

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("AI service listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("AI service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use examprep_core::{LlmProvider, ProviderError, ProviderKind, ProviderRouter};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    /// Answers with a canned reply and records the prompts it received
    struct CannedProvider {
        kind: ProviderKind,
        available: bool,
        reply: Result<String, ProviderError>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(kind: ProviderKind, reply: Result<String, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available: true,
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn unconfigured(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available: false,
                reply: Ok(String::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }
        fn is_available(&self) -> bool {
            self.available
        }
        fn default_model(&self) -> &str {
            "canned"
        }
        async fn generate(&self, prompt: &str, _model: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn state_with(providers: Vec<Arc<CannedProvider>>) -> AiState {
        let router = ProviderRouter::new(
            providers
                .into_iter()
                .map(|p| p as Arc<dyn LlmProvider>)
                .collect(),
        );
        AiState::new(StudyTasks::new(Arc::new(router)))
    }

    fn gemini_says(reply: &str) -> (Arc<CannedProvider>, AiState) {
        let gemini = CannedProvider::new(ProviderKind::Gemini, Ok(reply.to_string()));
        let state = state_with(vec![gemini.clone()]);
        (gemini, state)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    async fn send(state: AiState, req: Request<Body>) -> (StatusCode, Value) {
        let resp = build_router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_reports_keys() {
        let state = state_with(vec![
            CannedProvider::new(ProviderKind::Gemini, Ok(String::new())),
            CannedProvider::unconfigured(ProviderKind::Groq),
        ]);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(state, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "ai-service");
        assert_eq!(json["hasGeminiKey"], true);
        assert_eq!(json["hasGroqKey"], false);
        assert_eq!(json["providers"]["ollama"], false);
        assert_eq!(json["providers"]["huggingface"], false);
    }

    #[tokio::test]
    async fn test_generate_quiz() {
        let quiz = json!({"title": "T", "questions": []});
        let (_, state) = gemini_says(&format!("```json\n{}\n```", quiz));
        let (status, json) = send(
            state,
            post("/ai/generate-quiz", json!({"text": "notes", "numQuestions": 2})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"success": true, "quiz": quiz}));
    }

    #[tokio::test]
    async fn test_generate_topics_without_content_type() {
        let (_, state) = gemini_says(r#"[{"topic": "A", "description": "B"}]"#);
        let req = Request::builder()
            .method("POST")
            .uri("/ai/generate-topics")
            .body(Body::from(r#"{"text": "notes"}"#))
            .unwrap();
        let (status, json) = send(state, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["topics"], json!([{"topic": "A", "description": "B"}]));
    }

    #[tokio::test]
    async fn test_generate_summary_and_explain() {
        let (_, state) = gemini_says("Plain prose.");
        let (status, json) = send(
            state.clone(),
            post("/ai/generate-summary", json!({"text": "notes"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"success": true, "summary": "Plain prose."}));

        let (status, json) = send(
            state,
            post(
                "/ai/explain-topic",
                json!({"text": "notes", "topic": "Subnets"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["explanation"], "Plain prose.");
    }

    #[tokio::test]
    async fn test_missing_text_is_400() {
        let (gemini, state) = gemini_says("unused");
        let (status, json) = send(state.clone(), post("/ai/generate-quiz", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({"success": false, "error": "No text provided"}));

        let (status, json) = send(
            state,
            post("/ai/explain-topic", json!({"text": "notes"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing context or topic name");
        assert_eq!(gemini.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_400() {
        let (_, state) = gemini_says("unused");
        let (status, json) = send(
            state,
            post(
                "/ai/generate-summary",
                json!({"text": "notes", "provider": "openai"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        let (_, state) = gemini_says("unused");
        let req = Request::builder()
            .method("POST")
            .uri("/ai/generate-summary")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_500() {
        let state = state_with(vec![CannedProvider::new(
            ProviderKind::Gemini,
            Err(ProviderError::Timeout {
                provider: ProviderKind::Gemini,
            }),
        )]);
        let (status, json) = send(
            state,
            post("/ai/generate-summary", json!({"text": "notes"})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        let error = json["error"].as_str().unwrap();
        assert!(error.starts_with("All AI providers failed. Last error:"));
    }

    #[tokio::test]
    async fn test_unstructured_reply_is_500() {
        let (_, state) = gemini_says("Sorry, I can't do that.");
        let (status, json) = send(
            state,
            post("/ai/generate-quiz", json!({"text": "notes"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("did not contain valid JSON"));
    }

    #[tokio::test]
    async fn test_auth_rejects_missing_token() {
        let (gemini, state) = gemini_says("ok");
        let state = state.with_auth_token("secret");
        let (status, json) = send(
            state,
            post("/ai/generate-summary", json!({"text": "notes"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert_eq!(gemini.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_accepts_valid_token() {
        let (_, state) = gemini_says("ok");
        let state = state.with_auth_token("secret");
        let mut req = post("/ai/generate-summary", json!({"text": "notes"}));
        req.headers_mut()
            .insert("authorization", "Bearer secret".parse().unwrap());
        let (status, _) = send(state, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_skips_auth() {
        let (_, state) = gemini_says("ok");
        let state = state.with_auth_token("secret");
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(state, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_size_limit() {
        let (_, state) = gemini_says("ok");
        let state = state.with_max_body_bytes(64);
        let oversized = json!({"text": "a".repeat(256)});
        let (status, _) = send(state, post("/ai/generate-summary", oversized)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (_, state) = gemini_says("ok");
        let server = AiServer::new("127.0.0.1:0".parse().unwrap(), state);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
