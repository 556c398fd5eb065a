//! examprep-gateway — HTTP surface of the AI service
//!
//! Maps JSON study requests (quiz, topics, summary, explanation) onto
//! [`examprep_core::StudyTasks`] and task failures onto `{success: false, error}`
//! responses.

pub mod auth;
mod handlers;
pub mod server;

pub use handlers::DEFAULT_PROVIDER;
pub use server::{AiServer, AiState, DEFAULT_MAX_BODY_BYTES, build_router};
