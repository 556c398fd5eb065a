//! examprep-core - AI generation layer of the exam prep assistant
//!
//! This crate provides:
//! - Provider backends for Gemini, Groq, Ollama and Hugging Face
//! - Ordered provider fallback with per-attempt failure records
//! - Extraction of JSON payloads from free-form model output
//! - Study tasks (quizzes, topics, summaries, explanations) built on both

pub mod extract;
pub mod providers;
pub mod tasks;

// Re-export main types for convenience
pub use extract::{ExtractionError, ExtractionTarget, extract};
pub use providers::{
    LlmProvider, ProviderAttempt, ProviderError, ProviderKind, ProviderRequest, ProviderRouter,
    Resolution, RouterError,
};
pub use tasks::{QuizSettings, StudyTasks, TaskError, TaskOptions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let _ = std::mem::size_of::<ProviderRouter>();
        let _ = std::mem::size_of::<StudyTasks>();
        let _ = std::mem::size_of::<ProviderRequest>();
        let _ = std::mem::size_of::<TaskOptions>();
    }
}
