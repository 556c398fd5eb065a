//! Study tasks built on the provider router and the payload extractor
//!
//! Each task truncates the source material, renders its prompt, resolves
//! it through [`ProviderRouter`] and, for quiz and topic generation, pulls
//! the structured payload out of the reply.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::extract::{ExtractionError, ExtractionTarget, extract};
use crate::providers::{ProviderKind, ProviderRequest, ProviderRouter, Resolution, RouterError};

pub const QUIZ_SOURCE_LIMIT: usize = 10_000;
pub const TOPICS_SOURCE_LIMIT: usize = 10_000;
pub const EXPLAIN_SOURCE_LIMIT: usize = 10_000;
pub const SUMMARY_SOURCE_LIMIT: usize = 15_000;

pub const DEFAULT_NUM_QUESTIONS: u32 = 5;
pub const DEFAULT_DIFFICULTY: &str = "Medium";

const NO_TEXT: &str = "No text provided";
const MISSING_TOPIC: &str = "Missing context or topic name";

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Provider(#[from] RouterError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl TaskError {
    /// True when the caller sent bad input rather than the backends failing
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

/// Provider selection shared by every task
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    /// Only try `provider`, never the fallback chain
    pub exclusive: bool,
}

impl TaskOptions {
    fn request(&self, prompt: String) -> ProviderRequest {
        let request = ProviderRequest::new(prompt)
            .with_provider(self.provider)
            .with_model(self.model.clone());
        if self.exclusive {
            request.exclusive()
        } else {
            request
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    pub num_questions: u32,
    pub difficulty: String,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            num_questions: DEFAULT_NUM_QUESTIONS,
            difficulty: DEFAULT_DIFFICULTY.to_string(),
        }
    }
}

/// First `limit` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn quiz_prompt(text: &str, settings: &QuizSettings) -> String {
    format!(
        r#"Act as an Expert Educator and Technical Architect. Your task is to generate a JSON-formatted practice quiz based on the provided study material.

Follow these strict pedagogical rules:
1. FOCUS ON APPLICATION: Do not ask for simple definitions. Create scenario-based questions where the learner must apply a concept.
2. RATIONALE-DRIVEN: For every answer option, provide a one-sentence rationale explaining why it is correct or why it is a common misconception.
3. ADAPTIVE DIFFICULTY: Group questions into 'Conceptual', 'Hands-on/Syntax' and 'Architectural/Problem Solving'.
4. STRICT JSON: Escape every double quote inside text fields with a backslash. Use only valid JSON characters.
5. FORMAT: Return only a valid JSON object with the following structure:

{{
  "title": "Quiz Title",
  "questions": [
    {{
      "question": "string",
      "answerOptions": [
        {{"text": "string", "rationale": "string", "isCorrect": boolean}}
      ],
      "hint": "string",
      "category": "Conceptual|Hands-on|Architectural"
    }}
  ]
}}

Generate exactly {num} questions.
The difficulty level should be: {difficulty}.

Text:
{text}
"#,
        num = settings.num_questions,
        difficulty = settings.difficulty,
        text = truncate_chars(text, QUIZ_SOURCE_LIMIT),
    )
}

pub fn topics_prompt(text: &str) -> String {
    format!(
        r#"Extract the 5 most important topics from the text below.
Return ONLY valid JSON:

[
  {{ "topic": "Topic Name", "description": "One sentence description" }}
]

Text:
{}
"#,
        truncate_chars(text, TOPICS_SOURCE_LIMIT)
    )
}

pub fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following text in a concise and easy-to-understand manner for a student.\n\
         Highlight key definitions and core concepts.\n\
         Limit to 3 paragraphs.\n\
         \n\
         Text:\n\
         {}\n",
        truncate_chars(text, SUMMARY_SOURCE_LIMIT)
    )
}

pub fn explain_prompt(text: &str, topic: &str) -> String {
    format!(
        "Explain the topic '{}' in detail based on its context within the provided text.\n\
         Explain it like you are a helpful teacher. Use simple analogies if possible.\n\
         Keep the explanation focused, professional, and limited to 2-3 detailed paragraphs.\n\
         \n\
         Context Text:\n\
         {}\n",
        topic.trim(),
        truncate_chars(text, EXPLAIN_SOURCE_LIMIT)
    )
}

/// Quiz, topic, summary and explanation generation over a shared router
#[derive(Debug, Clone)]
pub struct StudyTasks {
    router: Arc<ProviderRouter>,
}

impl StudyTasks {
    pub fn new(router: Arc<ProviderRouter>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Quiz object `{title, questions: [...]}`
    pub async fn generate_quiz(
        &self,
        text: &str,
        settings: &QuizSettings,
        options: &TaskOptions,
    ) -> Result<Value, TaskError> {
        require_text(text)?;
        let resolution = self.run("quiz", quiz_prompt(text, settings), options).await?;
        Ok(extract(&resolution.raw_text, ExtractionTarget::Object)?)
    }

    /// Topic list `[{topic, description}]`
    pub async fn generate_topics(
        &self,
        text: &str,
        options: &TaskOptions,
    ) -> Result<Value, TaskError> {
        require_text(text)?;
        let resolution = self.run("topics", topics_prompt(text), options).await?;
        Ok(extract(&resolution.raw_text, ExtractionTarget::Array)?)
    }

    pub async fn generate_summary(
        &self,
        text: &str,
        options: &TaskOptions,
    ) -> Result<String, TaskError> {
        require_text(text)?;
        let resolution = self.run("summary", summary_prompt(text), options).await?;
        Ok(resolution.raw_text)
    }

    pub async fn explain_topic(
        &self,
        text: &str,
        topic: &str,
        options: &TaskOptions,
    ) -> Result<String, TaskError> {
        if text.trim().is_empty() || topic.trim().is_empty() {
            return Err(TaskError::InvalidInput(MISSING_TOPIC.to_string()));
        }
        let resolution = self
            .run("explain", explain_prompt(text, topic), options)
            .await?;
        Ok(resolution.raw_text)
    }

    async fn run(
        &self,
        task: &str,
        prompt: String,
        options: &TaskOptions,
    ) -> Result<Resolution, TaskError> {
        debug!(
            "Task {}: prompt_chars={}, provider={:?}, model={:?}",
            task,
            prompt.chars().count(),
            options.provider,
            options.model
        );
        let resolution = self.router.resolve(&options.request(prompt)).await?;
        info!(
            "Task {} answered by {} ({}) after {} failed attempt(s)",
            task,
            resolution.provider_used,
            resolution.model_used,
            resolution.failed_attempts.len()
        );
        Ok(resolution)
    }
}

fn require_text(text: &str) -> Result<(), TaskError> {
    if text.trim().is_empty() {
        return Err(TaskError::InvalidInput(NO_TEXT.to_string()));
    }
    Ok(())
}
