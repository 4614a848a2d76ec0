//! LLM-backed feedback grading

use std::sync::Arc;

use async_trait::async_trait;
use minijinja::context;
use serde::Deserialize;
use tracing::debug;

use triage_core::{
    AgentError, AgentMemory, ChatMessage, FeedbackGrader, LLMConfig, LLMProvider, MemoryFeedback,
    Result, TaskExecution, format_transcript,
};

use crate::json::extract_json;
use crate::prompts::{FEEDBACK_GRADING_TEMPLATE, render};

const DEFAULT_MAX_TRANSCRIPT_CHARS: usize = 8000;

/// Asks an LLM to grade one memory against one finished task.
pub struct LLMFeedbackGrader {
    llm: Arc<dyn LLMProvider>,
    template: String,
    llm_config: Option<LLMConfig>,
    max_transcript_chars: usize,
}

#[derive(Debug, Deserialize)]
struct RawFeedback {
    relevance: i64,
    support: i64,
    impact: i64,
}

impl LLMFeedbackGrader {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            template: FEEDBACK_GRADING_TEMPLATE.to_string(),
            llm_config: None,
            max_transcript_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_llm_config(mut self, config: LLMConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    pub fn with_max_transcript_chars(mut self, max: usize) -> Self {
        self.max_transcript_chars = max;
        self
    }

    fn build_prompt(&self, memory: &AgentMemory, execution: &TaskExecution) -> Result<String> {
        let transcript = tail_chars(
            &format_transcript(&execution.session),
            self.max_transcript_chars,
        );
        render(
            &self.template,
            context! {
                query => &execution.query,
                claim => &memory.claim,
                transcript => transcript,
                result => &execution.result,
                error => &execution.error,
            },
        )
    }
}

#[async_trait]
impl FeedbackGrader for LLMFeedbackGrader {
    async fn grade(
        &self,
        memory: &AgentMemory,
        execution: &TaskExecution,
    ) -> Result<MemoryFeedback> {
        let prompt = self.build_prompt(memory, execution)?;
        let messages = vec![
            ChatMessage::system(
                "You grade how useful remembered insights were. Respond only with valid JSON.",
            ),
            ChatMessage::user(prompt),
        ];

        let response = self
            .llm
            .complete(&messages, self.llm_config.as_ref())
            .await
            .map_err(|e| AgentError::grading(&memory.id, e.to_string()))?;

        let feedback = parse_feedback(&memory.id, &response.content)?;
        debug!(
            memory_id = %memory.id,
            relevance = feedback.relevance,
            support = feedback.support,
            impact = feedback.impact,
            "Memory graded"
        );
        Ok(feedback)
    }
}

pub(crate) fn parse_feedback(memory_id: &str, content: &str) -> Result<MemoryFeedback> {
    let raw: RawFeedback = serde_json::from_str(extract_json(content)).map_err(|e| {
        AgentError::grading(memory_id, format!("invalid grading response: {}", e))
    })?;

    let to_grade = |name: &str, value: i64| -> Result<u8> {
        u8::try_from(value)
            .map_err(|_| AgentError::grading(memory_id, format!("{} {} out of range", name, value)))
    };

    let feedback = MemoryFeedback::new(
        to_grade("relevance", raw.relevance)?,
        to_grade("support", raw.support)?,
        to_grade("impact", raw.impact)?,
    );
    feedback.validate(memory_id)?;
    Ok(feedback)
}

/// Keeps the last `max` characters; the end of a session carries the outcome.
fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}
