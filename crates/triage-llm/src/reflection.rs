//! LLM-backed reflection over a finished task

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use minijinja::context;
use serde::Deserialize;
use tracing::{debug, warn};

use triage_core::{
    AgentError, AgentMemory, ChatMessage, LLMConfig, LLMProvider, Reflection, ReflectionGenerator,
    Result, TaskExecution, format_transcript,
};

use crate::json::extract_json;
use crate::prompts::{REFLECTION_TEMPLATE, render};

pub struct LLMReflectionGenerator {
    llm: Arc<dyn LLMProvider>,
    template: String,
    llm_config: Option<LLMConfig>,
    max_claims: usize,
}

#[derive(Debug, Deserialize)]
struct RawReflection {
    #[serde(default)]
    claims: Vec<String>,
    #[serde(default)]
    helpful_memories: Vec<String>,
    #[serde(default)]
    harmful_memories: Vec<String>,
}

impl LLMReflectionGenerator {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            template: REFLECTION_TEMPLATE.to_string(),
            llm_config: None,
            max_claims: 5,
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

    pub fn with_max_claims(mut self, max: usize) -> Self {
        self.max_claims = max;
        self
    }
}

#[async_trait]
impl ReflectionGenerator for LLMReflectionGenerator {
    async fn reflect(
        &self,
        execution: &TaskExecution,
        used_memories: &[AgentMemory],
    ) -> Result<Reflection> {
        let memories: Vec<_> = used_memories
            .iter()
            .map(|m| context! { id => &m.id, claim => &m.claim })
            .collect();
        let prompt = render(
            &self.template,
            context! {
                query => &execution.query,
                transcript => format_transcript(&execution.session),
                result => &execution.result,
                error => &execution.error,
                memories => memories,
            },
        )?;

        let messages = vec![
            ChatMessage::system(
                "You extract reusable lessons from investigations. Respond only with valid JSON.",
            ),
            ChatMessage::user(prompt),
        ];
        let response = self
            .llm
            .complete(&messages, self.llm_config.as_ref())
            .await
            .map_err(|e| AgentError::Reflection(e.to_string()))?;

        let known: HashSet<&str> = used_memories.iter().map(|m| m.id.as_str()).collect();
        let reflection = parse_reflection(&response.content, &known, self.max_claims)?;
        debug!(
            claims = reflection.claims.len(),
            helpful = reflection.helpful_memories.len(),
            harmful = reflection.harmful_memories.len(),
            "Reflection generated"
        );
        Ok(reflection)
    }
}

/// Drops blank claims and IDs that were not part of the prompt context.
pub(crate) fn parse_reflection(
    content: &str,
    known_ids: &HashSet<&str>,
    max_claims: usize,
) -> Result<Reflection> {
    let raw: RawReflection = serde_json::from_str(extract_json(content))
        .map_err(|e| AgentError::Reflection(format!("invalid reflection response: {}", e)))?;

    let claims: Vec<String> = raw
        .claims
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .take(max_claims)
        .collect();

    let keep_known = |ids: Vec<String>| -> Vec<String> {
        ids.into_iter()
            .filter(|id| {
                let known = known_ids.contains(id.as_str());
                if !known {
                    warn!(
                        memory_id = %id,
                        "Reflection referenced a memory outside the prompt context"
                    );
                }
                known
            })
            .collect()
    };

    Ok(Reflection {
        claims,
        helpful_memories: keep_known(raw.helpful_memories),
        harmful_memories: keep_known(raw.harmful_memories),
    })
}
