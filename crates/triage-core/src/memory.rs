//! Agent memory records and the feedback that flows back into them

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::message::ChatMessage;

pub const RELEVANCE_MAX: u8 = 3;
pub const SUPPORT_MAX: u8 = 4;
pub const IMPACT_MAX: u8 = 3;

/// Midpoint of the raw `relevance + support + impact` sum.
const NEUTRAL_SUM: i32 = 5;

/// One remembered sub-agent task execution.
///
/// `query_embedding` is produced once when the memory is saved. `score` and
/// `last_used_at` are the only fields that change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMemory {
    pub id: String,
    pub agent_id: String,
    pub query: String,
    #[serde(default)]
    pub query_embedding: Vec<f32>,
    pub claim: String,
    #[serde(default)]
    pub score: f64,
    pub created_at: DateTime<Utc>,
    /// `None` means the memory has never been graded after use.
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    // Legacy Keep/Problem/Try notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problems: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvements: Option<String>,
}

impl AgentMemory {
    pub fn new(
        agent_id: impl Into<String>,
        query: impl Into<String>,
        claim: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            query: query.into(),
            query_embedding: Vec::new(),
            claim: claim.into(),
            score: 0.0,
            created_at: Utc::now(),
            last_used_at: None,
            successes: None,
            problems: None,
            improvements: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = embedding;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_last_used_at(mut self, last_used_at: DateTime<Utc>) -> Self {
        self.last_used_at = Some(last_used_at);
        self
    }

    pub fn with_kpt(
        mut self,
        successes: Option<String>,
        problems: Option<String>,
        improvements: Option<String>,
    ) -> Self {
        self.successes = successes;
        self.problems = problems;
        self.improvements = improvements;
        self
    }

    pub fn has_embedding(&self) -> bool {
        !self.query_embedding.is_empty()
    }

    /// Last time the memory proved itself, falling back to its creation time.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_used_at.unwrap_or(self.created_at)
    }
}

/// Graded opinion about one memory's contribution to one task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFeedback {
    /// How related the memory was to the task, `0..=3`.
    pub relevance: u8,
    /// How much the memory supported reaching the result, `0..=4`.
    pub support: u8,
    /// How much the memory changed the outcome, `0..=3`.
    pub impact: u8,
}

impl MemoryFeedback {
    pub fn new(relevance: u8, support: u8, impact: u8) -> Self {
        Self {
            relevance,
            support,
            impact,
        }
    }

    /// Rejects grades outside their documented ranges.
    pub fn validate(&self, memory_id: &str) -> Result<()> {
        let checks = [
            ("relevance", self.relevance, RELEVANCE_MAX),
            ("support", self.support, SUPPORT_MAX),
            ("impact", self.impact, IMPACT_MAX),
        ];
        for (name, value, max) in checks {
            if value > max {
                return Err(AgentError::grading(
                    memory_id,
                    format!("{} {} exceeds maximum {}", name, value, max),
                ));
            }
        }
        Ok(())
    }

    /// Maps the raw `0..=10` sum onto `-10..=10` with 5 as neutral.
    pub fn normalized_score(&self) -> f64 {
        let sum = self.relevance as i32 + self.support as i32 + self.impact as i32;
        ((sum - NEUTRAL_SUM) * 2) as f64
    }
}

/// Post-hoc analysis of one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(default)]
    pub claims: Vec<String>,
    #[serde(default)]
    pub helpful_memories: Vec<String>,
    #[serde(default)]
    pub harmful_memories: Vec<String>,
}

impl Reflection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_claims(mut self, claims: Vec<String>) -> Self {
        self.claims = claims;
        self
    }

    pub fn with_helpful(mut self, ids: Vec<String>) -> Self {
        self.helpful_memories = ids;
        self
    }

    pub fn with_harmful(mut self, ids: Vec<String>) -> Self {
        self.harmful_memories = ids;
        self
    }

    /// IDs listed as both helpful and harmful, sorted.
    pub fn conflicting_ids(&self) -> Vec<String> {
        let harmful: HashSet<&String> = self.harmful_memories.iter().collect();
        let mut conflicts: Vec<String> = self
            .helpful_memories
            .iter()
            .filter(|id| harmful.contains(id))
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        conflicts.sort();
        conflicts
    }

    pub fn has_feedback(&self) -> bool {
        !self.helpful_memories.is_empty() || !self.harmful_memories.is_empty()
    }
}

/// Everything the grader and the reflection generator see about a finished task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskExecution {
    pub query: String,
    #[serde(default)]
    pub session: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskExecution {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session: Vec<ChatMessage>) -> Self {
        self.session = session;
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// New persisted state for one memory after a feedback round.
///
/// `last_used_at: None` leaves the stored value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub score: f64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ScoreUpdate {
    pub fn score_only(score: f64) -> Self {
        Self {
            score,
            last_used_at: None,
        }
    }

    pub fn used_at(score: f64, at: DateTime<Utc>) -> Self {
        Self {
            score,
            last_used_at: Some(at),
        }
    }
}
