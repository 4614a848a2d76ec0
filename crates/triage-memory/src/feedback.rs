//! Grading used memories after a task and persisting the new scores in one batch

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use triage_core::{
    AgentError, AgentMemory, FeedbackGrader, MemoryFeedback, MemoryRepository, Result,
    ScoreUpdate, TaskExecution,
};

use crate::config::FeedbackConfig;
use crate::scoring::ScoringEngine;

/// Outcome of one feedback round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackReport {
    /// New persisted state per successfully graded memory.
    pub updates: HashMap<String, ScoreUpdate>,
    /// Memories whose grading failed; their stored state is untouched.
    pub failed: Vec<String>,
}

impl FeedbackReport {
    pub fn graded(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.failed.is_empty()
    }
}

pub struct FeedbackCollector {
    repository: Arc<dyn MemoryRepository>,
    grader: Arc<dyn FeedbackGrader>,
    scoring: ScoringEngine,
    config: FeedbackConfig,
}

impl FeedbackCollector {
    pub fn new(
        repository: Arc<dyn MemoryRepository>,
        grader: Arc<dyn FeedbackGrader>,
        scoring: ScoringEngine,
        config: FeedbackConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            grader,
            scoring,
            config,
        })
    }

    /// Grades every used memory, folds the grades into their scores and persists all
    /// successful updates with a single `update_score_batch` call.
    ///
    /// Grading failures are logged and skipped. A repository failure is returned and
    /// means nothing was persisted.
    pub async fn collect_and_apply_feedback(
        &self,
        agent_id: &str,
        used_memories: &[AgentMemory],
        execution: &TaskExecution,
        now: DateTime<Utc>,
    ) -> Result<FeedbackReport> {
        if used_memories.is_empty() {
            return Ok(FeedbackReport::default());
        }

        let mut seen = HashSet::new();
        let unique: Vec<&AgentMemory> = used_memories
            .iter()
            .filter(|m| seen.insert(m.id.as_str()))
            .collect();

        let outcomes: Vec<(&AgentMemory, Result<MemoryFeedback>)> = stream::iter(unique)
            .map(|memory| async move { (memory, self.grade_one(memory, execution).await) })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let mut report = FeedbackReport::default();
        let current = if outcomes.iter().any(|(_, outcome)| outcome.is_ok()) {
            self.current_records(agent_id).await?
        } else {
            HashMap::new()
        };

        for (memory, outcome) in outcomes {
            match outcome {
                Ok(feedback) => {
                    let Some(stored) = current.get(&memory.id) else {
                        warn!(
                            agent_id = %agent_id,
                            memory_id = %memory.id,
                            "Graded memory is no longer stored"
                        );
                        report.failed.push(memory.id.clone());
                        continue;
                    };
                    let score = self.scoring.apply_graded(stored, &feedback);
                    report
                        .updates
                        .insert(memory.id.clone(), ScoreUpdate::used_at(score, now));
                }
                Err(e) => {
                    warn!(
                        agent_id = %agent_id,
                        memory_id = %memory.id,
                        error = %e,
                        "Memory grading failed, leaving it untouched"
                    );
                    report.failed.push(memory.id.clone());
                }
            }
        }
        report.failed.sort();

        if report.updates.is_empty() {
            debug!(agent_id = %agent_id, failed = report.failed.len(), "No memory graded");
            return Ok(report);
        }

        self.repository
            .update_score_batch(agent_id, &report.updates)
            .await?;

        info!(
            agent_id = %agent_id,
            updated = report.updates.len(),
            failed = report.failed.len(),
            "Memory feedback applied"
        );
        Ok(report)
    }

    /// Stored state of the agent's memories, so grades fold into the latest score rather
    /// than the caller's copy.
    async fn current_records(&self, agent_id: &str) -> Result<HashMap<String, AgentMemory>> {
        Ok(self
            .repository
            .list_by_agent(agent_id)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect())
    }

    async fn grade_one(
        &self,
        memory: &AgentMemory,
        execution: &TaskExecution,
    ) -> Result<MemoryFeedback> {
        let grading = self.grader.grade(memory, execution);
        let feedback = match self.config.grading_timeout() {
            Some(limit) => tokio::time::timeout(limit, grading)
                .await
                .map_err(|_| AgentError::grading(&memory.id, "grading timed out"))??,
            None => grading.await?,
        };
        feedback.validate(&memory.id)?;
        Ok(feedback)
    }
}

impl std::fmt::Debug for FeedbackCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackCollector")
            .field("scoring", &self.scoring)
            .field("config", &self.config)
            .finish()
    }
}
