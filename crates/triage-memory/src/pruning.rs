//! Tiered retention policy

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use triage_core::{AgentMemory, Result};

use crate::config::PruningConfig;
use crate::math::whole_days_since;

/// Why a memory is eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneCriterion {
    /// Score at or below the critical threshold, regardless of age.
    Critical,
    HarmfulStale,
    ModerateVeryStale,
}

impl fmt::Display for PruneCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneCriterion::Critical => write!(f, "critical"),
            PruneCriterion::HarmfulStale => write!(f, "harmful_stale"),
            PruneCriterion::ModerateVeryStale => write!(f, "moderate_very_stale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneDecision {
    pub memory_id: String,
    pub criterion: PruneCriterion,
    pub score: f64,
    pub days_since_used: i64,
}

pub trait PruningStrategy: Send + Sync {
    /// `Some` marks the memory for deletion. Each memory is judged on its own.
    fn evaluate(&self, memory: &AgentMemory, now: DateTime<Utc>) -> Option<PruneCriterion>;

    fn name(&self) -> &'static str;
}

/// Critical score, then harmful and stale, then moderate and very stale. First match wins.
#[derive(Debug, Clone, Default)]
pub struct TieredPruning {
    config: PruningConfig,
}

impl TieredPruning {
    pub fn new(config: PruningConfig) -> Self {
        Self { config }
    }
}

impl PruningStrategy for TieredPruning {
    fn evaluate(&self, memory: &AgentMemory, now: DateTime<Utc>) -> Option<PruneCriterion> {
        let score = memory.score;
        if score <= self.config.critical_threshold {
            return Some(PruneCriterion::Critical);
        }

        let days = whole_days_since(memory.last_activity(), now);
        if score <= self.config.harmful_threshold && days >= self.config.harmful_stale_days {
            return Some(PruneCriterion::HarmfulStale);
        }
        if score <= self.config.moderate_threshold && days >= self.config.moderate_stale_days {
            return Some(PruneCriterion::ModerateVeryStale);
        }
        None
    }

    fn name(&self) -> &'static str {
        "tiered"
    }
}

#[derive(Clone)]
pub struct PruningEngine {
    strategy: Arc<dyn PruningStrategy>,
}

impl PruningEngine {
    pub fn new(config: PruningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_strategy(Arc::new(TieredPruning::new(config))))
    }

    pub fn with_strategy(strategy: Arc<dyn PruningStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// IDs eligible for deletion, in input order.
    pub fn select_for_deletion(&self, memories: &[AgentMemory], now: DateTime<Utc>) -> Vec<String> {
        self.plan(memories, now)
            .into_iter()
            .map(|decision| decision.memory_id)
            .collect()
    }

    pub fn plan(&self, memories: &[AgentMemory], now: DateTime<Utc>) -> Vec<PruneDecision> {
        let decisions: Vec<PruneDecision> = memories
            .iter()
            .filter_map(|memory| {
                let criterion = self.strategy.evaluate(memory, now)?;
                let days_since_used = whole_days_since(memory.last_activity(), now);
                debug!(
                    memory_id = %memory.id,
                    %criterion,
                    score = memory.score,
                    days_since_used,
                    "Memory eligible for pruning"
                );
                Some(PruneDecision {
                    memory_id: memory.id.clone(),
                    criterion,
                    score: memory.score,
                    days_since_used,
                })
            })
            .collect();

        if !decisions.is_empty() {
            info!(
                strategy = self.strategy.name(),
                examined = memories.len(),
                eligible = decisions.len(),
                "Pruning plan computed"
            );
        }
        decisions
    }
}

impl fmt::Debug for PruningEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PruningEngine")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
