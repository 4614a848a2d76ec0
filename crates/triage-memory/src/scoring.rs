//! Folding feedback into persisted quality scores

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use triage_core::{AgentMemory, MemoryFeedback, Reflection, Result};

use crate::config::{ScoreBounds, ScoringConfig};
use crate::math::ema;

/// Turns a previous score and one observation into a new score.
///
/// The engine clamps whatever the strategy returns, so implementations do not
/// need to know the bounds.
pub trait ScoringStrategy: Send + Sync {
    fn update(&self, old_score: f64, observation: f64) -> f64;

    /// Observation used when a reflection marks a memory helpful.
    fn helpful_delta(&self) -> f64;

    /// Observation used when a reflection marks a memory harmful.
    fn harmful_delta(&self) -> f64;

    fn name(&self) -> &'static str;
}

/// Exponential moving average: `alpha * observation + (1 - alpha) * old`.
#[derive(Debug, Clone)]
pub struct EmaScoring {
    config: ScoringConfig,
}

impl EmaScoring {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn alpha(&self) -> f64 {
        self.config.alpha
    }
}

impl Default for EmaScoring {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl ScoringStrategy for EmaScoring {
    fn update(&self, old_score: f64, observation: f64) -> f64 {
        ema(old_score, observation, self.config.alpha)
    }

    fn helpful_delta(&self) -> f64 {
        self.config.helpful_delta
    }

    fn harmful_delta(&self) -> f64 {
        self.config.harmful_delta
    }

    fn name(&self) -> &'static str {
        "ema"
    }
}

type ScoreFn = dyn Fn(f64, f64) -> f64 + Send + Sync;

/// Closure-backed strategy for ad-hoc policies.
pub struct FnScoring {
    name: &'static str,
    update: Box<ScoreFn>,
    helpful_delta: f64,
    harmful_delta: f64,
}

impl FnScoring {
    pub fn new<F>(name: &'static str, update: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        let defaults = ScoringConfig::default();
        Self {
            name,
            update: Box::new(update),
            helpful_delta: defaults.helpful_delta,
            harmful_delta: defaults.harmful_delta,
        }
    }

    pub fn with_deltas(mut self, helpful: f64, harmful: f64) -> Self {
        self.helpful_delta = helpful;
        self.harmful_delta = harmful;
        self
    }
}

impl ScoringStrategy for FnScoring {
    fn update(&self, old_score: f64, observation: f64) -> f64 {
        (self.update)(old_score, observation)
    }

    fn helpful_delta(&self) -> f64 {
        self.helpful_delta
    }

    fn harmful_delta(&self) -> f64 {
        self.harmful_delta
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for FnScoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnScoring")
            .field("name", &self.name)
            .field("helpful_delta", &self.helpful_delta)
            .field("harmful_delta", &self.harmful_delta)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Helpful,
    Harmful,
}

#[derive(Clone)]
pub struct ScoringEngine {
    strategy: Arc<dyn ScoringStrategy>,
    bounds: ScoreBounds,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig, bounds: ScoreBounds) -> Result<Self> {
        bounds.validate()?;
        config.validate(&bounds)?;
        Ok(Self {
            strategy: Arc::new(EmaScoring::new(config)),
            bounds,
        })
    }

    pub fn with_strategy(strategy: Arc<dyn ScoringStrategy>, bounds: ScoreBounds) -> Result<Self> {
        bounds.validate()?;
        Ok(Self { strategy, bounds })
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn bounds(&self) -> ScoreBounds {
        self.bounds
    }

    /// One strategy step, clamped into the bounds.
    ///
    /// A non-finite strategy result keeps the (clamped) old score.
    pub fn update_score(&self, old_score: f64, observation: f64) -> f64 {
        let updated = self.strategy.update(old_score, observation);
        if updated.is_finite() {
            self.bounds.clamp(updated)
        } else {
            warn!(
                strategy = self.strategy.name(),
                old_score, observation, "Scoring strategy produced a non-finite score"
            );
            self.bounds.clamp(old_score)
        }
    }

    /// Binary helpful/harmful path.
    ///
    /// Returns the new score for every reflected ID present in `memories`; other IDs
    /// are skipped. An ID listed as both helpful and harmful is updated once with the
    /// harmful delta.
    pub fn apply_feedback(
        &self,
        memories: &HashMap<String, AgentMemory>,
        reflection: &Reflection,
    ) -> HashMap<String, f64> {
        let conflicts = reflection.conflicting_ids();
        if !conflicts.is_empty() {
            warn!(
                ids = ?conflicts,
                "Memories marked both helpful and harmful; applying harmful delta"
            );
        }

        let mut verdicts: HashMap<&str, Verdict> = HashMap::new();
        for id in &reflection.helpful_memories {
            verdicts.entry(id.as_str()).or_insert(Verdict::Helpful);
        }
        for id in &reflection.harmful_memories {
            verdicts.insert(id.as_str(), Verdict::Harmful);
        }

        let mut scores = HashMap::with_capacity(verdicts.len());
        for (id, verdict) in verdicts {
            let Some(memory) = memories.get(id) else {
                debug!(memory_id = %id, "Reflection referenced a memory outside this batch");
                continue;
            };
            let delta = match verdict {
                Verdict::Helpful => self.strategy.helpful_delta(),
                Verdict::Harmful => self.strategy.harmful_delta(),
            };
            let new_score = self.update_score(memory.score, delta);
            debug!(
                memory_id = %id,
                verdict = ?verdict,
                old_score = memory.score,
                new_score,
                "Memory score updated"
            );
            scores.insert(id.to_string(), new_score);
        }
        scores
    }

    /// Graded path: the observation is the feedback's normalized score.
    pub fn apply_graded(&self, memory: &AgentMemory, feedback: &MemoryFeedback) -> f64 {
        let new_score = self.update_score(memory.score, feedback.normalized_score());
        debug!(
            memory_id = %memory.id,
            old_score = memory.score,
            observation = feedback.normalized_score(),
            new_score,
            "Memory score updated from grading"
        );
        new_score
    }
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("strategy", &self.strategy.name())
            .field("bounds", &self.bounds)
            .finish()
    }
}
