//! Quality-gated, weighted ranking of candidate memories

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use triage_core::{AgentMemory, Result};

use crate::config::{ScoreBounds, SelectionConfig};
use crate::math::{cosine_similarity, recency_score};

/// Breakdown of how one candidate was ranked.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    pub memory: AgentMemory,
    pub similarity: f64,
    pub quality: f64,
    pub recency: f64,
    pub final_score: f64,
}

/// Decides which candidates may enter a prompt and how they rank.
pub trait SelectionStrategy: Send + Sync {
    /// `false` drops the candidate before ranking.
    fn admits(&self, memory: &AgentMemory) -> bool;

    fn score(&self, memory: &AgentMemory, query_embedding: &[f32], now: DateTime<Utc>)
    -> ScoredMemory;

    fn name(&self) -> &'static str;
}

/// `w_sim * cosine + w_qual * normalize(score) + w_rec * recency`.
#[derive(Debug, Clone)]
pub struct WeightedSelection {
    config: SelectionConfig,
    bounds: ScoreBounds,
}

impl WeightedSelection {
    pub fn new(config: SelectionConfig, bounds: ScoreBounds) -> Self {
        Self { config, bounds }
    }
}

impl SelectionStrategy for WeightedSelection {
    fn admits(&self, memory: &AgentMemory) -> bool {
        // NaN scores fail the gate as well
        memory.score >= self.config.filter_min_quality
    }

    fn score(
        &self,
        memory: &AgentMemory,
        query_embedding: &[f32],
        now: DateTime<Utc>,
    ) -> ScoredMemory {
        let similarity = cosine_similarity(query_embedding, &memory.query_embedding);
        let quality = self.bounds.normalize(memory.score);
        let recency = recency_score(memory.last_used_at, now, self.config.recency_half_life_days);
        let final_score = self.config.similarity_weight * similarity
            + self.config.quality_weight * quality
            + self.config.recency_weight * recency;

        ScoredMemory {
            memory: memory.clone(),
            similarity,
            quality,
            recency,
            final_score,
        }
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}

#[derive(Clone)]
pub struct SelectionEngine {
    strategy: Arc<dyn SelectionStrategy>,
}

impl SelectionEngine {
    pub fn new(config: SelectionConfig, bounds: ScoreBounds) -> Result<Self> {
        config.validate()?;
        bounds.validate()?;
        Ok(Self::with_strategy(Arc::new(WeightedSelection::new(
            config, bounds,
        ))))
    }

    pub fn with_strategy(strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Top `limit` candidates by composite score, best first.
    pub fn select(
        &self,
        candidates: &[AgentMemory],
        query_embedding: &[f32],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<AgentMemory> {
        self.select_scored(candidates, query_embedding, limit, now)
            .into_iter()
            .map(|scored| scored.memory)
            .collect()
    }

    /// Same as [`select`](Self::select) but keeps the score breakdown.
    ///
    /// Ties keep input order.
    pub fn select_scored(
        &self,
        candidates: &[AgentMemory],
        query_embedding: &[f32],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let mut scored: Vec<ScoredMemory> = candidates
            .iter()
            .filter(|memory| {
                let admitted = self.strategy.admits(memory);
                if !admitted {
                    debug!(
                        memory_id = %memory.id,
                        score = memory.score,
                        "Memory dropped by quality gate"
                    );
                }
                admitted
            })
            .map(|memory| self.strategy.score(memory, query_embedding, now))
            .collect();

        scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        scored.truncate(limit);

        debug!(
            strategy = self.strategy.name(),
            candidates = candidates.len(),
            selected = scored.len(),
            "Memories selected"
        );
        scored
    }
}

impl std::fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn engine() -> SelectionEngine {
        SelectionEngine::new(SelectionConfig::default(), ScoreBounds::default()).unwrap()
    }

    fn memory(id: &str, embedding: Vec<f32>, score: f64) -> AgentMemory {
        AgentMemory::new("bigquery", "q", format!("claim {}", id))
            .with_id(id)
            .with_embedding(embedding)
            .with_score(score)
            .with_created_at(fixed_now() - Duration::days(400))
    }

    #[test]
    fn test_ranking_scenario() {
        let now = fixed_now();
        let a = memory("a", vec![1.0, 0.0], 5.0).with_last_used_at(now);
        let b = memory("b", vec![0.6, 0.8], 0.0).with_last_used_at(now - Duration::days(30));
        let c = memory("c", vec![0.0, 1.0], 10.0);

        let scored = engine().select_scored(&[c, b, a], &[1.0, 0.0], 10, now);
        let ids: Vec<&str> = scored.iter().map(|s| s.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert!((scored[0].final_score - 0.925).abs() < 1e-6);
        assert!((scored[1].final_score - 0.55).abs() < 1e-6);
        assert!((scored[2].final_score - 0.3).abs() < 1e-6);
        assert_eq!(scored[2].recency, 0.0);
    }

    #[test]
    fn test_quality_gate_excludes_just_below_threshold() {
        let now = fixed_now();
        let below = memory("below", vec![1.0, 0.0], -5.0 - 1e-9).with_last_used_at(now);
        let at = memory("at", vec![0.0, 1.0], -5.0);

        let selected = engine().select(&[below, at], &[1.0, 0.0], 10, now);
        let ids: Vec<&str> = selected.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["at"]);
    }

    #[test]
    fn test_nan_score_never_selected() {
        let candidates = vec![memory("nan", vec![1.0, 0.0], f64::NAN)];
        assert!(engine().select(&candidates, &[1.0, 0.0], 5, fixed_now()).is_empty());
    }

    #[test]
    fn test_limit_and_short_pool() {
        let now = fixed_now();
        let candidates: Vec<_> = (0..4)
            .map(|i| memory(&format!("m{}", i), vec![1.0, i as f32], 0.0))
            .collect();

        assert_eq!(engine().select(&candidates, &[1.0, 0.0], 2, now).len(), 2);
        assert_eq!(engine().select(&candidates, &[1.0, 0.0], 10, now).len(), 4);
        assert!(engine().select(&[], &[1.0, 0.0], 10, now).is_empty());
    }

    #[test]
    fn test_ties_keep_input_order() {
        let now = fixed_now();
        let candidates = vec![
            memory("first", vec![1.0, 0.0], 1.0),
            memory("second", vec![1.0, 0.0], 1.0),
            memory("third", vec![1.0, 0.0], 1.0),
        ];
        let ids: Vec<String> = engine()
            .select(&candidates, &[1.0, 0.0], 3, now)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_mismatched_embedding_scores_zero_similarity() {
        let now = fixed_now();
        let legacy = memory("legacy", vec![], 0.0);
        let wrong_dim = memory("wrong", vec![1.0, 0.0, 0.0], 0.0);

        let scored = engine().select_scored(&[legacy, wrong_dim], &[1.0, 0.0], 5, now);
        assert_eq!(scored.len(), 2);
        assert!(scored.iter().all(|s| s.similarity == 0.0));
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let now = fixed_now();
        let candidates = vec![memory("m", vec![1.0, 0.0], 2.0)];
        let before = candidates.clone();
        let _ = engine().select(&candidates, &[1.0, 0.0], 1, now);
        assert_eq!(candidates, before);
    }

    #[test]
    fn test_custom_strategy() {
        struct NewestFirst;

        impl SelectionStrategy for NewestFirst {
            fn admits(&self, _memory: &AgentMemory) -> bool {
                true
            }

            fn score(
                &self,
                memory: &AgentMemory,
                _query_embedding: &[f32],
                _now: DateTime<Utc>,
            ) -> ScoredMemory {
                let final_score = memory.created_at.timestamp() as f64;
                ScoredMemory {
                    memory: memory.clone(),
                    similarity: 0.0,
                    quality: 0.0,
                    recency: 0.0,
                    final_score,
                }
            }

            fn name(&self) -> &'static str {
                "newest_first"
            }
        }

        let now = fixed_now();
        let old = memory("old", vec![1.0, 0.0], -9.0);
        let new = memory("new", vec![1.0, 0.0], -9.0).with_created_at(now);

        let engine = SelectionEngine::with_strategy(Arc::new(NewestFirst));
        assert_eq!(engine.strategy_name(), "newest_first");
        let selected = engine.select(&[old, new], &[1.0, 0.0], 1, now);
        assert_eq!(selected[0].id, "new");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SelectionConfig::default().with_weights(0.9, 0.9, 0.0);
        assert!(SelectionEngine::new(config, ScoreBounds::default()).is_err());
    }
}
