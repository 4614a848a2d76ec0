//! Memory quality configuration
//!
//! Every knob the engines use lives here with its default, so that defaults can be
//! overridden per service (e.g. per agent profile) and validated once at construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use triage_core::{AgentError, Result};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    #[serde(default)]
    pub bounds: ScoreBounds,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub pruning: PruningConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Closed interval every persisted score must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBounds {
    #[serde(default = "default_score_min")]
    pub min: f64,
    #[serde(default = "default_score_max")]
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Candidates scoring below this never reach a prompt.
    #[serde(default = "default_filter_min_quality")]
    pub filter_min_quality: f64,

    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,

    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,

    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    #[serde(default = "default_half_life_days")]
    pub recency_half_life_days: f64,

    /// Candidates requested from the nearest-neighbour search.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Memories surfaced into a prompt.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    #[serde(default = "default_helpful_delta")]
    pub helpful_delta: f64,

    #[serde(default = "default_harmful_delta")]
    pub harmful_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruningConfig {
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    #[serde(default = "default_harmful_threshold")]
    pub harmful_threshold: f64,

    #[serde(default = "default_harmful_stale_days")]
    pub harmful_stale_days: i64,

    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,

    #[serde(default = "default_moderate_stale_days")]
    pub moderate_stale_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Gradings in flight at once for one task execution.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-grading timeout; a timed out grading counts as failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading_timeout_secs: Option<u64>,
}

fn default_embedding_dimension() -> usize {
    256
}

fn default_score_min() -> f64 {
    -10.0
}

fn default_score_max() -> f64 {
    10.0
}

fn default_filter_min_quality() -> f64 {
    -5.0
}

fn default_similarity_weight() -> f64 {
    0.5
}

fn default_quality_weight() -> f64 {
    0.3
}

fn default_recency_weight() -> f64 {
    0.2
}

fn default_half_life_days() -> f64 {
    30.0
}

fn default_search_limit() -> usize {
    50
}

fn default_top_k() -> usize {
    5
}

fn default_alpha() -> f64 {
    0.3
}

fn default_helpful_delta() -> f64 {
    2.0
}

fn default_harmful_delta() -> f64 {
    -3.0
}

fn default_critical_threshold() -> f64 {
    -8.0
}

fn default_harmful_threshold() -> f64 {
    -5.0
}

fn default_harmful_stale_days() -> i64 {
    90
}

fn default_moderate_threshold() -> f64 {
    -3.0
}

fn default_moderate_stale_days() -> i64 {
    180
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self {
            min: default_score_min(),
            max: default_score_max(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            filter_min_quality: default_filter_min_quality(),
            similarity_weight: default_similarity_weight(),
            quality_weight: default_quality_weight(),
            recency_weight: default_recency_weight(),
            recency_half_life_days: default_half_life_days(),
            search_limit: default_search_limit(),
            top_k: default_top_k(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            helpful_delta: default_helpful_delta(),
            harmful_delta: default_harmful_delta(),
        }
    }
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            critical_threshold: default_critical_threshold(),
            harmful_threshold: default_harmful_threshold(),
            harmful_stale_days: default_harmful_stale_days(),
            moderate_threshold: default_moderate_threshold(),
            moderate_stale_days: default_moderate_stale_days(),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            grading_timeout_secs: None,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: default_embedding_dimension(),
            bounds: ScoreBounds::default(),
            selection: SelectionConfig::default(),
            scoring: ScoringConfig::default(),
            pruning: PruningConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl ScoreBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(AgentError::invalid_config("bounds", "must be finite"));
        }
        if self.min >= self.max {
            return Err(AgentError::invalid_config(
                "bounds",
                format!("min {} must be below max {}", self.min, self.max),
            ));
        }
        Ok(())
    }

    /// Clamp into `[min, max]`. NaN collapses to the midpoint.
    pub fn clamp(&self, score: f64) -> f64 {
        if score.is_nan() {
            return (self.min + self.max) / 2.0;
        }
        score.clamp(self.min, self.max)
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }

    pub fn normalize(&self, score: f64) -> f64 {
        crate::math::normalize_score(score, self.min, self.max)
    }
}

impl SelectionConfig {
    pub fn with_weights(mut self, similarity: f64, quality: f64, recency: f64) -> Self {
        self.similarity_weight = similarity;
        self.quality_weight = quality;
        self.recency_weight = recency;
        self
    }

    pub fn with_filter_min_quality(mut self, min: f64) -> Self {
        self.filter_min_quality = min;
        self
    }

    pub fn with_half_life_days(mut self, days: f64) -> Self {
        self.recency_half_life_days = days;
        self
    }

    pub fn with_limits(mut self, search_limit: usize, top_k: usize) -> Self {
        self.search_limit = search_limit;
        self.top_k = top_k;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("selection.similarity_weight", self.similarity_weight),
            ("selection.quality_weight", self.quality_weight),
            ("selection.recency_weight", self.recency_weight),
        ];
        for (field, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AgentError::invalid_config(
                    field,
                    format!("must be a non-negative number, got {}", weight),
                ));
            }
        }

        let sum = self.similarity_weight + self.quality_weight + self.recency_weight;
        if sum > 1.0 + WEIGHT_SUM_TOLERANCE {
            return Err(AgentError::invalid_config(
                "selection",
                format!("weights must sum to at most 1.0, got {}", sum),
            ));
        }

        if !self.recency_half_life_days.is_finite() || self.recency_half_life_days <= 0.0 {
            return Err(AgentError::invalid_config(
                "selection.recency_half_life_days",
                "must be positive",
            ));
        }

        if !self.filter_min_quality.is_finite() {
            return Err(AgentError::invalid_config(
                "selection.filter_min_quality",
                "must be finite",
            ));
        }

        if self.top_k > self.search_limit {
            return Err(AgentError::invalid_config(
                "selection.top_k",
                format!(
                    "top_k {} exceeds search_limit {}",
                    self.top_k, self.search_limit
                ),
            ));
        }

        Ok(())
    }
}

impl ScoringConfig {
    /// Faster-moving profile: heavier weight on the newest verdict and larger deltas.
    pub fn aggressive() -> Self {
        Self {
            alpha: 0.5,
            helpful_delta: 3.0,
            harmful_delta: -5.0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_deltas(mut self, helpful: f64, harmful: f64) -> Self {
        self.helpful_delta = helpful;
        self.harmful_delta = harmful;
        self
    }

    pub fn validate(&self, bounds: &ScoreBounds) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(AgentError::invalid_config(
                "scoring.alpha",
                format!("must be within [0, 1], got {}", self.alpha),
            ));
        }
        if !(self.helpful_delta >= 0.0 && self.helpful_delta <= bounds.max) {
            return Err(AgentError::invalid_config(
                "scoring.helpful_delta",
                format!("must be within [0, {}], got {}", bounds.max, self.helpful_delta),
            ));
        }
        if !(self.harmful_delta <= 0.0 && self.harmful_delta >= bounds.min) {
            return Err(AgentError::invalid_config(
                "scoring.harmful_delta",
                format!("must be within [{}, 0], got {}", bounds.min, self.harmful_delta),
            ));
        }
        Ok(())
    }
}

impl PruningConfig {
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            self.critical_threshold,
            self.harmful_threshold,
            self.moderate_threshold,
        ];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(AgentError::invalid_config(
                "pruning",
                "thresholds must be finite",
            ));
        }
        if !(self.critical_threshold <= self.harmful_threshold
            && self.harmful_threshold <= self.moderate_threshold)
        {
            return Err(AgentError::invalid_config(
                "pruning",
                "thresholds must be ordered critical <= harmful <= moderate",
            ));
        }
        if self.harmful_stale_days < 0 || self.harmful_stale_days > self.moderate_stale_days {
            return Err(AgentError::invalid_config(
                "pruning",
                "stale days must be ordered 0 <= harmful_stale_days <= moderate_stale_days",
            ));
        }
        Ok(())
    }
}

impl FeedbackConfig {
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_grading_timeout_secs(mut self, secs: u64) -> Self {
        self.grading_timeout_secs = Some(secs);
        self
    }

    pub fn grading_timeout(&self) -> Option<std::time::Duration> {
        self.grading_timeout_secs.map(std::time::Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(AgentError::invalid_config(
                "feedback.max_concurrency",
                "must be at least 1",
            ));
        }
        if self.grading_timeout_secs == Some(0) {
            return Err(AgentError::invalid_config(
                "feedback.grading_timeout_secs",
                "must be positive when set",
            ));
        }
        Ok(())
    }
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    pub fn with_bounds(mut self, bounds: ScoreBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_pruning(mut self, pruning: PruningConfig) -> Self {
        self.pruning = pruning;
        self
    }

    pub fn with_feedback(mut self, feedback: FeedbackConfig) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(AgentError::invalid_config(
                "embedding_dimension",
                "must be at least 1",
            ));
        }
        self.bounds.validate()?;
        self.selection.validate()?;
        self.scoring.validate(&self.bounds)?;
        self.pruning.validate()?;
        self.feedback.validate()?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: MemoryConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }
}
