//! Quality-managed agent memory
//!
//! Retrieval ranks nearest-neighbour candidates by similarity, quality and recency.
//! Feedback folds graded opinions into each memory's score with an EMA, and pruning
//! removes memories that proved harmful or went stale.

pub mod config;
pub mod feedback;
pub mod in_memory;
pub mod math;
pub mod pruning;
pub mod render;
pub mod scoring;
pub mod selection;
pub mod service;
pub mod stats;

pub use config::{
    FeedbackConfig, MemoryConfig, PruningConfig, ScoreBounds, ScoringConfig, SelectionConfig,
};
pub use feedback::{FeedbackCollector, FeedbackReport};
pub use in_memory::{InMemoryRepository, rank_by_similarity};
pub use math::{cosine_similarity, recency_score};
pub use pruning::{PruneCriterion, PruneDecision, PruningEngine, PruningStrategy, TieredPruning};
pub use render::render_memories;
pub use scoring::{EmaScoring, FnScoring, ScoringEngine, ScoringStrategy};
pub use selection::{ScoredMemory, SelectionEngine, SelectionStrategy, WeightedSelection};
pub use service::{MemoryService, MemoryServiceBuilder, PruneReport, ReflectionOutcome};
pub use stats::ScoreStats;
