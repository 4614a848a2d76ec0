//! SOC triage agent memory

pub mod error {
    pub use triage_core::{AgentError, Result};
}

pub mod llm {
    pub use triage_core::{
        ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role,
        TokenUsage, format_transcript,
    };
    pub use triage_llm::{
        FEEDBACK_GRADING_TEMPLATE, LLMFeedbackGrader, LLMReflectionGenerator, LLMRegistry,
        MockCall, MockLLMProvider, REFLECTION_TEMPLATE, extract_json,
    };
}

pub mod memory {
    pub use triage_core::{
        AgentMemory, Embedder, FeedbackGrader, IMPACT_MAX, MemoryFeedback, RELEVANCE_MAX,
        Reflection, ReflectionGenerator, SUPPORT_MAX, ScoreUpdate, TaskExecution,
    };
    pub use triage_memory::{
        EmaScoring, FeedbackCollector, FeedbackConfig, FeedbackReport, FnScoring, MemoryConfig,
        MemoryService, MemoryServiceBuilder, PruneCriterion, PruneDecision, PruneReport,
        PruningConfig, PruningEngine, PruningStrategy, ReflectionOutcome, ScoreBounds,
        ScoreStats, ScoredMemory, ScoringConfig, ScoringEngine, ScoringStrategy,
        SelectionConfig, SelectionEngine, SelectionStrategy, TieredPruning, WeightedSelection,
        cosine_similarity, recency_score, render_memories,
    };
}

pub mod persistence {
    pub use triage_core::MemoryRepository;
    #[cfg(feature = "sqlite")]
    pub use triage_storage::SqliteMemoryRepository;
    pub use triage_storage::{
        FileMemoryRepository, InMemoryRepository, StorageConfig, create_repository,
    };
}

pub mod spec;

pub use error::{AgentError, Result};
pub use spec::{MemorySpec, create_memory_service, create_memory_service_with_registry};

/// Installs a fmt subscriber filtered by `RUST_LOG`, or `default_filter` when unset.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
