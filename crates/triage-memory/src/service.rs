//! Memory lifecycle over a repository: retrieve, record, grade, prune

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use triage_core::{
    AgentError, AgentMemory, Embedder, FeedbackGrader, MemoryRepository, Reflection,
    ReflectionGenerator, Result, ScoreUpdate, TaskExecution,
};

use crate::config::MemoryConfig;
use crate::feedback::{FeedbackCollector, FeedbackReport};
use crate::pruning::{PruneDecision, PruningEngine, PruningStrategy};
use crate::scoring::{ScoringEngine, ScoringStrategy};
use crate::selection::{SelectionEngine, SelectionStrategy};
use crate::stats::ScoreStats;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneReport {
    pub examined: usize,
    pub deleted: usize,
    pub ids: Vec<String>,
}

/// What a reflection round changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionOutcome {
    pub reflection: Reflection,
    /// Memory saved for the new claims, if there were any.
    pub new_memory: Option<AgentMemory>,
    pub score_updates: HashMap<String, f64>,
}

pub struct MemoryService {
    config: MemoryConfig,
    repository: Arc<dyn MemoryRepository>,
    selection: SelectionEngine,
    scoring: ScoringEngine,
    pruning: PruningEngine,
    feedback: FeedbackCollector,
    embedder: Option<Arc<dyn Embedder>>,
    reflector: Option<Arc<dyn ReflectionGenerator>>,
}

pub struct MemoryServiceBuilder {
    config: MemoryConfig,
    repository: Arc<dyn MemoryRepository>,
    grader: Arc<dyn FeedbackGrader>,
    embedder: Option<Arc<dyn Embedder>>,
    reflector: Option<Arc<dyn ReflectionGenerator>>,
    selection_strategy: Option<Arc<dyn SelectionStrategy>>,
    scoring_strategy: Option<Arc<dyn ScoringStrategy>>,
    pruning_strategy: Option<Arc<dyn PruningStrategy>>,
}

impl MemoryServiceBuilder {
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_reflection_generator(mut self, reflector: Arc<dyn ReflectionGenerator>) -> Self {
        self.reflector = Some(reflector);
        self
    }

    pub fn with_selection_strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.selection_strategy = Some(strategy);
        self
    }

    pub fn with_scoring_strategy(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.scoring_strategy = Some(strategy);
        self
    }

    pub fn with_pruning_strategy(mut self, strategy: Arc<dyn PruningStrategy>) -> Self {
        self.pruning_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> Result<MemoryService> {
        self.config.validate()?;

        if let Some(embedder) = &self.embedder {
            if embedder.dimension() != self.config.embedding_dimension {
                return Err(AgentError::invalid_config(
                    "embedding_dimension",
                    format!(
                        "embedder produces {} dimensions, config expects {}",
                        embedder.dimension(),
                        self.config.embedding_dimension
                    ),
                ));
            }
        }

        let bounds = self.config.bounds;
        let selection = match self.selection_strategy {
            Some(strategy) => SelectionEngine::with_strategy(strategy),
            None => SelectionEngine::new(self.config.selection.clone(), bounds)?,
        };
        let scoring = match self.scoring_strategy {
            Some(strategy) => ScoringEngine::with_strategy(strategy, bounds)?,
            None => ScoringEngine::new(self.config.scoring.clone(), bounds)?,
        };
        let pruning = match self.pruning_strategy {
            Some(strategy) => PruningEngine::with_strategy(strategy),
            None => PruningEngine::new(self.config.pruning.clone())?,
        };
        let feedback = FeedbackCollector::new(
            Arc::clone(&self.repository),
            self.grader,
            scoring.clone(),
            self.config.feedback.clone(),
        )?;

        Ok(MemoryService {
            config: self.config,
            repository: self.repository,
            selection,
            scoring,
            pruning,
            feedback,
            embedder: self.embedder,
            reflector: self.reflector,
        })
    }
}

impl MemoryService {
    pub fn builder(
        config: MemoryConfig,
        repository: Arc<dyn MemoryRepository>,
        grader: Arc<dyn FeedbackGrader>,
    ) -> MemoryServiceBuilder {
        MemoryServiceBuilder {
            config,
            repository,
            grader,
            embedder: None,
            reflector: None,
            selection_strategy: None,
            scoring_strategy: None,
            pruning_strategy: None,
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn MemoryRepository> {
        &self.repository
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn pruning(&self) -> &PruningEngine {
        &self.pruning
    }

    /// Nearest-neighbour candidates narrowed to the configured top-k.
    pub async fn retrieve(
        &self,
        agent_id: &str,
        query_embedding: &[f32],
        now: DateTime<Utc>,
    ) -> Result<Vec<AgentMemory>> {
        let selection = &self.config.selection;
        let candidates = self
            .repository
            .find_nearest_by_agent(agent_id, query_embedding, selection.search_limit)
            .await?;
        let selected = self
            .selection
            .select(&candidates, query_embedding, selection.top_k, now);
        debug!(
            agent_id = %agent_id,
            candidates = candidates.len(),
            selected = selected.len(),
            "Memories retrieved"
        );
        Ok(selected)
    }

    /// Embeds `query` and retrieves. An embedding failure yields no memories.
    pub async fn retrieve_for_query(
        &self,
        agent_id: &str,
        query: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AgentMemory>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AgentError::Config("no embedder configured".into()))?;

        match embedder.embed(query).await {
            Ok(embedding) => self.retrieve(agent_id, &embedding, now).await,
            Err(e) => {
                warn!(
                    agent_id = %agent_id,
                    error = %e,
                    "Query embedding failed, continuing without memories"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Reflects on a finished task: applies the helpful/harmful verdicts to the memories
    /// that were used, then saves one memory for its new claims.
    ///
    /// Verdicts fold into the stored scores, so grading the same memories beforehand is
    /// not lost. Used memories that are no longer stored are skipped.
    ///
    /// Returns `Ok(None)` when no reflection generator is configured or reflection fails.
    pub async fn record_execution(
        &self,
        agent_id: &str,
        execution: &TaskExecution,
        used_memories: &[AgentMemory],
        now: DateTime<Utc>,
    ) -> Result<Option<ReflectionOutcome>> {
        let Some(reflector) = &self.reflector else {
            debug!(agent_id = %agent_id, "No reflection generator configured");
            return Ok(None);
        };

        let reflection = match reflector.reflect(execution, used_memories).await {
            Ok(reflection) => reflection,
            Err(e) => {
                warn!(
                    agent_id = %agent_id,
                    error = %e,
                    "Reflection failed, skipping memory update"
                );
                return Ok(None);
            }
        };

        let used: HashSet<&str> = used_memories.iter().map(|m| m.id.as_str()).collect();
        let current: HashMap<String, AgentMemory> = self
            .repository
            .list_by_agent(agent_id)
            .await?
            .into_iter()
            .filter(|m| used.contains(m.id.as_str()))
            .map(|m| (m.id.clone(), m))
            .collect();

        // Verdicts before the save: a failed batch write must leave no new memory stored
        let score_updates = self.scoring.apply_feedback(&current, &reflection);
        if !score_updates.is_empty() {
            let updates: HashMap<String, ScoreUpdate> = score_updates
                .iter()
                .map(|(id, score)| (id.clone(), ScoreUpdate::score_only(*score)))
                .collect();
            self.repository
                .update_score_batch(agent_id, &updates)
                .await?;
            info!(agent_id = %agent_id, updated = updates.len(), "Reflection verdicts applied");
        }

        let new_memory = if reflection.claims.is_empty() {
            None
        } else {
            let memory = self.build_memory(agent_id, execution, &reflection, now).await;
            self.repository.save(&memory).await?;
            info!(agent_id = %agent_id, memory_id = %memory.id, "Memory saved");
            Some(memory)
        };

        Ok(Some(ReflectionOutcome {
            reflection,
            new_memory,
            score_updates,
        }))
    }

    async fn build_memory(
        &self,
        agent_id: &str,
        execution: &TaskExecution,
        reflection: &Reflection,
        now: DateTime<Utc>,
    ) -> AgentMemory {
        let memory = AgentMemory::new(agent_id, &execution.query, reflection.claims.join("\n"))
            .with_created_at(now);

        let Some(embedder) = &self.embedder else {
            return memory;
        };
        match embedder.embed(&execution.query).await {
            Ok(embedding) if embedding.len() == self.config.embedding_dimension => {
                memory.with_embedding(embedding)
            }
            Ok(embedding) => {
                warn!(
                    agent_id = %agent_id,
                    got = embedding.len(),
                    expected = self.config.embedding_dimension,
                    "Embedding dimension mismatch, saving memory without embedding"
                );
                memory
            }
            Err(e) => {
                warn!(
                    agent_id = %agent_id,
                    error = %e,
                    "Embedding failed, saving memory without embedding"
                );
                memory
            }
        }
    }

    pub async fn collect_feedback(
        &self,
        agent_id: &str,
        used_memories: &[AgentMemory],
        execution: &TaskExecution,
        now: DateTime<Utc>,
    ) -> Result<FeedbackReport> {
        self.feedback
            .collect_and_apply_feedback(agent_id, used_memories, execution, now)
            .await
    }

    /// Which memories a prune would delete, without deleting them.
    pub async fn plan_prune(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PruneDecision>> {
        let memories = self.repository.list_by_agent(agent_id).await?;
        Ok(self.pruning.plan(&memories, now))
    }

    pub async fn prune(&self, agent_id: &str, now: DateTime<Utc>) -> Result<PruneReport> {
        let memories = self.repository.list_by_agent(agent_id).await?;
        let ids = self.pruning.select_for_deletion(&memories, now);

        let deleted = if ids.is_empty() {
            0
        } else {
            self.repository.delete_batch(agent_id, &ids).await?
        };

        info!(
            agent_id = %agent_id,
            examined = memories.len(),
            deleted,
            "Memory pruning completed"
        );
        Ok(PruneReport {
            examined: memories.len(),
            deleted,
            ids,
        })
    }

    pub async fn stats(&self, agent_id: &str) -> Result<ScoreStats> {
        let memories = self.repository.list_by_agent(agent_id).await?;
        Ok(ScoreStats::from_memories(
            &memories,
            self.config.selection.filter_min_quality,
        ))
    }
}

impl std::fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field("selection", &self.selection)
            .field("scoring", &self.scoring)
            .field("pruning", &self.pruning)
            .field("has_embedder", &self.embedder.is_some())
            .field("has_reflector", &self.reflector.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use triage_core::MemoryFeedback;
    use triage_llm::{LLMReflectionGenerator, MockLLMProvider};

    use crate::in_memory::InMemoryRepository;
    use crate::scoring::FnScoring;

    const DIM: usize = 2;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    /// "slack" queries point one way, everything else the other.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.is_empty() {
                return Err(AgentError::Embedding("empty text".into()));
            }
            if text.contains("slack") {
                Ok(vec![0.0, 1.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    struct FixedGrader(MemoryFeedback);

    #[async_trait]
    impl FeedbackGrader for FixedGrader {
        async fn grade(&self, _m: &AgentMemory, _e: &TaskExecution) -> Result<MemoryFeedback> {
            Ok(self.0)
        }
    }

    fn config() -> MemoryConfig {
        MemoryConfig::default().with_embedding_dimension(DIM)
    }

    fn service(repo: &InMemoryRepository) -> MemoryService {
        MemoryService::builder(
            config(),
            Arc::new(repo.clone()),
            Arc::new(FixedGrader(MemoryFeedback::new(3, 4, 3))),
        )
        .with_embedder(Arc::new(KeywordEmbedder))
        .build()
        .unwrap()
    }

    fn memory(id: &str, embedding: Vec<f32>, score: f64) -> AgentMemory {
        AgentMemory::new("bigquery", "q", format!("claim {}", id))
            .with_id(id)
            .with_embedding(embedding)
            .with_score(score)
            .with_created_at(fixed_now() - Duration::days(1))
    }

    #[tokio::test]
    async fn test_retrieve_gates_and_ranks() {
        let repo = InMemoryRepository::new(DIM);
        repo.save_batch(&[
            memory("good", vec![1.0, 0.0], 4.0),
            memory("ok", vec![1.0, 0.2], 0.0),
            memory("bad", vec![1.0, 0.0], -7.0),
        ])
        .await
        .unwrap();

        let found = service(&repo)
            .retrieve("bigquery", &[1.0, 0.0], fixed_now())
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "ok"]);
    }

    #[tokio::test]
    async fn test_retrieve_respects_top_k() {
        let repo = InMemoryRepository::new(DIM);
        let memories: Vec<_> = (0..8)
            .map(|i| memory(&format!("m{}", i), vec![1.0, i as f32 * 0.1], 0.0))
            .collect();
        repo.save_batch(&memories).await.unwrap();

        let found = service(&repo)
            .retrieve("bigquery", &[1.0, 0.0], fixed_now())
            .await
            .unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found[0].id, "m0");
    }

    #[tokio::test]
    async fn test_retrieve_for_query_embedding_failure_is_empty() {
        let repo = InMemoryRepository::new(DIM);
        repo.save(&memory("m", vec![1.0, 0.0], 0.0)).await.unwrap();
        let service = service(&repo);

        assert!(
            service
                .retrieve_for_query("bigquery", "", fixed_now())
                .await
                .unwrap()
                .is_empty()
        );
        let found = service
            .retrieve_for_query("bigquery", "failed logins", fixed_now())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_for_query_requires_embedder() {
        let repo = InMemoryRepository::new(DIM);
        let service = MemoryService::builder(
            config(),
            Arc::new(repo),
            Arc::new(FixedGrader(MemoryFeedback::new(2, 2, 1))),
        )
        .build()
        .unwrap();
        let err = service
            .retrieve_for_query("bigquery", "q", fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[tokio::test]
    async fn test_record_execution_saves_claims_and_applies_verdicts() {
        let repo = InMemoryRepository::new(DIM);
        let used_at = fixed_now() - Duration::days(3);
        let used = vec![
            memory("helpful", vec![1.0, 0.0], 0.0).with_last_used_at(used_at),
            memory("harmful", vec![1.0, 0.0], 0.0),
        ];
        repo.save_batch(&used).await.unwrap();

        let mock = MockLLMProvider::new("reflector");
        mock.set_response(
            r#"{"claims": ["auth_logs lags by 2h", "use the raw table"], "helpful_memories": ["helpful"], "harmful_memories": ["harmful", "ghost"]}"#,
        );
        let service = MemoryService::builder(
            config(),
            Arc::new(repo.clone()),
            Arc::new(FixedGrader(MemoryFeedback::new(2, 2, 1))),
        )
        .with_embedder(Arc::new(KeywordEmbedder))
        .with_reflection_generator(Arc::new(LLMReflectionGenerator::new(Arc::new(mock))))
        .build()
        .unwrap();

        let execution = TaskExecution::new("failed logins for alice").with_result("3 failures");
        let outcome = service
            .record_execution("bigquery", &execution, &used, fixed_now())
            .await
            .unwrap()
            .unwrap();

        let saved = outcome.new_memory.unwrap();
        assert_eq!(saved.claim, "auth_logs lags by 2h\nuse the raw table");
        assert_eq!(saved.query_embedding, vec![1.0, 0.0]);
        assert_eq!(saved.created_at, fixed_now());
        assert!(repo.get("bigquery", &saved.id).await.unwrap().is_some());

        assert_eq!(outcome.score_updates.len(), 2);
        let helpful = repo.get("bigquery", "helpful").await.unwrap().unwrap();
        assert!((helpful.score - 0.6).abs() < 1e-12);
        assert_eq!(helpful.last_used_at, Some(used_at));
        let harmful = repo.get("bigquery", "harmful").await.unwrap().unwrap();
        assert!((harmful.score + 0.9).abs() < 1e-12);
    }

    fn reflecting_service(
        repo: Arc<dyn MemoryRepository>,
        mock: MockLLMProvider,
    ) -> MemoryService {
        MemoryService::builder(
            config(),
            repo,
            Arc::new(FixedGrader(MemoryFeedback::new(3, 4, 3))),
        )
        .with_reflection_generator(Arc::new(LLMReflectionGenerator::new(Arc::new(mock))))
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn test_grade_then_reflect_on_one_snapshot_chains_updates() {
        let repo = InMemoryRepository::new(DIM);
        let used = vec![memory("m", vec![1.0, 0.0], 0.0)];
        repo.save_batch(&used).await.unwrap();

        let mock = MockLLMProvider::new("reflector");
        mock.set_response(r#"{"claims": [], "harmful_memories": ["m"]}"#);
        let service = reflecting_service(Arc::new(repo.clone()), mock);
        let execution = TaskExecution::new("failed logins");

        service
            .collect_feedback("bigquery", &used, &execution, fixed_now())
            .await
            .unwrap();
        let outcome = service
            .record_execution("bigquery", &execution, &used, fixed_now())
            .await
            .unwrap()
            .unwrap();

        // 0 -> 3.0 from the grade, then 0.7 * 3.0 + 0.3 * -3.0
        assert!((outcome.score_updates["m"] - 1.2).abs() < 1e-12);
        let stored = repo.get("bigquery", "m").await.unwrap().unwrap();
        assert!((stored.score - 1.2).abs() < 1e-12);
        assert_eq!(stored.last_used_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn test_record_execution_skips_verdicts_for_deleted_memories() {
        let repo = InMemoryRepository::new(DIM);
        let mock = MockLLMProvider::new("reflector");
        mock.set_response(r#"{"claims": [], "helpful_memories": ["gone"]}"#);
        let service = reflecting_service(Arc::new(repo.clone()), mock);

        let outcome = service
            .record_execution(
                "bigquery",
                &TaskExecution::new("q"),
                &[memory("gone", vec![1.0, 0.0], 0.0)],
                fixed_now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.score_updates.is_empty());
        assert!(repo.is_empty());
    }

    /// Delegates to an in-memory store but fails every batch score update.
    struct FailingBatchRepository {
        inner: InMemoryRepository,
    }

    #[async_trait]
    impl MemoryRepository for FailingBatchRepository {
        async fn save(&self, memory: &AgentMemory) -> Result<()> {
            self.inner.save(memory).await
        }

        async fn get(&self, agent_id: &str, id: &str) -> Result<Option<AgentMemory>> {
            self.inner.get(agent_id, id).await
        }

        async fn find_nearest_by_agent(
            &self,
            agent_id: &str,
            embedding: &[f32],
            limit: usize,
        ) -> Result<Vec<AgentMemory>> {
            self.inner.find_nearest_by_agent(agent_id, embedding, limit).await
        }

        async fn update_score_batch(
            &self,
            _agent_id: &str,
            _updates: &HashMap<String, ScoreUpdate>,
        ) -> Result<()> {
            Err(AgentError::Persistence("database is locked".into()))
        }

        async fn delete_batch(&self, agent_id: &str, ids: &[String]) -> Result<usize> {
            self.inner.delete_batch(agent_id, ids).await
        }

        async fn list_by_agent(&self, agent_id: &str) -> Result<Vec<AgentMemory>> {
            self.inner.list_by_agent(agent_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_verdict_write_saves_no_memory() {
        let inner = InMemoryRepository::new(DIM);
        let used = vec![memory("m", vec![1.0, 0.0], 0.0)];
        inner.save_batch(&used).await.unwrap();

        let mock = MockLLMProvider::new("reflector");
        mock.set_response(r#"{"claims": ["new insight"], "helpful_memories": ["m"]}"#);
        let service = reflecting_service(
            Arc::new(FailingBatchRepository {
                inner: inner.clone(),
            }),
            mock,
        );

        let err = service
            .record_execution("bigquery", &TaskExecution::new("q"), &used, fixed_now())
            .await
            .unwrap_err();
        assert!(err.is_critical());

        let ids: Vec<String> = inner
            .list_by_agent("bigquery")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m"]);
    }

    #[tokio::test]
    async fn test_record_execution_reflection_failure_is_non_critical() {
        let repo = InMemoryRepository::new(DIM);
        let mock = MockLLMProvider::new("reflector");
        mock.set_error("rate limited");
        let service = MemoryService::builder(
            config(),
            Arc::new(repo.clone()),
            Arc::new(FixedGrader(MemoryFeedback::new(2, 2, 1))),
        )
        .with_reflection_generator(Arc::new(LLMReflectionGenerator::new(Arc::new(mock))))
        .build()
        .unwrap();

        let outcome = service
            .record_execution("bigquery", &TaskExecution::new("q"), &[], fixed_now())
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_collect_feedback_updates_recency() {
        let repo = InMemoryRepository::new(DIM);
        let used = vec![memory("m", vec![1.0, 0.0], 0.0)];
        repo.save_batch(&used).await.unwrap();

        let report = service(&repo)
            .collect_feedback("bigquery", &used, &TaskExecution::new("q"), fixed_now())
            .await
            .unwrap();
        assert_eq!(report.graded(), 1);

        let stored = repo.get("bigquery", "m").await.unwrap().unwrap();
        assert!((stored.score - 3.0).abs() < 1e-12);
        assert_eq!(stored.last_used_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn test_prune_and_plan() {
        let now = fixed_now();
        let repo = InMemoryRepository::new(DIM);
        repo.save_batch(&[
            memory("A", vec![1.0, 0.0], -9.0).with_last_used_at(now - Duration::days(1)),
            memory("B", vec![1.0, 0.0], -6.0).with_last_used_at(now - Duration::days(100)),
            memory("C", vec![1.0, 0.0], -6.0).with_last_used_at(now - Duration::days(50)),
            memory("D", vec![1.0, 0.0], 0.0),
        ])
        .await
        .unwrap();
        let service = service(&repo);

        let plan = service.plan_prune("bigquery", now).await.unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(repo.len(), 4);

        let report = service.prune("bigquery", now).await.unwrap();
        assert_eq!(report.examined, 4);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.ids, vec!["A", "B"]);

        let remaining: Vec<String> = repo
            .list_by_agent("bigquery")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(remaining, vec!["C", "D"]);

        let stats = service.stats("bigquery").await.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.below_gate, 1);
    }

    #[tokio::test]
    async fn test_custom_scoring_strategy_reaches_feedback() {
        let repo = InMemoryRepository::new(DIM);
        let used = vec![memory("m", vec![1.0, 0.0], 2.0)];
        repo.save_batch(&used).await.unwrap();

        let service = MemoryService::builder(
            config(),
            Arc::new(repo.clone()),
            Arc::new(FixedGrader(MemoryFeedback::new(3, 4, 3))),
        )
        .with_scoring_strategy(Arc::new(FnScoring::new("replace", |_, obs| obs)))
        .build()
        .unwrap();
        assert_eq!(service.scoring().strategy_name(), "replace");

        service
            .collect_feedback("bigquery", &used, &TaskExecution::new("q"), fixed_now())
            .await
            .unwrap();
        assert_eq!(repo.get("bigquery", "m").await.unwrap().unwrap().score, 10.0);
    }

    #[test]
    fn test_embedder_dimension_must_match() {
        let result = MemoryService::builder(
            MemoryConfig::default(),
            Arc::new(InMemoryRepository::new(256)),
            Arc::new(FixedGrader(MemoryFeedback::new(2, 2, 1))),
        )
        .with_embedder(Arc::new(KeywordEmbedder))
        .build();
        assert!(matches!(result, Err(AgentError::InvalidConfig { .. })));
    }
}
