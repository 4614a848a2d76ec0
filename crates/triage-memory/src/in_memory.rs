use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use triage_core::{AgentMemory, MemoryRepository, Result, ScoreUpdate};

use crate::math::cosine_similarity;

type AgentMemories = BTreeMap<String, AgentMemory>;

/// Process-local repository. Clones share the same store.
pub struct InMemoryRepository {
    agents: Arc<RwLock<HashMap<String, AgentMemories>>>,
    dimension: usize,
}

impl InMemoryRepository {
    pub fn new(dimension: usize) -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.agents.read().values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for InMemoryRepository {
    fn clone(&self) -> Self {
        Self {
            agents: Arc::clone(&self.agents),
            dimension: self.dimension,
        }
    }
}

/// Brute-force nearest neighbours by cosine similarity, best first, ties by ID.
///
/// Memories without an embedding of `dimension` are not comparable and are skipped.
/// A query embedding of the wrong size yields nothing.
pub fn rank_by_similarity<'a, I>(
    memories: I,
    embedding: &[f32],
    limit: usize,
    dimension: usize,
) -> Vec<AgentMemory>
where
    I: IntoIterator<Item = &'a AgentMemory>,
{
    if embedding.len() != dimension || limit == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(f64, &AgentMemory)> = memories
        .into_iter()
        .filter(|m| m.query_embedding.len() == dimension)
        .map(|m| (cosine_similarity(embedding, &m.query_embedding), m))
        .collect();

    ranked.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.id.cmp(&b.id)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, m)| m.clone())
        .collect()
}

#[async_trait]
impl MemoryRepository for InMemoryRepository {
    async fn save(&self, memory: &AgentMemory) -> Result<()> {
        self.agents
            .write()
            .entry(memory.agent_id.clone())
            .or_default()
            .insert(memory.id.clone(), memory.clone());
        Ok(())
    }

    async fn save_batch(&self, memories: &[AgentMemory]) -> Result<()> {
        let mut agents = self.agents.write();
        for memory in memories {
            agents
                .entry(memory.agent_id.clone())
                .or_default()
                .insert(memory.id.clone(), memory.clone());
        }
        Ok(())
    }

    async fn get(&self, agent_id: &str, id: &str) -> Result<Option<AgentMemory>> {
        Ok(self
            .agents
            .read()
            .get(agent_id)
            .and_then(|memories| memories.get(id))
            .cloned())
    }

    async fn find_nearest_by_agent(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<AgentMemory>> {
        let agents = self.agents.read();
        let Some(memories) = agents.get(agent_id) else {
            return Ok(Vec::new());
        };
        Ok(rank_by_similarity(
            memories.values(),
            embedding,
            limit,
            self.dimension,
        ))
    }

    async fn update_score_batch(
        &self,
        agent_id: &str,
        updates: &HashMap<String, ScoreUpdate>,
    ) -> Result<()> {
        let mut agents = self.agents.write();
        let Some(memories) = agents.get_mut(agent_id) else {
            return Ok(());
        };
        for (id, update) in updates {
            if let Some(memory) = memories.get_mut(id) {
                memory.score = update.score;
                if let Some(used_at) = update.last_used_at {
                    memory.last_used_at = Some(used_at);
                }
            }
        }
        Ok(())
    }

    async fn delete_batch(&self, agent_id: &str, ids: &[String]) -> Result<usize> {
        let mut agents = self.agents.write();
        let Some(memories) = agents.get_mut(agent_id) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| memories.remove(*id).is_some()).count())
    }

    async fn list_by_agent(&self, agent_id: &str) -> Result<Vec<AgentMemory>> {
        Ok(self
            .agents
            .read()
            .get(agent_id)
            .map(|memories| memories.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn memory(agent: &str, id: &str, embedding: Vec<f32>) -> AgentMemory {
        AgentMemory::new(agent, "q", "c")
            .with_id(id)
            .with_embedding(embedding)
    }

    #[tokio::test]
    async fn test_save_and_get_scoped_by_agent() {
        let repo = InMemoryRepository::new(2);
        repo.save(&memory("bigquery", "m1", vec![1.0, 0.0])).await.unwrap();

        assert!(repo.get("bigquery", "m1").await.unwrap().is_some());
        assert!(repo.get("slack", "m1").await.unwrap().is_none());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_find_nearest_orders_by_similarity() {
        let repo = InMemoryRepository::new(2);
        repo.save_batch(&[
            memory("a", "far", vec![0.0, 1.0]),
            memory("a", "near", vec![1.0, 0.1]),
            memory("a", "mid", vec![1.0, 1.0]),
            memory("b", "other-agent", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        let found = repo.find_nearest_by_agent("a", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn test_find_nearest_invalid_embedding_is_empty() {
        let repo = InMemoryRepository::new(2);
        repo.save(&memory("a", "m", vec![1.0, 0.0])).await.unwrap();
        repo.save(&memory("a", "legacy", vec![])).await.unwrap();

        assert!(repo.find_nearest_by_agent("a", &[], 5).await.unwrap().is_empty());
        assert!(repo.find_nearest_by_agent("a", &[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
        assert!(repo.find_nearest_by_agent("missing", &[1.0, 0.0], 5).await.unwrap().is_empty());

        let found = repo.find_nearest_by_agent("a", &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_update_score_batch_only_touches_agent() {
        let repo = InMemoryRepository::new(2);
        repo.save(&memory("a", "m1", vec![1.0, 0.0])).await.unwrap();
        repo.save(&memory("b", "m2", vec![1.0, 0.0])).await.unwrap();

        let now = Utc::now();
        let mut updates = HashMap::new();
        updates.insert("m1".to_string(), ScoreUpdate::used_at(3.0, now));
        updates.insert("m2".to_string(), ScoreUpdate::used_at(-9.0, now));
        repo.update_score_batch("a", &updates).await.unwrap();

        let m1 = repo.get("a", "m1").await.unwrap().unwrap();
        assert_eq!(m1.score, 3.0);
        assert_eq!(m1.last_used_at, Some(now));

        let m2 = repo.get("b", "m2").await.unwrap().unwrap();
        assert_eq!(m2.score, 0.0);
        assert!(m2.last_used_at.is_none());
    }

    #[tokio::test]
    async fn test_score_only_update_keeps_last_used() {
        let repo = InMemoryRepository::new(2);
        let used = Utc::now();
        repo.save(&memory("a", "m", vec![1.0, 0.0]).with_last_used_at(used))
            .await
            .unwrap();

        let updates = HashMap::from([("m".to_string(), ScoreUpdate::score_only(1.5))]);
        repo.update_score_batch("a", &updates).await.unwrap();

        let m = repo.get("a", "m").await.unwrap().unwrap();
        assert_eq!(m.score, 1.5);
        assert_eq!(m.last_used_at, Some(used));
    }

    #[tokio::test]
    async fn test_delete_batch_counts_removed() {
        let repo = InMemoryRepository::new(2);
        repo.save(&memory("a", "m1", vec![1.0, 0.0])).await.unwrap();
        repo.save(&memory("a", "m2", vec![1.0, 0.0])).await.unwrap();
        repo.save(&memory("b", "m3", vec![1.0, 0.0])).await.unwrap();

        let ids = vec!["m1".to_string(), "m3".to_string(), "ghost".to_string()];
        assert_eq!(repo.delete_batch("a", &ids).await.unwrap(), 1);
        assert_eq!(repo.list_by_agent("a").await.unwrap().len(), 1);
        assert_eq!(repo.list_by_agent("b").await.unwrap().len(), 1);
        assert_eq!(repo.delete_batch("nobody", &ids).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clone_shares_store() {
        let repo = InMemoryRepository::new(2);
        let clone = repo.clone();
        clone.save(&memory("a", "m", vec![1.0, 0.0])).await.unwrap();
        assert!(!repo.is_empty());
    }
}
