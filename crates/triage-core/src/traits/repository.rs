//! Persistence contract for agent memories

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::{AgentMemory, ScoreUpdate};

/// Agent-scoped memory store.
///
/// Every query takes the owning `agent_id`; implementations must never return or
/// modify another agent's memories.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn save(&self, memory: &AgentMemory) -> Result<()>;

    async fn save_batch(&self, memories: &[AgentMemory]) -> Result<()> {
        for memory in memories {
            self.save(memory).await?;
        }
        Ok(())
    }

    async fn get(&self, agent_id: &str, id: &str) -> Result<Option<AgentMemory>>;

    /// Up to `limit` memories nearest to `embedding`. An empty or wrongly sized
    /// embedding yields an empty result.
    async fn find_nearest_by_agent(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<AgentMemory>>;

    /// Any error means nothing was persisted as far as callers are concerned.
    async fn update_score_batch(
        &self,
        agent_id: &str,
        updates: &HashMap<String, ScoreUpdate>,
    ) -> Result<()>;

    /// Returns how many memories were actually removed.
    async fn delete_batch(&self, agent_id: &str, ids: &[String]) -> Result<usize>;

    async fn list_by_agent(&self, agent_id: &str) -> Result<Vec<AgentMemory>>;
}
