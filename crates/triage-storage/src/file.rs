use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use triage_core::{AgentError, AgentMemory, MemoryRepository, Result, ScoreUpdate};
use triage_memory::rank_by_similarity;

/// One pretty-printed JSON array per agent under `base_path`.
///
/// Writes go through a temporary file and a rename, so a failed write leaves the
/// previous file intact.
pub struct FileMemoryRepository {
    base_path: PathBuf,
    dimension: usize,
    write_lock: Mutex<()>,
}

impl FileMemoryRepository {
    pub fn new(base_path: impl AsRef<Path>, dimension: usize) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            dimension,
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn agent_path(&self, agent_id: &str) -> Result<PathBuf> {
        let valid = !agent_id.is_empty()
            && !agent_id.starts_with('.')
            && agent_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(AgentError::Repository(format!(
                "invalid agent id for file storage: {:?}",
                agent_id
            )));
        }
        Ok(self.base_path.join(format!("{}.json", agent_id)))
    }

    async fn load(&self, agent_id: &str) -> Result<Vec<AgentMemory>> {
        let path = self.agent_path(agent_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = tokio::fs::read_to_string(&path).await?;
        serde_json::from_str(&json).map_err(|e| {
            AgentError::Persistence(format!("corrupt memory file {}: {}", path.display(), e))
        })
    }

    async fn store(&self, agent_id: &str, memories: &mut Vec<AgentMemory>) -> Result<()> {
        let path = self.agent_path(agent_id)?;
        memories.sort_by(|a, b| a.id.cmp(&b.id));

        tokio::fs::create_dir_all(&self.base_path).await?;
        let json = serde_json::to_string_pretty(&*memories)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(agent_id = %agent_id, count = memories.len(), "Memory file written");
        Ok(())
    }

    async fn upsert(&self, agent_id: &str, incoming: &[&AgentMemory]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut memories = self.load(agent_id).await?;
        for memory in incoming {
            match memories.iter_mut().find(|m| m.id == memory.id) {
                Some(existing) => *existing = (*memory).clone(),
                None => memories.push((*memory).clone()),
            }
        }
        self.store(agent_id, &mut memories).await
    }
}

#[async_trait]
impl MemoryRepository for FileMemoryRepository {
    async fn save(&self, memory: &AgentMemory) -> Result<()> {
        self.upsert(&memory.agent_id, &[memory]).await
    }

    async fn save_batch(&self, memories: &[AgentMemory]) -> Result<()> {
        let mut by_agent: HashMap<&str, Vec<&AgentMemory>> = HashMap::new();
        for memory in memories {
            by_agent.entry(&memory.agent_id).or_default().push(memory);
        }
        for (agent_id, batch) in by_agent {
            self.upsert(agent_id, &batch).await?;
        }
        Ok(())
    }

    async fn get(&self, agent_id: &str, id: &str) -> Result<Option<AgentMemory>> {
        Ok(self.load(agent_id).await?.into_iter().find(|m| m.id == id))
    }

    async fn find_nearest_by_agent(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<AgentMemory>> {
        let memories = self.load(agent_id).await?;
        Ok(rank_by_similarity(&memories, embedding, limit, self.dimension))
    }

    async fn update_score_batch(
        &self,
        agent_id: &str,
        updates: &HashMap<String, ScoreUpdate>,
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut memories = self.load(agent_id).await?;
        let mut touched = 0;
        for memory in memories.iter_mut() {
            if let Some(update) = updates.get(&memory.id) {
                memory.score = update.score;
                if let Some(used_at) = update.last_used_at {
                    memory.last_used_at = Some(used_at);
                }
                touched += 1;
            }
        }
        if touched == 0 {
            return Ok(());
        }
        self.store(agent_id, &mut memories).await
    }

    async fn delete_batch(&self, agent_id: &str, ids: &[String]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut memories = self.load(agent_id).await?;
        let before = memories.len();
        memories.retain(|m| !ids.contains(&m.id));
        let deleted = before - memories.len();
        if deleted > 0 {
            self.store(agent_id, &mut memories).await?;
        }
        Ok(deleted)
    }

    async fn list_by_agent(&self, agent_id: &str) -> Result<Vec<AgentMemory>> {
        self.load(agent_id).await
    }
}
