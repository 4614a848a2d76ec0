//! SQLite repository backend

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use triage_core::{AgentError, AgentMemory, MemoryRepository, Result, ScoreUpdate};
use triage_memory::rank_by_similarity;

type MemoryRow = (
    String,
    String,
    String,
    String,
    String,
    f64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const SELECT_COLUMNS: &str = "id, agent_id, query, query_embedding, claim, score, created_at, \
     last_used_at, successes, problems, improvements";

fn persistence(e: impl std::fmt::Display) -> AgentError {
    AgentError::Persistence(e.to_string())
}

/// Embeddings are stored as JSON arrays; nearest search ranks them in process.
pub struct SqliteMemoryRepository {
    pool: sqlx::SqlitePool,
    dimension: usize,
}

impl SqliteMemoryRepository {
    pub async fn new(path: &str, dimension: usize) -> Result<Self> {
        let pool = Self::connect(path, None).await?;
        let repository = Self { pool, dimension };
        repository.run_migrations().await?;
        Ok(repository)
    }

    /// Private database; a single connection so every query sees the same data.
    pub async fn in_memory(dimension: usize) -> Result<Self> {
        let pool = Self::connect(":memory:", Some(1)).await?;
        let repository = Self { pool, dimension };
        repository.run_migrations().await?;
        Ok(repository)
    }

    async fn connect(path: &str, max_connections: Option<u32>) -> Result<sqlx::SqlitePool> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(path)
            .map_err(persistence)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let mut pool = sqlx::sqlite::SqlitePoolOptions::new();
        if let Some(max) = max_connections {
            pool = pool.max_connections(max);
        }
        pool.connect_with(options).await.map_err(persistence)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_memories (
                id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                query TEXT NOT NULL,
                query_embedding TEXT NOT NULL,
                claim TEXT NOT NULL,
                score REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used_at TEXT,
                successes TEXT,
                problems TEXT,
                improvements TEXT,
                PRIMARY KEY (agent_id, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_agent_memories_score ON agent_memories(agent_id, score)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(())
    }

    fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AgentError::Persistence(format!("invalid {} '{}': {}", field, value, e)))
    }

    fn from_row(row: MemoryRow) -> Result<AgentMemory> {
        let (
            id,
            agent_id,
            query,
            embedding_json,
            claim,
            score,
            created_at,
            last_used_at,
            successes,
            problems,
            improvements,
        ) = row;

        let query_embedding: Vec<f32> = serde_json::from_str(&embedding_json).map_err(|e| {
            AgentError::Persistence(format!("invalid embedding for memory {}: {}", id, e))
        })?;
        let created_at = Self::parse_time("created_at", &created_at)?;
        let last_used_at = last_used_at
            .map(|t| Self::parse_time("last_used_at", &t))
            .transpose()?;

        Ok(AgentMemory {
            id,
            agent_id,
            query,
            query_embedding,
            claim,
            score,
            created_at,
            last_used_at,
            successes,
            problems,
            improvements,
        })
    }

    async fn fetch_agent(&self, agent_id: &str) -> Result<Vec<AgentMemory>> {
        let sql = format!(
            "SELECT {} FROM agent_memories WHERE agent_id = ? ORDER BY id",
            SELECT_COLUMNS
        );
        let rows: Vec<MemoryRow> = sqlx::query_as(&sql)
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(persistence)?;
        rows.into_iter().map(Self::from_row).collect()
    }

    async fn insert<'e, E>(executor: E, memory: &AgentMemory) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let embedding = serde_json::to_string(&memory.query_embedding).map_err(persistence)?;
        sqlx::query(
            r#"
            INSERT INTO agent_memories (id, agent_id, query, query_embedding, claim, score,
                created_at, last_used_at, successes, problems, improvements)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(agent_id, id) DO UPDATE SET
                query = excluded.query,
                query_embedding = excluded.query_embedding,
                claim = excluded.claim,
                score = excluded.score,
                last_used_at = excluded.last_used_at,
                successes = excluded.successes,
                problems = excluded.problems,
                improvements = excluded.improvements
            "#,
        )
        .bind(&memory.id)
        .bind(&memory.agent_id)
        .bind(&memory.query)
        .bind(embedding)
        .bind(&memory.claim)
        .bind(memory.score)
        .bind(memory.created_at.to_rfc3339())
        .bind(memory.last_used_at.map(|t| t.to_rfc3339()))
        .bind(&memory.successes)
        .bind(&memory.problems)
        .bind(&memory.improvements)
        .execute(executor)
        .await
        .map_err(persistence)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryRepository for SqliteMemoryRepository {
    async fn save(&self, memory: &AgentMemory) -> Result<()> {
        Self::insert(&self.pool, memory).await
    }

    async fn save_batch(&self, memories: &[AgentMemory]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;
        for memory in memories {
            Self::insert(&mut *tx, memory).await?;
        }
        tx.commit().await.map_err(persistence)
    }

    async fn get(&self, agent_id: &str, id: &str) -> Result<Option<AgentMemory>> {
        let sql = format!(
            "SELECT {} FROM agent_memories WHERE agent_id = ? AND id = ?",
            SELECT_COLUMNS
        );
        let row: Option<MemoryRow> = sqlx::query_as(&sql)
            .bind(agent_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?;
        row.map(Self::from_row).transpose()
    }

    async fn find_nearest_by_agent(
        &self,
        agent_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<AgentMemory>> {
        if embedding.len() != self.dimension {
            return Ok(Vec::new());
        }
        let memories = self.fetch_agent(agent_id).await?;
        Ok(rank_by_similarity(&memories, embedding, limit, self.dimension))
    }

    /// Applied in one transaction: either every update lands or none does.
    async fn update_score_batch(
        &self,
        agent_id: &str,
        updates: &HashMap<String, ScoreUpdate>,
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(persistence)?;
        for (id, update) in updates {
            sqlx::query(
                r#"
                UPDATE agent_memories
                SET score = ?, last_used_at = COALESCE(?, last_used_at)
                WHERE agent_id = ? AND id = ?
                "#,
            )
            .bind(update.score)
            .bind(update.last_used_at.map(|t| t.to_rfc3339()))
            .bind(agent_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        }
        tx.commit().await.map_err(persistence)?;
        debug!(agent_id = %agent_id, count = updates.len(), "Score batch committed");
        Ok(())
    }

    async fn delete_batch(&self, agent_id: &str, ids: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;
        let mut deleted = 0u64;
        for id in ids {
            let result = sqlx::query("DELETE FROM agent_memories WHERE agent_id = ? AND id = ?")
                .bind(agent_id)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(persistence)?;
            deleted += result.rows_affected();
        }
        tx.commit().await.map_err(persistence)?;
        Ok(deleted as usize)
    }

    async fn list_by_agent(&self, agent_id: &str) -> Result<Vec<AgentMemory>> {
        self.fetch_agent(agent_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn memory(agent: &str, id: &str, embedding: Vec<f32>) -> AgentMemory {
        AgentMemory::new(agent, "phishing reports", "check #sec-alerts")
            .with_id(id)
            .with_embedding(embedding)
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip_fields() {
        let repo = SqliteMemoryRepository::in_memory(2).await.unwrap();
        let used = Utc::now() - Duration::days(2);
        let original = memory("slack", "m1", vec![0.25, 0.5])
            .with_score(-1.5)
            .with_last_used_at(used)
            .with_kpt(Some("keep".into()), None, Some("try".into()));
        repo.save(&original).await.unwrap();

        let loaded = repo.get("slack", "m1").await.unwrap().unwrap();
        assert_eq!(loaded.query_embedding, vec![0.25, 0.5]);
        assert_eq!(loaded.score, -1.5);
        assert_eq!(loaded.last_used_at.map(|t| t.timestamp()), Some(used.timestamp()));
        assert_eq!(loaded.successes.as_deref(), Some("keep"));
        assert!(loaded.problems.is_none());

        assert!(repo.get("bigquery", "m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_nearest_scoped_and_ranked() {
        let repo = SqliteMemoryRepository::in_memory(2).await.unwrap();
        repo.save_batch(&[
            memory("slack", "far", vec![0.0, 1.0]),
            memory("slack", "near", vec![1.0, 0.0]),
            memory("bigquery", "other", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        let found = repo.find_nearest_by_agent("slack", &[1.0, 0.1], 5).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
        assert!(repo.find_nearest_by_agent("slack", &[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_score_batch_keeps_last_used_when_absent() {
        let repo = SqliteMemoryRepository::in_memory(2).await.unwrap();
        let used = Utc::now() - Duration::days(10);
        repo.save_batch(&[
            memory("slack", "a", vec![1.0, 0.0]).with_last_used_at(used),
            memory("slack", "b", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        let now = Utc::now();
        let updates = HashMap::from([
            ("a".to_string(), ScoreUpdate::score_only(2.0)),
            ("b".to_string(), ScoreUpdate::used_at(-4.0, now)),
        ]);
        repo.update_score_batch("slack", &updates).await.unwrap();

        let a = repo.get("slack", "a").await.unwrap().unwrap();
        assert_eq!(a.score, 2.0);
        assert_eq!(a.last_used_at.map(|t| t.timestamp()), Some(used.timestamp()));
        let b = repo.get("slack", "b").await.unwrap().unwrap();
        assert_eq!(b.score, -4.0);
        assert_eq!(b.last_used_at.map(|t| t.timestamp()), Some(now.timestamp()));
    }

    #[tokio::test]
    async fn test_delete_batch_is_agent_scoped() {
        let repo = SqliteMemoryRepository::in_memory(2).await.unwrap();
        repo.save_batch(&[
            memory("slack", "a", vec![1.0, 0.0]),
            memory("bigquery", "b", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

        let deleted = repo
            .delete_batch("slack", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.list_by_agent("bigquery").await.unwrap().len(), 1);
        assert!(repo.list_by_agent("slack").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_database() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("memories.db");
        let path = path.to_string_lossy().to_string();
        {
            let repo = SqliteMemoryRepository::new(&path, 2).await.unwrap();
            repo.save(&memory("slack", "m", vec![1.0, 0.0])).await.unwrap();
        }
        let repo = SqliteMemoryRepository::new(&path, 2).await.unwrap();
        assert_eq!(repo.list_by_agent("slack").await.unwrap().len(), 1);
    }
}
