//! Repository backends for agent memories

mod file;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use file::FileMemoryRepository;
pub use triage_core::{AgentError, MemoryRepository, Result};
pub use triage_memory::InMemoryRepository;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMemoryRepository;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    #[default]
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File { path: String },
    #[serde(rename = "sqlite")]
    Sqlite { path: String },
}

pub async fn create_repository(
    config: &StorageConfig,
    dimension: usize,
) -> Result<Arc<dyn MemoryRepository>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryRepository::new(dimension))),
        StorageConfig::File { path } => Ok(Arc::new(FileMemoryRepository::new(path, dimension))),

        #[cfg(feature = "sqlite")]
        StorageConfig::Sqlite { path } => {
            let repository = SqliteMemoryRepository::new(path, dimension).await?;
            Ok(Arc::new(repository))
        }

        #[cfg(not(feature = "sqlite"))]
        StorageConfig::Sqlite { .. } => Err(AgentError::Config(
            "SQLite storage requires 'sqlite' feature".into(),
        )),
    }
}
