//! Error types shared across the triage crates

use thiserror::Error;

use crate::traits::llm::LLMError;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Grading failed for memory {memory_id}: {reason}")]
    Grading { memory_id: String, reason: String },

    #[error("Reflection failed: {0}")]
    Reflection(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn grading(memory_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Grading {
            memory_id: memory_id.into(),
            reason: reason.into(),
        }
    }

    /// Persistence failures must reach the caller. Everything produced by the
    /// LLM side only reduces the information available for an update.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::Repository(_) | Self::Persistence(_) | Self::Io(_)
        )
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AgentError {
    fn from(err: serde_yaml::Error) -> Self {
        AgentError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Io(err.to_string())
    }
}

impl From<LLMError> for AgentError {
    fn from(err: LLMError) -> Self {
        AgentError::LLM(err.to_string())
    }
}
