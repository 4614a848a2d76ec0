//! Core types and traits for the SOC triage agent memory

pub mod error;
pub mod memory;
pub mod message;
pub mod traits;
pub mod types;

pub use error::{AgentError, Result};
pub use memory::{
    AgentMemory, MemoryFeedback, Reflection, ScoreUpdate, TaskExecution, IMPACT_MAX,
    RELEVANCE_MAX, SUPPORT_MAX,
};
pub use message::{ChatMessage, Role, format_transcript};
pub use traits::embedding::Embedder;
pub use traits::feedback::{FeedbackGrader, ReflectionGenerator};
pub use traits::llm::{LLMError, LLMProvider};
pub use traits::repository::MemoryRepository;
pub use types::{FinishReason, LLMConfig, LLMResponse, TokenUsage};
