//! Collaborator traits consumed by the memory engines

pub mod embedding;
pub mod feedback;
pub mod llm;
pub mod repository;

pub use embedding::Embedder;
pub use feedback::{FeedbackGrader, ReflectionGenerator};
pub use llm::{LLMError, LLMProvider};
pub use repository::MemoryRepository;
