//! LLM-backed judgement traits

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::{AgentMemory, MemoryFeedback, Reflection, TaskExecution};

/// Grades how one memory contributed to one finished task.
///
/// May fail per call. Callers treat a failure as "no information" for that memory.
#[async_trait]
pub trait FeedbackGrader: Send + Sync {
    async fn grade(&self, memory: &AgentMemory, execution: &TaskExecution)
    -> Result<MemoryFeedback>;
}

/// Produces new claims and helpful/harmful verdicts for a finished task.
#[async_trait]
pub trait ReflectionGenerator: Send + Sync {
    async fn reflect(
        &self,
        execution: &TaskExecution,
        used_memories: &[AgentMemory],
    ) -> Result<Reflection>;
}
