use serde::{Deserialize, Serialize};

use triage_core::AgentMemory;

/// Score distribution of one agent's memories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Memories the selection quality gate would drop.
    pub below_gate: usize,
    pub never_used: usize,
}

impl ScoreStats {
    pub fn from_memories(memories: &[AgentMemory], filter_min_quality: f64) -> Self {
        if memories.is_empty() {
            return Self::default();
        }

        let mut stats = Self {
            count: memories.len(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            ..Default::default()
        };
        let mut sum = 0.0;
        for memory in memories {
            sum += memory.score;
            stats.min = stats.min.min(memory.score);
            stats.max = stats.max.max(memory.score);
            if !(memory.score >= filter_min_quality) {
                stats.below_gate += 1;
            }
            if memory.last_used_at.is_none() {
                stats.never_used += 1;
            }
        }
        stats.mean = sum / memories.len() as f64;
        stats
    }
}
