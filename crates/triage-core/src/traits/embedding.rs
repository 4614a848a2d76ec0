//! Embedding generation trait

use async_trait::async_trait;

use crate::error::Result;

/// Turns task descriptions into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}
