use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// An `Ok` with an empty vector is treated by callers the same as an error.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn model_name(&self) -> &str;
}
