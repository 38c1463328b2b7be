use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::GenerationRequest;
use crate::error::Result;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Pushes raw text fragments into `tx` in generation order and returns
    /// once the upstream stream ends. Implementations stop early when the
    /// receiver is dropped.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<()>;

    fn model_name(&self) -> &str;
}
