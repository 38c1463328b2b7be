//! Offline embeddings through fastembed's ONNX models.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{AvatarError, Result};
use crate::ports::EmbeddingGenerator;

pub const DEFAULT_LOCAL_MODEL: &str = "all-MiniLM-L6-v2";

pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    name: String,
}

impl LocalEmbedder {
    /// Loads (and on first use downloads) the named model. Unknown names fall
    /// back to all-MiniLM-L6-v2.
    pub fn new(model_name: &str) -> Result<Self> {
        let (model_enum, name) = match model_name {
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, model_name),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, model_name),
            "all-MiniLM-L6-v2" => (EmbeddingModel::AllMiniLML6V2, model_name),
            other => {
                tracing::warn!(model = other, "unknown local embedding model, using {DEFAULT_LOCAL_MODEL}");
                (EmbeddingModel::AllMiniLML6V2, DEFAULT_LOCAL_MODEL)
            }
        };

        let model = TextEmbedding::try_new(
            InitOptions::new(model_enum).with_show_download_progress(false),
        )
        .map_err(|e| AvatarError::Embedding(format!("failed to load {name}: {e}")))?;

        tracing::info!(model = name, "local embedding model loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingGenerator for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        let vectors = tokio::task::spawn_blocking(move || {
            let model = model
                .lock()
                .map_err(|_| AvatarError::Embedding("embedding model lock poisoned".to_string()))?;
            model
                .embed(vec![text], None)
                .map_err(|e| AvatarError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| AvatarError::Embedding(format!("embedding task failed: {e}")))??;

        Ok(vectors.into_iter().next().unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
