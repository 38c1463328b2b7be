pub mod gemini;
#[cfg(feature = "fastembed")]
pub mod local;

use std::sync::Arc;

use crate::config::{Config, EmbeddingProvider};
use crate::error::Result;
use crate::ports::{EmbeddingGenerator, TextGenerator};

pub use gemini::GeminiClient;
#[cfg(feature = "fastembed")]
pub use local::LocalEmbedder;

/// The capability pair a running service needs.
pub struct Adapters {
    pub embedder: Arc<dyn EmbeddingGenerator>,
    pub generator: Arc<dyn TextGenerator>,
}

impl Adapters {
    /// Wires the configured providers. Generation always goes through
    /// Gemini, so a missing API key is an error for every provider.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?;
        let gemini = Arc::new(GeminiClient::new(&config.models, api_key)?);

        let embedder: Arc<dyn EmbeddingGenerator> = match config.models.embedding_provider {
            EmbeddingProvider::Gemini => gemini.clone(),
            EmbeddingProvider::Local => local_embedder(config)?,
        };

        Ok(Self {
            embedder,
            generator: gemini,
        })
    }
}

#[cfg(feature = "fastembed")]
fn local_embedder(config: &Config) -> Result<Arc<dyn EmbeddingGenerator>> {
    // The Gemini model name means nothing to fastembed.
    let name = if config.models.embedding_model == crate::config::ModelConfig::default().embedding_model {
        local::DEFAULT_LOCAL_MODEL
    } else {
        config.models.embedding_model.as_str()
    };
    Ok(Arc::new(LocalEmbedder::new(name)?))
}

#[cfg(not(feature = "fastembed"))]
fn local_embedder(_config: &Config) -> Result<Arc<dyn EmbeddingGenerator>> {
    Err(crate::error::AvatarError::Config(
        "embedding_provider = \"local\" requires building with --features fastembed".to_string(),
    ))
}
