//! The in-memory embedding cache, built once at startup.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RagConfig;
use crate::domain::{AgentManifest, AgentProfile, Chunk};
use crate::error::{AvatarError, Result};
use crate::ports::EmbeddingGenerator;
use crate::services::chunker;

/// Chunks of the active profile's document with their embeddings.
///
/// `chunks[i]` and `embeddings[i]` always describe the same chunk. There is
/// no way to mutate a built knowledge base; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    profile: Option<AgentProfile>,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    content_hash: Option<String>,
    built_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub ready: bool,
    pub chunks: usize,
    pub profile_id: Option<String>,
    pub content_hash: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a cache from already-aligned parts, mainly for fixtures.
    pub fn from_parts(
        profile: Option<AgentProfile>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(AvatarError::Misaligned {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        Ok(Self {
            profile,
            chunks,
            embeddings,
            content_hash: None,
            built_at: Some(Utc::now()),
        })
    }

    /// Loads the manifest, chunks the active profile's document and embeds
    /// every chunk in order. Never fails: any configuration problem leaves
    /// the cache not ready and is logged.
    pub async fn build(
        manifest_path: &Path,
        rag: &RagConfig,
        embedder: &dyn EmbeddingGenerator,
    ) -> Self {
        let manifest = match AgentManifest::load(manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!(path = %manifest_path.display(), error = %e, "could not load agent manifest");
                return Self::empty();
            }
        };

        let Some(profile) = manifest.into_active_profile() else {
            tracing::error!(path = %manifest_path.display(), "agent manifest lists no agents");
            return Self::empty();
        };

        Self::build_for_profile(profile, rag, embedder).await
    }

    pub async fn build_for_profile(
        profile: AgentProfile,
        rag: &RagConfig,
        embedder: &dyn EmbeddingGenerator,
    ) -> Self {
        let mut kb = Self {
            profile: Some(profile),
            ..Self::default()
        };

        let Some(path) = kb
            .profile
            .as_ref()
            .and_then(|p| p.knowledge_base_path.clone())
        else {
            tracing::error!(
                profile_id = kb.profile_id().unwrap_or_default(),
                "active agent has no knowledge_base_path"
            );
            return kb;
        };

        tracing::info!(
            profile_id = kb.profile_id().unwrap_or_default(),
            path = %path.display(),
            "building knowledge base"
        );

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "knowledge base file unreadable");
                return kb;
            }
        };

        let texts = chunker::chunk_text(&text, rag.chunk_size, rag.chunk_overlap);
        if texts.is_empty() {
            tracing::error!(path = %path.display(), "knowledge base produced no chunks");
            return kb;
        }

        let mut chunks = Vec::with_capacity(texts.len());
        let mut embeddings = Vec::with_capacity(texts.len());

        for (index, text) in texts.into_iter().enumerate() {
            match embedder.embed(&text).await {
                Ok(vector) if !vector.is_empty() => {
                    chunks.push(Chunk::new(index, text));
                    embeddings.push(vector);
                }
                Ok(_) => {
                    tracing::warn!(chunk = index, "empty embedding, dropping chunk");
                }
                Err(e) => {
                    tracing::warn!(chunk = index, error = %e, "embedding failed, dropping chunk");
                }
            }
        }

        if embeddings.is_empty() {
            tracing::error!("no chunk produced a valid embedding");
            return kb;
        }

        tracing::info!(
            chunks = chunks.len(),
            model = embedder.model_name(),
            "knowledge base ready"
        );

        kb.content_hash = Some(blake3::hash(text.as_bytes()).to_hex().to_string());
        kb.chunks = chunks;
        kb.embeddings = embeddings;
        kb.built_at = Some(Utc::now());
        kb
    }

    pub fn is_ready(&self) -> bool {
        !self.chunks.is_empty() && !self.embeddings.is_empty()
    }

    pub const fn profile(&self) -> Option<&AgentProfile> {
        self.profile.as_ref()
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.id.as_str())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> KnowledgeStats {
        KnowledgeStats {
            ready: self.is_ready(),
            chunks: self.len(),
            profile_id: self.profile_id().map(str::to_string),
            content_hash: self.content_hash.clone(),
            built_at: self.built_at,
        }
    }
}
