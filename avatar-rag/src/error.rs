use thiserror::Error;

#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Knowledge base is not initialized")]
    NotReady,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Agent manifest error: {0}")]
    Manifest(String),

    #[error("Chunk/embedding count mismatch: {chunks} chunks, {embeddings} embeddings")]
    Misaligned { chunks: usize, embeddings: usize },

    #[error("Missing credential: set {0}")]
    MissingCredential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AvatarError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::EmptyQuestion => 1,
            Self::NotReady | Self::Misaligned { .. } => 2,
            Self::Manifest(_) | Self::Config(_) | Self::MissingCredential(_) => 3,
            Self::Embedding(_) | Self::Generation(_) => 4,
            Self::Io(_) | Self::Serialization(_) | Self::Yaml(_) | Self::Http(_) => 10,
        }
    }
}

pub type Result<T> = std::result::Result<T, AvatarError>;
