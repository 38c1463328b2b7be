use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AvatarError, Result};

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

const PROJECT_CONFIG: &str = ".avatar/avatar-rag.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub manifest_path: Option<PathBuf>,
    pub server: ServerConfig,
    pub rag: RagConfig,
    pub models: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Chunking and retrieval knobs. `chunk_size` and `chunk_overlap` are in characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Gemini,
    Local,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "local" | "fastembed" => Ok(Self::Local),
            _ => Err(format!("Unknown embedding provider: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub embedding_provider: EmbeddingProvider,
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Gemini,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            generation_model: "gemini-2.0-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let global_path = Self::global_path();
        let project_path = Path::new(PROJECT_CONFIG);
        let global = Self::read_table_if_exists(&global_path)?;
        let project = Self::read_table_if_exists(project_path)?;

        // Type errors can come from either file; name the one that overrides.
        let origin = if project_path.exists() {
            project_path
        } else {
            global_path.as_path()
        };
        let merged = Self::from_table(Self::merge(global, project), origin)?;
        Ok(merged.with_env_overrides())
    }

    /// Loads a single explicit config file, skipping the global/project lookup.
    pub fn load_from(path: &Path) -> Result<Self> {
        let table = Self::read_table(path)?;
        Ok(Self::from_table(table, path)?.with_env_overrides())
    }

    fn global_path() -> PathBuf {
        let config_dir = directories::ProjectDirs::from("", "", "avatar-rag").map_or_else(
            || PathBuf::from("~/.config/avatar-rag"),
            |d| d.config_dir().to_path_buf(),
        );

        config_dir.join("config.toml")
    }

    fn read_table_if_exists(path: &Path) -> Result<toml::Table> {
        if path.exists() {
            Self::read_table(path)
        } else {
            Ok(toml::Table::new())
        }
    }

    fn read_table(path: &Path) -> Result<toml::Table> {
        let content = std::fs::read_to_string(path)?;
        content
            .parse::<toml::Table>()
            .map_err(|e| AvatarError::Config(format!("{}: {e}", path.display())))
    }

    fn from_table(table: toml::Table, origin: &Path) -> Result<Self> {
        toml::Value::Table(table)
            .try_into()
            .map_err(|e| AvatarError::Config(format!("{}: {e}", origin.display())))
    }

    /// Key-by-key merge: every key the project file sets wins, nested
    /// sections are merged rather than replaced, and anything else keeps
    /// the global value.
    fn merge(mut global: toml::Table, project: toml::Table) -> toml::Table {
        for (key, value) in project {
            let merged = match (global.remove(&key), value) {
                (Some(toml::Value::Table(base)), toml::Value::Table(overlay)) => {
                    toml::Value::Table(Self::merge(base, overlay))
                }
                (_, value) => value,
            };
            global.insert(key, merged);
        }
        global
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.api_key = Some(key);
        }
        if let Ok(bind) = std::env::var("AVATAR_BIND") {
            self.server.bind = bind;
        }
        if let Ok(path) = std::env::var("AVATAR_MANIFEST") {
            self.manifest_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("agents.json"))
    }

    /// The Gemini key is the one credential the service cannot start without.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AvatarError::MissingCredential(API_KEY_ENV.to_string()))
    }
}
