use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AvatarError, Result};

pub const DEFAULT_PERSONALITY: &str = "친절하고 전문적인 AI 비서";

/// A named persona plus the document it answers from.
///
/// Fields beyond `id`, `personality` and `knowledge_base_path` are kept in
/// `extra` so the profile round-trips to clients unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_path: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            personality: None,
            knowledge_base_path: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }

    #[must_use]
    pub fn with_knowledge_base(mut self, path: impl Into<PathBuf>) -> Self {
        self.knowledge_base_path = Some(path.into());
        self
    }

    pub fn personality(&self) -> &str {
        self.personality.as_deref().unwrap_or(DEFAULT_PERSONALITY)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentManifest {
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}

impl AgentManifest {
    /// Reads `agents.json`, or a YAML manifest when the extension is `.yaml`/`.yml`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AvatarError::Manifest(format!("cannot read {}: {e}", path.display()))
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| AvatarError::Manifest(e.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| AvatarError::Manifest(e.to_string()))
    }

    /// Only the first-listed profile is ever active.
    pub fn active_profile_id(&self) -> Option<&str> {
        self.agents.first().map(|a| a.id.as_str())
    }

    /// Resolves the active profile. Later entries sharing the active id
    /// replace earlier ones, as in an id-keyed table.
    pub fn into_active_profile(self) -> Option<AgentProfile> {
        let active_id = self.active_profile_id()?.to_string();
        self.agents.into_iter().rev().find(|a| a.id == active_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_listed_profile_is_active() {
        let manifest = AgentManifest::from_json(
            r#"{"agents": [
                {"id": "stone", "personality": "차분한", "knowledge_base_path": "kb/stone.txt"},
                {"id": "other", "personality": "활발한"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(manifest.active_profile_id(), Some("stone"));
        let profile = manifest.into_active_profile().unwrap();
        assert_eq!(profile.personality(), "차분한");
        assert_eq!(
            profile.knowledge_base_path,
            Some(PathBuf::from("kb/stone.txt"))
        );
    }

    #[test]
    fn test_duplicate_active_id_takes_last_entry() {
        let manifest = AgentManifest::from_json(
            r#"{"agents": [
                {"id": "stone", "personality": "first"},
                {"id": "other"},
                {"id": "stone", "personality": "second"}
            ]}"#,
        )
        .unwrap();

        let profile = manifest.into_active_profile().unwrap();
        assert_eq!(profile.personality.as_deref(), Some("second"));
    }

    #[test]
    fn test_missing_agents_key_is_empty() {
        let manifest = AgentManifest::from_json("{}").unwrap();
        assert!(manifest.agents.is_empty());
        assert!(manifest.into_active_profile().is_none());
    }

    #[test]
    fn test_malformed_manifest_is_manifest_error() {
        let err = AgentManifest::from_json("{not json").unwrap_err();
        assert!(matches!(err, AvatarError::Manifest(_)));
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let manifest = AgentManifest::from_json(
            r#"{"agents": [{"id": "stone", "name": "Stone", "avatar_video": "idle.mp4"}]}"#,
        )
        .unwrap();
        let profile = manifest.into_active_profile().unwrap();
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["name"], "Stone");
        assert_eq!(json["avatar_video"], "idle.mp4");
        assert!(json.get("personality").is_none());
    }

    #[test]
    fn test_yaml_manifest() {
        let manifest = AgentManifest::from_yaml(
            r"
agents:
  - id: stone
    personality: 유쾌한
    knowledge_base_path: kb.txt
",
        )
        .unwrap();
        assert_eq!(manifest.active_profile_id(), Some("stone"));
    }

    #[test]
    fn test_default_personality() {
        let profile = AgentProfile::new("stone");
        assert_eq!(profile.personality(), DEFAULT_PERSONALITY);
    }
}
