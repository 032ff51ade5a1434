use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

const PROVIDERS_JSON: &str = include_str!("providers.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRegistry {
    pub providers: Vec<ProviderDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDef {
    pub id: String,
    pub name: String,
    pub api_format: ApiFormat,
    pub base_url: String,
    pub auth: AuthConfig,
    pub default_model: String,
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    Openai,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    /// Header carrying the raw key when `type` is `header`
    #[serde(default)]
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    Header,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub id: String,
    pub name: String,
}

impl ProviderRegistry {
    pub fn load() -> Self {
        serde_json::from_str(PROVIDERS_JSON).expect("providers.json is invalid")
    }

    /// Loads the embedded registry, then lets entries from `extra` replace or
    /// extend it by id.
    pub fn load_with_overrides(extra: Option<&Path>) -> Result<Self> {
        let mut registry = Self::load();
        let Some(path) = extra else {
            return Ok(registry);
        };
        let content = std::fs::read_to_string(path)?;
        let custom: ProviderRegistry = serde_json::from_str(&content)?;
        for def in custom.providers {
            info!("Loaded custom provider '{}' from {}", def.id, path.display());
            registry.providers.retain(|p| p.id != def.id);
            registry.providers.push(def);
        }
        Ok(registry)
    }

    pub fn get_provider(&self, id: &str) -> Option<&ProviderDef> {
        let normalized = id.to_lowercase();
        self.providers
            .iter()
            .find(|p| p.id == normalized || p.name.to_lowercase() == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_registry_has_anthropic_and_openai() {
        let registry = ProviderRegistry::load();
        let anthropic = registry.get_provider("anthropic").unwrap();
        assert_eq!(anthropic.api_format, ApiFormat::Anthropic);
        assert_eq!(anthropic.auth.auth_type, AuthType::Header);
        assert!(registry.get_provider("OpenAI").is_some());
    }

    #[test]
    fn overrides_replace_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.json");
        std::fs::write(
            &path,
            r#"{"providers":[{"id":"openai","name":"Mock OpenAI","api_format":"openai",
                "base_url":"http://127.0.0.1:9/v1/chat/completions",
                "auth":{"type":"bearer"},"default_model":"mock","models":[]}]}"#,
        )
        .unwrap();
        let registry = ProviderRegistry::load_with_overrides(Some(&path)).unwrap();
        let openai = registry.get_provider("openai").unwrap();
        assert_eq!(openai.name, "Mock OpenAI");
        assert_eq!(
            registry.providers.iter().filter(|p| p.id == "openai").count(),
            1
        );
    }
}
