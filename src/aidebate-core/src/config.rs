//! Configuration module for loading TOML config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::DebateError;
use crate::gateway::GenerationParams;

/// Which backend family serves a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendFamily {
    LmStudio,
    OpenAi,
}

/// One configured model entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    /// Upstream model id sent to the backend, e.g. "zai-org/glm-4.7-flash".
    pub id: String,
    /// Friendly display name. Defaults to the alias.
    pub name: Option<String>,
    #[serde(default = "default_family")]
    pub family: BackendFamily,
}

fn default_family() -> BackendFamily {
    BackendFamily::LmStudio
}

/// Generation and gateway settings shared by all debate-content calls.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Generation deadline per model call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Cap on concurrent generation calls across all sessions. Defaults to
    /// 1 because typical local deployments serve one request at a time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_generations: usize,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_generations: default_max_concurrent(),
        }
    }
}

impl Settings {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_lm_studio_endpoint")]
    pub lm_studio_endpoint: String,
    #[serde(default = "default_cloud_api_base")]
    pub cloud_api_base: String,
    #[serde(default)]
    pub settings: Settings,
    /// Model registry entries, keyed by alias.
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

fn default_lm_studio_endpoint() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_cloud_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    /// Load configuration from string content.
    pub fn parse(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::Config(format!("Failed to parse config: {e}")))
    }
}

/// Default configuration embedded in the binary: two local models behind
/// LM Studio and one cloud model.
pub fn default_config() -> Config {
    let mut models = BTreeMap::new();
    models.insert(
        "glm-flash".to_string(),
        ModelEntry {
            id: "zai-org/glm-4.7-flash".to_string(),
            name: Some("GLM 4.7 Flash".to_string()),
            family: BackendFamily::LmStudio,
        },
    );
    models.insert(
        "qwen3-coder".to_string(),
        ModelEntry {
            id: "qwen3-coder-30b".to_string(),
            name: Some("Qwen 3 Coder 30B".to_string()),
            family: BackendFamily::LmStudio,
        },
    );
    models.insert(
        "gpt-4o".to_string(),
        ModelEntry {
            id: "gpt-4o".to_string(),
            name: Some("GPT-4o".to_string()),
            family: BackendFamily::OpenAi,
        },
    );

    Config {
        lm_studio_endpoint: default_lm_studio_endpoint(),
        cloud_api_base: default_cloud_api_base(),
        settings: Settings::default(),
        models,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let content = r#"
lm_studio_endpoint = "http://192.168.1.50:5555/v1"

[settings]
temperature = 0.5
max_output_tokens = 1024
timeout_secs = 90
max_concurrent_generations = 2

[models.glm-flash]
id = "zai-org/glm-4.7-flash"
name = "GLM 4.7 Flash"
family = "lm_studio"

[models.gpt-4o]
id = "gpt-4o"
family = "open_ai"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.lm_studio_endpoint, "http://192.168.1.50:5555/v1");
        assert_eq!(config.settings.temperature, 0.5);
        assert_eq!(config.settings.max_concurrent_generations, 2);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models["gpt-4o"].family, BackendFamily::OpenAi);
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::parse("[models.m1]\nid = \"m1\"").unwrap();
        assert_eq!(config.settings.timeout_secs, 120);
        assert_eq!(config.settings.max_concurrent_generations, 1);
        assert_eq!(config.models["m1"].family, BackendFamily::LmStudio);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            Config::parse("not valid toml ["),
            Err(DebateError::Config(_))
        ));
    }

    #[test]
    fn test_default_config_has_models() {
        let config = default_config();
        assert!(!config.models.is_empty());
        assert_eq!(config.settings.max_concurrent_generations, 1);
    }
}
