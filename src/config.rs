//! Application configuration: `.protobuilder/config.toml` plus environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::LlmError;

/// Directory holding every protobuilder config file of a project.
pub fn config_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(".protobuilder")
}

/// Chat-completion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name; `OPENAI_MODEL` overrides it
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: None,
        }
    }
}

impl LlmConfig {
    /// API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, LlmError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey {
                var: self.api_key_env.clone(),
            })
    }
}

/// Settings for `protobuilder generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Where generated prototypes are written, relative to the project dir
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("projects")
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// The complete config.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
}

impl AppConfig {
    pub fn path_for(project_dir: &Path) -> PathBuf {
        config_dir(project_dir).join("config.toml")
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Load `.protobuilder/config.toml` (defaults when missing), then apply
    /// environment overrides.
    pub fn resolve(project_dir: &Path) -> Result<Self> {
        let path = Self::path_for(project_dir);
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `OPENAI_MODEL`, looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.llm.model = model;
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Absolute output directory for generated prototypes.
    pub fn output_dir(&self, project_dir: &Path) -> PathBuf {
        if self.generate.output_dir.is_absolute() {
            self.generate.output_dir.clone()
        } else {
            project_dir.join(&self.generate.output_dir)
        }
    }
}
