use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::core::attachment::AttachmentLimits;

pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_ATTACHMENTS_PER_BATCH: usize = 50;

fn default_max_attachment_bytes() -> u64 {
    DEFAULT_MAX_ATTACHMENT_BYTES
}

fn default_max_attachments_per_batch() -> usize {
    DEFAULT_MAX_ATTACHMENTS_PER_BATCH
}

/// How accepted attachments are encoded: embedded in the message record
/// or uploaded through the configured collaborator. A configuration
/// choice, never a per-file heuristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Inline,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentSettings {
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
    #[serde(default = "default_max_attachments_per_batch")]
    pub max_attachments_per_batch: usize,
    /// Upload endpoint for remote delivery; unused for inline.
    pub upload_url: Option<String>,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::default(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            max_attachments_per_batch: DEFAULT_MAX_ATTACHMENTS_PER_BATCH,
            upload_url: None,
        }
    }
}

impl AttachmentSettings {
    pub fn limits(&self) -> AttachmentLimits {
        AttachmentLimits {
            max_attachment_bytes: self.max_attachment_bytes,
            max_attachments_per_batch: self.max_attachments_per_batch,
        }
    }
}

/// Resolved per-send parameters handed explicitly into the stream
/// service. Nothing in the pipeline reads ambient configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl RelayConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: None,
            system_prompt: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// A credential is usable when it is present and non-blank.
    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub temperature: Option<f32>,
    /// System preamble injected as the leading wire message when set.
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub attachments: AttachmentSettings,
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path();
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    fn get_config_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "palaver")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    /// Build the per-send relay parameters, or `None` when base URL or
    /// model are unset and the caller must prompt for them.
    pub fn relay_config(&self, api_key: Option<String>) -> Option<RelayConfig> {
        let base_url = self.base_url.clone()?;
        let model = self.default_model.clone()?;
        Some(RelayConfig {
            base_url,
            api_key,
            model,
            temperature: self.temperature,
            system_prompt: self.system_prompt.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.attachments.max_attachment_bytes,
            DEFAULT_MAX_ATTACHMENT_BYTES
        );
        assert_eq!(
            config.attachments.max_attachments_per_batch,
            DEFAULT_MAX_ATTACHMENTS_PER_BATCH
        );
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.base_url = Some("https://relay.example/v1".to_string());
        config.default_model = Some("gpt-4o".to_string());
        config.temperature = Some(0.7);
        config.attachments.delivery = DeliveryMode::Remote;
        config.attachments.upload_url = Some("https://uploads.example".to_string());

        config.save_to_path(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_toml_fills_attachment_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "base_url = \"https://relay.example/v1\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.attachments.delivery, DeliveryMode::Inline);
        assert_eq!(
            config.attachments.max_attachment_bytes,
            DEFAULT_MAX_ATTACHMENT_BYTES
        );
    }

    #[test]
    fn relay_config_requires_base_url_and_model() {
        let mut config = Config::default();
        assert!(config.relay_config(None).is_none());

        config.base_url = Some("https://relay.example/v1".to_string());
        assert!(config.relay_config(None).is_none());

        config.default_model = Some("gpt-4o".to_string());
        let relay = config.relay_config(Some("sk-test".to_string())).unwrap();
        assert_eq!(relay.base_url, "https://relay.example/v1");
        assert_eq!(relay.model, "gpt-4o");
        assert!(relay.has_credential());
    }

    #[test]
    fn blank_api_key_is_not_a_credential() {
        let relay = RelayConfig::new("https://relay.example/v1", "gpt-4o").with_api_key("   ");
        assert!(!relay.has_credential());
        let relay = RelayConfig::new("https://relay.example/v1", "gpt-4o");
        assert!(!relay.has_credential());
    }
}
