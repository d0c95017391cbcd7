use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "ai-cooking";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    /// HTTP-layer retries for transient statuses. The engine itself never retries.
    #[serde(default = "default_http_max_retries")]
    pub http_max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Overrides `<config_dir>/ai-cooking/storage` for the key-value store.
    #[serde(default)]
    pub storage_dir: Option<String>,
    #[serde(default = "default_state_key")]
    pub state_key: String,
    #[serde(default)]
    pub rules_preset: Option<String>,
    /// A YAML file that replaces the embedded reference tables.
    #[serde(default)]
    pub rules_path: Option<String>,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_error_preview_chars")]
    pub error_preview_chars: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_completion_tokens() -> u32 {
    2000
}

fn default_http_max_retries() -> u32 {
    2
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_state_key() -> String {
    "aiCookingState".to_string()
}

fn default_error_preview_chars() -> usize {
    crate::agent::extract::DEFAULT_PREVIEW_CHARS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_completion_tokens: default_max_completion_tokens(),
            http_max_retries: default_http_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            storage_dir: None,
            state_key: default_state_key(),
            rules_preset: None,
            rules_path: None,
            telemetry_enabled: false,
            error_preview_chars: default_error_preview_chars(),
        }
    }
}

impl AppConfig {
    /// `<config_dir>/ai-cooking`
    pub fn app_dir() -> Result<PathBuf, AppError> {
        let base = dirs::config_dir()
            .ok_or_else(|| AppError::Config("Cannot find config directory".into()))?;
        Ok(base.join(APP_DIR))
    }

    pub fn config_path() -> Result<PathBuf, AppError> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The configured key, else `OPENAI_API_KEY` from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }

    pub fn storage_path(&self) -> Result<PathBuf, AppError> {
        match &self.storage_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(Self::app_dir()?.join("storage")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.state_key, "aiCookingState");
        assert_eq!(config.max_completion_tokens, 2000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"model":"llama-4","telemetry_enabled":true}"#).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "llama-4");
        assert!(config.telemetry_enabled);
        assert_eq!(config.http_max_retries, 2);
        assert_eq!(config.error_preview_chars, 500);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            rules_preset: Some("extended".into()),
            storage_dir: Some("/tmp/cooking".into()),
            ..AppConfig::default()
        };
        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.storage_path().unwrap(), PathBuf::from("/tmp/cooking"));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(AppError::Config(_))));
    }
}
