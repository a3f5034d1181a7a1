use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub viewer: ViewerConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// "rest" for the hosted row API + realtime feed, "memory" for the
    /// in-process backend (local demo runs).
    pub mode: String,
    pub rest_url: String,
    pub realtime_url: String,
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: "rest".to_string(),
            rest_url: "http://127.0.0.1:54321/rest/v1".to_string(),
            realtime_url: "ws://127.0.0.1:54321/realtime/v1".to_string(),
            api_key: None,
        }
    }
}

/// Identity of the person this instance syncs for. The id is the
/// participant id used for notes and upvotes; the email is what other
/// participants' meeting rows reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 6338, // MEET on a phone keypad
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_for_missing_keys() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend.mode, "rest");
        assert_eq!(config.api.port, 6338);
        assert!(config.backend.api_key.is_none());
        assert!(config.viewer.id.is_empty());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [viewer]
            id = "u1"
            email = "ada@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.viewer.id, "u1");
        assert_eq!(config.viewer.email, "ada@example.com");
        assert_eq!(config.backend.mode, "rest");
    }

    #[test]
    fn test_round_trips_through_file() {
        let mut config = Config::default();
        config.viewer.id = "u1".to_string();
        config.backend.mode = "memory".to_string();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded: Config =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.viewer.id, "u1");
        assert_eq!(loaded.backend.mode, "memory");
        assert_eq!(loaded.api.port, 6338);
    }
}
