use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::Paths;

/// Session behavior switches read once by the session factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    /// Derivative sessions queue updates until they are populated.
    #[serde(default)]
    pub use_timeout_scheduler: bool,
    /// Page continuations only land in the session that requested them.
    #[serde(default = "default_limit_page_updates")]
    pub limit_page_updates: bool,
    /// Page continuations never land in HEAD.
    #[serde(default)]
    pub limit_page_updates_in_head: bool,
}

fn default_limit_page_updates() -> bool {
    true
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            use_timeout_scheduler: false,
            limit_page_updates: default_limit_page_updates(),
            limit_page_updates_in_head: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "feed.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(!config.feed.use_timeout_scheduler);
        assert!(config.feed.limit_page_updates);
        assert!(!config.feed.limit_page_updates_in_head);
        assert_eq!(config.storage.database, "feed.db");
    }

    #[test]
    fn test_camel_case_keys() {
        let config: Config = serde_json::from_str(
            r#"{"feed": {"useTimeoutScheduler": true, "limitPageUpdatesInHead": true}}"#,
        )
        .unwrap();
        assert!(config.feed.use_timeout_scheduler);
        assert!(config.feed.limit_page_updates_in_head);
        assert!(config.feed.limit_page_updates);
    }

    #[test]
    fn test_invalid_config_names_file() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), r#"{"feed": {"limitPageUpdates": "yes"}}"#).unwrap();

        match Config::load_or_default(&paths) {
            Err(Error::Config(msg)) => assert!(msg.contains("config.json")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());

        let mut config = Config::default();
        config.feed.limit_page_updates = false;
        config.save(&paths.config_file()).unwrap();

        let loaded = Config::load_or_default(&paths).unwrap();
        assert!(!loaded.feed.limit_page_updates);
    }
}
