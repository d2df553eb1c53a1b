// Bot configuration
// Drive roots, credential locations and picker limits, stored as JSON

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::{HttpRetryConfig, SearchRoot};
use crate::search::MAX_DRIVE_ID_LEN;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize config: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Destination shown when a user has not chosen a default
    pub gdrive_id: String,
    /// Roots searched in order
    pub drives: Vec<SearchRoot>,
    pub picker_timeout_secs: u64,
    /// Owner token file
    pub owner_token_path: PathBuf,
    /// Directory of per-user token files named `<user id>.json`
    pub user_tokens_dir: PathBuf,
    pub user_data_path: PathBuf,
    pub retry: HttpRetryConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            gdrive_id: String::new(),
            drives: Vec::new(),
            picker_timeout_secs: 240,
            owner_token_path: PathBuf::from("token.json"),
            user_tokens_dir: PathBuf::from("tokens"),
            user_data_path: config_dir().join("users.json"),
            retry: HttpRetryConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn picker_timeout(&self) -> Duration {
        Duration::from_secs(self.picker_timeout_secs)
    }

    /// Configured roots, with the default destination first when it is
    /// not already listed
    pub fn search_roots(&self) -> Vec<SearchRoot> {
        let mut roots = Vec::with_capacity(self.drives.len() + 1);
        if !self.gdrive_id.is_empty() && !self.drives.iter().any(|d| d.id == self.gdrive_id) {
            roots.push(SearchRoot::new("", &self.gdrive_id, None));
        }
        roots.extend(self.drives.iter().cloned());
        roots
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.picker_timeout_secs == 0 {
            return Err(ConfigError::Invalid("picker_timeout_secs must be positive".to_string()));
        }
        for drive in &self.drives {
            if drive.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("drive '{}' has no id", drive.name)));
            }
            if drive.id.contains(['\'', '<', '>']) {
                return Err(ConfigError::Invalid(format!("drive id '{}' is malformed", drive.id)));
            }
            if let Some(url) = &drive.index_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!("index url '{}' is not http(s)", url)));
                }
                if !url.ends_with('/') {
                    return Err(ConfigError::Invalid(format!("index url '{}' must end with '/'", url)));
                }
            }
            if drive.id.len() > MAX_DRIVE_ID_LEN {
                tracing::debug!("Root {} is a folder id, searched by parent only", drive.id);
            }
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("drivepick")
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration, falling back to defaults when the file is missing or unreadable
pub fn load_config(path: &Path) -> BotConfig {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config {:?}: {}", path, e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
            }
        }
    }

    BotConfig::default()
}

pub fn save_config(config: &BotConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    tracing::info!("Config saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.json"));
        assert_eq!(config.picker_timeout(), Duration::from_secs(240));
        assert_eq!(config.owner_token_path, PathBuf::from("token.json"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"gdrive_id": "0Amain", "drives": [{"name": "Team", "id": "0Ateam", "index_url": "https://idx.example/1:/"}]}"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.gdrive_id, "0Amain");
        assert_eq!(config.user_tokens_dir, PathBuf::from("tokens"));
        assert_eq!(config.retry, HttpRetryConfig::default());
        assert!(config.validate().is_ok());

        let roots = config.search_roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].id, "0Amain");
        assert_eq!(roots[1].index_url.as_deref(), Some("https://idx.example/1:/"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = BotConfig::default();
        config.drives.push(SearchRoot::new("Main", "root", None));
        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn test_validate_rejects_bad_roots() {
        let mut config = BotConfig::default();
        config.drives.push(SearchRoot::new("Empty", " ", None));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.drives[0] = SearchRoot::new("Team", "0Ateam", Some("https://idx.example"));
        assert!(config.validate().is_err());

        config.drives[0] = SearchRoot::new("Team", "0Ateam", Some("https://idx.example/"));
        config.picker_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
