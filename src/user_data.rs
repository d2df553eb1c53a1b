//! Per-user preferences
//!
//! Stores each user's default upload destination and index URL. The JSON
//! backed store can notify an external mirror (for example a database)
//! after every update.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum UserDataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Sync hook failed: {0}")]
    Sync(String),
}

/// Preferences kept for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    /// Default upload destination; `mtp:` prefix marks the personal token
    #[serde(default)]
    pub gdrive_id: Option<String>,
    /// Index server for the user's own drive
    #[serde(default)]
    pub index_url: Option<String>,
}

#[async_trait]
pub trait UserDataStore: Send + Sync {
    async fn get(&self, user_id: i64) -> UserData;

    async fn set_default_destination(&self, user_id: i64, id: &str) -> Result<(), UserDataError>;

    async fn default_destination(&self, user_id: i64) -> Option<String> {
        self.get(user_id).await.gdrive_id
    }

    async fn index_url(&self, user_id: i64) -> Option<String> {
        self.get(user_id).await.index_url
    }
}

/// Mirrors user data to an external system after it changes
#[async_trait]
pub trait UserDataSync: Send + Sync {
    async fn user_updated(&self, user_id: i64, data: &UserData) -> Result<(), UserDataError>;
}

/// User data persisted as one JSON object keyed by user id
pub struct JsonUserStore {
    path: PathBuf,
    users: RwLock<HashMap<i64, UserData>>,
    sync: Option<Arc<dyn UserDataSync>>,
}

impl JsonUserStore {
    /// Load `path`, starting empty when it does not exist or fails to parse
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Failed to parse user data {:?}: {}", path, e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            users: RwLock::new(users),
            sync: None,
        }
    }

    pub fn with_sync(mut self, sync: Arc<dyn UserDataSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    async fn persist(&self, users: &HashMap<i64, UserData>) -> Result<(), UserDataError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(users)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl UserDataStore for JsonUserStore {
    async fn get(&self, user_id: i64) -> UserData {
        self.users.read().await.get(&user_id).cloned().unwrap_or_default()
    }

    async fn set_default_destination(&self, user_id: i64, id: &str) -> Result<(), UserDataError> {
        let data = {
            let mut users = self.users.write().await;
            let entry = users.entry(user_id).or_default();
            entry.gdrive_id = Some(id.to_string());
            let data = entry.clone();
            self.persist(&users).await?;
            data
        };
        info!("Default destination of user {} set to {}", user_id, id);

        if let Some(sync) = &self.sync {
            sync.user_updated(user_id, &data).await?;
        }
        Ok(())
    }
}
