// Drivepick Credential Store
// Owner (shared) and personal Drive tokens stored as JSON files

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::providers::{DriveService, GoogleDriveProvider, HttpRetryConfig, ProviderError};

/// Which stored authorization is used for remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The bot owner's shared token
    Owner,
    /// The requesting user's own token
    User(i64),
}

impl CredentialSource {
    pub fn is_owner(&self) -> bool {
        matches!(self, CredentialSource::Owner)
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Owner => write!(f, "owner"),
            CredentialSource::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Credential existence checks and service construction
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether a usable token exists for `source`
    async fn has_credential(&self, source: CredentialSource) -> bool;

    /// Human readable location of the token, shown in picker menus
    fn describe(&self, source: CredentialSource) -> String;

    /// Build a Drive service authorized with `source`
    async fn authorize(
        &self,
        source: CredentialSource,
    ) -> Result<Arc<dyn DriveService>, ProviderError>;
}

#[derive(Deserialize)]
struct TokenFile {
    access_token: String,
}

/// Token files laid out as `<owner_token>` and `<user_dir>/<user_id>.json`
pub struct TokenDirectory {
    owner_token: PathBuf,
    user_dir: PathBuf,
    retry: HttpRetryConfig,
}

impl TokenDirectory {
    pub fn new(owner_token: impl Into<PathBuf>, user_dir: impl Into<PathBuf>, retry: HttpRetryConfig) -> Self {
        Self {
            owner_token: owner_token.into(),
            user_dir: user_dir.into(),
            retry,
        }
    }

    pub fn token_path(&self, source: CredentialSource) -> PathBuf {
        match source {
            CredentialSource::Owner => self.owner_token.clone(),
            CredentialSource::User(id) => self.user_dir.join(format!("{}.json", id)),
        }
    }

    async fn read_token(path: &Path) -> Result<SecretString, ProviderError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::AuthenticationFailed(format!("{}: {}", path.display(), e))
        })?;
        let token: TokenFile = serde_json::from_str(&content)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", path.display(), e)))?;
        if token.access_token.is_empty() {
            return Err(ProviderError::AuthenticationFailed(format!(
                "{} holds no access token",
                path.display()
            )));
        }
        Ok(SecretString::from(token.access_token))
    }
}

#[async_trait]
impl CredentialStore for TokenDirectory {
    async fn has_credential(&self, source: CredentialSource) -> bool {
        tokio::fs::try_exists(self.token_path(source)).await.unwrap_or(false)
    }

    fn describe(&self, source: CredentialSource) -> String {
        self.token_path(source).display().to_string()
    }

    async fn authorize(
        &self,
        source: CredentialSource,
    ) -> Result<Arc<dyn DriveService>, ProviderError> {
        let token = Self::read_token(&self.token_path(source)).await?;
        info!("Authorized Drive client with {} credential", source);
        Ok(Arc::new(GoogleDriveProvider::new(token, self.retry.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> TokenDirectory {
        TokenDirectory::new(
            dir.path().join("token.json"),
            dir.path().join("tokens"),
            HttpRetryConfig::default(),
        )
    }

    #[test]
    fn test_token_paths() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.token_path(CredentialSource::Owner), dir.path().join("token.json"));
        assert_eq!(
            store.token_path(CredentialSource::User(42)),
            dir.path().join("tokens").join("42.json")
        );
    }

    #[tokio::test]
    async fn test_has_credential() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(!store.has_credential(CredentialSource::Owner).await);

        std::fs::write(dir.path().join("token.json"), r#"{"access_token":"abc"}"#).unwrap();
        assert!(store.has_credential(CredentialSource::Owner).await);
        assert!(!store.has_credential(CredentialSource::User(7)).await);
    }

    #[tokio::test]
    async fn test_authorize_rejects_empty_token() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("token.json"), r#"{"access_token":""}"#).unwrap();
        let result = store(&dir).authorize(CredentialSource::Owner).await;
        assert!(matches!(result, Err(ProviderError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_authorize_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = store(&dir).authorize(CredentialSource::User(1)).await;
        assert!(result.is_err());
    }
}
