//! Google Drive Provider
//!
//! Implements `DriveService` over the Drive API v3 REST endpoints.
//! Token acquisition happens elsewhere; this client only carries a bearer
//! token and routes every request through the shared retry policy.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    send_with_retry, DriveEntry, DriveQuery, DriveService, HttpRetryConfig, ItemType,
    ProviderError, SharedDrive,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive file metadata from API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
}

impl From<DriveFile> for DriveEntry {
    fn from(file: DriveFile) -> Self {
        DriveEntry {
            size: file.size.as_deref().and_then(|s| s.parse().ok()),
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            parents: file.parents,
        }
    }
}

/// Google Drive file list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Shared drive list response
#[derive(Debug, Deserialize)]
struct DriveList {
    #[serde(default)]
    drives: Vec<SharedDrive>,
}

/// Google Drive client bound to one access token
pub struct GoogleDriveProvider {
    client: reqwest::Client,
    access_token: SecretString,
    retry: HttpRetryConfig,
    api_base: String,
}

impl GoogleDriveProvider {
    pub fn new(access_token: SecretString, retry: HttpRetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
            retry,
            api_base: DRIVE_API_BASE.to_string(),
        }
    }

    /// Point the client at another API root (local test servers)
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn build_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/{}?{}", self.api_base, path, query)
    }

    /// GET `url` with the bearer token and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let request = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token.expose_secret()))
            .build()
            .map_err(|e| ProviderError::Other(format!("Invalid request: {}", e)))?;

        let response = send_with_retry(&self.client, request, &self.retry).await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::AuthenticationFailed(text),
                404 => ProviderError::NotFound(text),
                _ => ProviderError::ServerError(format!("API error {}: {}", status, text)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl DriveService for GoogleDriveProvider {
    async fn list_folder(
        &self,
        folder_id: &str,
        item_type: ItemType,
    ) -> Result<Vec<DriveEntry>, ProviderError> {
        let mut filter = format!("'{}' in parents and ", folder_id);
        if let Some(clause) = item_type.mime_clause() {
            filter.push_str(&clause);
        }
        filter.push_str("trashed = false");

        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", filter.clone()),
                ("supportsAllDrives", "true".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
                ("spaces", "drive".to_string()),
                ("pageSize", "200".to_string()),
                ("fields", "nextPageToken, files(id, name, mimeType, size, parents)".to_string()),
                ("orderBy", "folder, name".to_string()),
            ];
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }

            let list: DriveFileList = self.get_json(&self.build_url("files", &params)).await?;
            entries.extend(list.files.into_iter().map(DriveEntry::from));

            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} entries in {}", entries.len(), folder_id);
        Ok(entries)
    }

    async fn list_drives(&self) -> Result<Vec<SharedDrive>, ProviderError> {
        let url = self.build_url("drives", &[("pageSize", "100".to_string())]);
        let list: DriveList = self.get_json(&url).await?;
        Ok(list.drives)
    }

    async fn query(&self, query: &DriveQuery) -> Result<Vec<DriveEntry>, ProviderError> {
        let mut params = vec![("q", query.filter.clone())];
        params.extend(query.params());

        let list: DriveFileList = self.get_json(&self.build_url("files", &params)).await?;
        Ok(list.files.into_iter().map(DriveEntry::from).collect())
    }
}
