//! Shared types for the Drive provider
//!
//! Entry representations, item-type filters, search roots and the error type
//! returned by every remote call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// MIME type Google Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// MIME type Google Drive uses for shortcuts
pub const SHORTCUT_MIME_TYPE: &str = "application/vnd.google-apps.shortcut";

/// Id of the implicit "My Drive" root
pub const ROOT_ID: &str = "root";

/// Restricts listed entries to folders, files, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    Folders,
    Files,
    Both,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Folders => "folders",
            ItemType::Files => "files",
            ItemType::Both => "both",
        }
    }

    /// Opposite filter; `Both` has no opposite
    pub fn toggled(self) -> Self {
        match self {
            ItemType::Folders => ItemType::Files,
            ItemType::Files => ItemType::Folders,
            ItemType::Both => ItemType::Both,
        }
    }

    /// Query clause (with trailing `and `) restricting the mime type
    pub fn mime_clause(&self) -> Option<String> {
        match self {
            ItemType::Files => Some(format!("mimeType != '{}' and ", FOLDER_MIME_TYPE)),
            ItemType::Folders => Some(format!("mimeType = '{}' and ", FOLDER_MIME_TYPE)),
            ItemType::Both => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folders" => Ok(ItemType::Folders),
            "files" => Ok(ItemType::Files),
            "both" => Ok(ItemType::Both),
            other => Err(format!("unknown item type: {}", other)),
        }
    }
}

/// Classification of a remote entry by mime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    Shortcut,
    File,
}

/// A file or folder returned by the Drive API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Byte size; Drive omits it for folders and native documents
    pub size: Option<u64>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveEntry {
    pub fn folder(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
            parents: Vec::new(),
        }
    }

    pub fn file(id: &str, name: &str, mime_type: &str, size: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: Some(size),
            parents: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self.mime_type.as_str() {
            FOLDER_MIME_TYPE => EntryKind::Folder,
            SHORTCUT_MIME_TYPE => EntryKind::Shortcut,
            _ => EntryKind::File,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == EntryKind::Folder
    }

    /// Whether the index server can stream this entry in the browser
    pub fn is_viewable_media(&self) -> bool {
        ["image", "video", "audio"]
            .iter()
            .any(|prefix| self.mime_type.starts_with(prefix))
    }
}

/// A shared drive (team drive) visible to the authorized account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDrive {
    pub id: String,
    pub name: String,
}

/// A configured search target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRoot {
    /// Display name; empty hides the per-drive header in results
    #[serde(default)]
    pub name: String,
    pub id: String,
    /// Base URL of an index server exposing this drive (with trailing slash)
    #[serde(default)]
    pub index_url: Option<String>,
}

impl SearchRoot {
    pub fn new(name: &str, id: &str, index_url: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            index_url: index_url.filter(|u| !u.is_empty()).map(|u| u.to_string()),
        }
    }
}

/// Corpus a Drive query runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// The caller's own "My Drive"
    MyDrive,
    /// Every item of one shared drive
    SharedDrive(String),
    /// Any drive the caller can reach (used with a parent constraint)
    AllDrives,
}

/// A `files.list` request: filter expression plus corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveQuery {
    pub filter: String,
    pub scope: QueryScope,
}

impl DriveQuery {
    /// Request parameters for `files.list`, excluding the filter itself
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("spaces", "drive".to_string())];
        match &self.scope {
            QueryScope::MyDrive => {
                params.push(("pageSize", "200".to_string()));
                params.push(("fields", "files(id, name, mimeType, size, parents)".to_string()));
            }
            QueryScope::SharedDrive(drive_id) => {
                params.push(("supportsAllDrives", "true".to_string()));
                params.push(("includeItemsFromAllDrives", "true".to_string()));
                params.push(("driveId", drive_id.clone()));
                params.push(("corpora", "drive".to_string()));
                params.push(("pageSize", "150".to_string()));
                params.push((
                    "fields",
                    "files(id, name, mimeType, size, teamDriveId, parents)".to_string(),
                ));
            }
            QueryScope::AllDrives => {
                params.push(("supportsAllDrives", "true".to_string()));
                params.push(("includeItemsFromAllDrives", "true".to_string()));
                params.push(("pageSize", "150".to_string()));
                params.push(("fields", "files(id, name, mimeType, size)".to_string()));
            }
        }
        params.push(("orderBy", "folder, name asc".to_string()));
        params
    }
}

/// Provider error types
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Number of attempts made when the retry policy gave up
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ProviderError::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
