//! Drive Provider Module
//!
//! Abstraction over the remote listing/query service used by both the
//! interactive picker and the multi-drive search.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             DriveService Trait              │
//! │     list_folder, list_drives, query         │
//! └─────────────────────────────────────────────┘
//!                      │
//!            ┌─────────┴─────────┐
//!            ▼                   ▼
//!    ┌───────────────┐   ┌───────────────┐
//!    │  GoogleDrive  │   │  test doubles │
//!    │ (http_retry)  │   │               │
//!    └───────────────┘   └───────────────┘
//! ```

pub mod types;
pub mod http_retry;
pub mod google_drive;

pub use types::*;
pub use http_retry::{send_with_retry, HttpRetryConfig};
pub use google_drive::GoogleDriveProvider;

use async_trait::async_trait;

/// Remote listing and query service
///
/// Implementations retry transient failures internally; an error returned
/// here means the call is final for the caller.
#[async_trait]
pub trait DriveService: Send + Sync {
    /// List the non-trashed children of `folder_id`, restricted by `item_type`
    async fn list_folder(
        &self,
        folder_id: &str,
        item_type: ItemType,
    ) -> Result<Vec<DriveEntry>, ProviderError>;

    /// List the shared drives visible to the authorized account
    async fn list_drives(&self) -> Result<Vec<SharedDrive>, ProviderError>;

    /// Run a raw `files.list` query
    async fn query(&self, query: &DriveQuery) -> Result<Vec<DriveEntry>, ProviderError>;
}
