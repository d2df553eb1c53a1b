// drivepick - Google Drive picker and multi-drive search for chat bots

pub mod chat;
pub mod config;
pub mod credential_store;
pub mod format;
pub mod picker;
pub mod providers;
pub mod search;
pub mod user_data;

pub use chat::{CallbackEvent, CallbackRouter, ChatSurface, ConsoleChat, Menu, MessageId};
pub use config::{load_config, BotConfig};
pub use credential_store::{CredentialSource, CredentialStore, TokenDirectory};
pub use picker::{DrivePicker, ListMode, PickerOutcome};
pub use providers::{DriveService, GoogleDriveProvider, ItemType, ProviderError, SearchRoot};
pub use search::{DriveSearch, SearchOptions, SearchPlan, SearchResults};
pub use user_data::{JsonUserStore, UserDataStore};

use tracing::Level;

/// Install a stderr `tracing` subscriber; `verbose` lowers the level to debug
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
