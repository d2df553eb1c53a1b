//! Navigation session state
//!
//! Everything the picker knows about one invocation: where the user is,
//! what is listed, which page is shown and how the session ended. All
//! methods are synchronous; remote calls happen in the runner.
//!
//! ```text
//! credential menu ──▶ drive menu ──▶ folder listing ◀──┐
//!        ▲                │               │  enter     │
//!        └──── back ──────┘               └────────────┘
//!                                         │ file / confirm / cancel / timeout
//!                                         ▼
//!                                      outcome
//! ```

use std::time::{Duration, Instant};

use super::action::{PickerAction, SelectKind};
use crate::chat::{Menu, MenuBuilder};
use crate::credential_store::CredentialSource;
use crate::format::{natural_cmp, readable_size, readable_time, strip_angle_brackets};
use crate::providers::{DriveEntry, EntryKind, ItemType, SharedDrive, ROOT_ID};

/// Entries shown per page
pub const PAGE_SIZE: usize = 6;

/// Page-step multipliers offered when a folder spans several pages
pub const PAGE_STEP_CHOICES: [usize; 8] = [1, 2, 4, 6, 10, 30, 50, 100];

/// How long a picker waits for the user before giving up
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);

pub const CANCELLED_MESSAGE: &str = "Task has been cancelled!";
pub const TIMED_OUT_MESSAGE: &str = "Timed Out. Task has been cancelled!";
pub const CREDENTIAL_MISSING_MESSAGE: &str = "token.json not Exists!";

/// Prefix marking ids that belong to the user's personal credential
pub const PERSONAL_PREFIX: &str = "mtp:";

/// What the picker is choosing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// An item to pull down from the drive; files may be the answer
    Download,
    /// An upload destination; only folders are listed
    Upload,
}

impl ListMode {
    pub fn label(&self) -> &'static str {
        match self {
            ListMode::Download => "Download",
            ListMode::Upload => "Upload",
        }
    }
}

/// One breadcrumb or root container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: String,
    pub name: String,
}

impl Crumb {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_ID, ROOT_ID)
    }
}

/// How a picker session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    /// Chosen id, already prefixed for the personal credential
    Selected(String),
    Cancelled,
    TimedOut,
    Failed(String),
    CredentialMissing,
}

impl PickerOutcome {
    /// The string handed back to the command that opened the picker
    pub fn into_message(self) -> String {
        let text = match self {
            PickerOutcome::Selected(id) => id,
            PickerOutcome::Cancelled => CANCELLED_MESSAGE.to_string(),
            PickerOutcome::TimedOut => TIMED_OUT_MESSAGE.to_string(),
            PickerOutcome::Failed(err) => err,
            PickerOutcome::CredentialMissing => CREDENTIAL_MISSING_MESSAGE.to_string(),
        };
        strip_angle_brackets(&text)
    }
}

/// Result of pressing an item button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    EnterFolder,
    PickFile(String),
    Invalid,
}

/// Where a "Back" press leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackTarget {
    /// Breadcrumb popped; reload the new current folder
    Parent,
    Drives,
    Credentials,
}

pub struct NavigationSession {
    mode: ListMode,
    pub(crate) credential: Option<CredentialSource>,
    has_owner_credential: bool,
    has_user_credential: bool,
    pub(crate) current_id: String,
    pub(crate) breadcrumb: Vec<Crumb>,
    pub(crate) item_type: ItemType,
    pub(crate) offset: usize,
    pub(crate) page_step: usize,
    pub(crate) items: Vec<DriveEntry>,
    pub(crate) drives: Vec<Crumb>,
    outcome: Option<PickerOutcome>,
    busy: bool,
    started: Instant,
    timeout: Duration,
}

impl NavigationSession {
    pub fn new(mode: ListMode, timeout: Duration) -> Self {
        Self {
            mode,
            credential: None,
            has_owner_credential: false,
            has_user_credential: false,
            current_id: String::new(),
            breadcrumb: Vec::new(),
            item_type: ItemType::Folders,
            offset: 0,
            page_step: 1,
            items: Vec::new(),
            drives: Vec::new(),
            outcome: None,
            busy: false,
            started: Instant::now(),
            timeout,
        }
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn breadcrumb(&self) -> &[Crumb] {
        &self.breadcrumb
    }

    pub fn items(&self) -> &[DriveEntry] {
        &self.items
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn credential(&self) -> Option<CredentialSource> {
        self.credential
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    // ---- termination ----

    /// Record the outcome; only the first call takes effect
    pub fn finish(&mut self, outcome: PickerOutcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn take_outcome(&mut self) -> Option<PickerOutcome> {
        self.outcome.take()
    }

    // ---- re-entrancy guard ----

    /// Mark the session busy; false when an action is already in progress
    pub fn try_begin(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn end(&mut self) {
        self.busy = false;
    }

    // ---- credentials and roots ----

    pub fn set_available_credentials(&mut self, owner: bool, user: bool) {
        self.has_owner_credential = owner;
        self.has_user_credential = user;
    }

    pub fn dual_credentials(&self) -> bool {
        self.has_owner_credential && self.has_user_credential
    }

    /// Switch credential and forget everything listed under the previous one
    pub fn use_credential(&mut self, source: CredentialSource) {
        self.credential = Some(source);
        self.current_id.clear();
        self.breadcrumb.clear();
        self.items.clear();
        self.offset = 0;
    }

    /// Id as stored and returned: `mtp:` prefixed under the personal credential
    pub fn tagged_id(&self, id: &str) -> String {
        match self.credential {
            Some(CredentialSource::User(_)) => format!("{}{}", PERSONAL_PREFIX, id),
            _ => id.to_string(),
        }
    }

    /// The backend has no shared drives: browse the implicit root directly
    pub fn enter_single_root(&mut self) {
        self.drives = vec![Crumb::root()];
        self.breadcrumb = vec![Crumb::root()];
        self.current_id = ROOT_ID.to_string();
    }

    /// Offer `root` plus every shared drive
    pub fn set_drives(&mut self, shared: Vec<SharedDrive>) {
        self.drives = std::iter::once(Crumb::root())
            .chain(shared.into_iter().map(|d| Crumb { id: d.id, name: d.name }))
            .collect();
        self.breadcrumb.clear();
    }

    pub fn choose_drive(&mut self, index: usize) -> bool {
        let Some(drive) = self.drives.get(index).cloned() else {
            return false;
        };
        self.current_id = drive.id.clone();
        self.breadcrumb = vec![drive];
        true
    }

    // ---- navigation ----

    pub fn select(&mut self, kind: SelectKind, index: usize) -> Selection {
        let Some(item) = self.items.get(index) else {
            return Selection::Invalid;
        };
        let (id, name) = (item.id.clone(), item.name.clone());
        self.current_id = id.clone();
        match kind {
            SelectKind::Folder => {
                self.breadcrumb.push(Crumb { id, name });
                Selection::EnterFolder
            }
            SelectKind::File => Selection::PickFile(self.tagged_id(&id)),
        }
    }

    pub fn back(&mut self) -> BackTarget {
        if self.breadcrumb.len() > 1 {
            self.breadcrumb.pop();
            if let Some(top) = self.breadcrumb.last() {
                self.current_id = top.id.clone();
            }
            BackTarget::Parent
        } else if self.drives.len() > 1 {
            BackTarget::Drives
        } else {
            BackTarget::Credentials
        }
    }

    pub fn jump_to_root(&mut self) -> bool {
        let Some(root) = self.breadcrumb.first().cloned() else {
            return false;
        };
        self.current_id = root.id.clone();
        self.breadcrumb.truncate(1);
        true
    }

    pub fn set_item_type(&mut self, item_type: ItemType) {
        self.item_type = item_type;
    }

    /// Replace the listing: natural name order, first page
    pub fn set_items(&mut self, mut items: Vec<DriveEntry>) {
        items.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        self.items = items;
        self.offset = 0;
    }

    pub fn current_path(&self) -> String {
        self.breadcrumb
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    // ---- pagination ----

    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(PAGE_SIZE)
    }

    pub fn current_page(&self) -> usize {
        self.offset / PAGE_SIZE + 1
    }

    fn jump(&self) -> usize {
        PAGE_SIZE * self.page_step
    }

    /// Back `page_step` pages; before the first page wraps to the last
    pub fn page_prev(&mut self) {
        self.offset = match self.offset.checked_sub(self.jump()) {
            Some(offset) => offset,
            None => PAGE_SIZE * self.page_count().saturating_sub(1),
        };
        self.normalize_offset();
    }

    /// Forward `page_step` pages; past the end wraps to the first
    pub fn page_next(&mut self) {
        self.offset += self.jump();
        self.normalize_offset();
    }

    /// Returns false when `step` is already active
    pub fn set_page_step(&mut self, step: usize) -> bool {
        if step == 0 || step == self.page_step {
            return false;
        }
        self.page_step = step;
        true
    }

    fn normalize_offset(&mut self) {
        if self.offset >= self.items.len() {
            self.offset = 0;
        }
    }

    pub fn visible(&self) -> &[DriveEntry] {
        let end = (self.offset + PAGE_SIZE).min(self.items.len());
        &self.items[self.offset.min(end)..end]
    }

    pub fn show_back_button(&self) -> bool {
        (self.breadcrumb.len() > 1 && self.drives.len() > 1) || self.dual_credentials()
    }

    // ---- menus ----

    fn header_text(&self, title: &str) -> String {
        format!("{}\nTransfer Type: <i>{}</i>", title, self.mode.label())
    }

    /// Folder listing menu; `default_id` is shown in upload mode
    pub fn items_menu(&mut self, default_id: Option<&str>, token_label: &str) -> Menu {
        self.normalize_offset();
        let count = self.items.len();
        let mut builder = MenuBuilder::new();

        for (i, item) in self.visible().iter().enumerate() {
            let index = self.offset + i;
            let (kind, label) = match item.kind() {
                EntryKind::Folder => (SelectKind::Folder, item.name.clone()),
                _ => (
                    SelectKind::File,
                    format!("[{}] {}", readable_size(item.size.unwrap_or(0)), item.name),
                ),
            };
            builder.button(label, PickerAction::Select { kind, index }.encode());
        }

        if count > PAGE_SIZE {
            for step in PAGE_STEP_CHOICES {
                builder.header(step.to_string(), PickerAction::SetPageStep(step).encode());
            }
            builder.footer("Previous", PickerAction::PagePrev.encode());
            builder.footer("Next", PickerAction::PageNext.encode());
        }
        if self.mode == ListMode::Download {
            let (label, target) = match self.item_type {
                ItemType::Folders => ("Files", ItemType::Files),
                _ => ("Folders", ItemType::Folders),
            };
            builder.footer(label, PickerAction::SetItemType(target).encode());
        }
        if self.mode == ListMode::Upload || count > 0 {
            builder.footer("Choose Current Path", PickerAction::ConfirmCurrent.encode());
        }
        if self.mode == ListMode::Upload {
            builder.footer("Set as Default Path", PickerAction::SetAsDefault.encode());
        }
        if self.show_back_button() {
            builder.footer("Back", PickerAction::BackToParent.encode());
        }
        if self.breadcrumb.len() > 1 {
            builder.footer("Back To Root", PickerAction::JumpToRoot.encode());
        }
        builder.footer("Cancel", PickerAction::Cancel.encode());

        let mut text = self.header_text("Choose Path:");
        if self.mode == ListMode::Upload {
            if let Some(id) = default_id.filter(|id| !id.is_empty()) {
                text.push_str(&format!("\nDefault Gdrive ID: {}", id));
            }
        }
        text.push_str(&format!("\n\nItems: {}", count));
        if count > PAGE_SIZE {
            text.push_str(&format!(
                " | Page: {}/{} | Page Step: {}",
                self.current_page(),
                self.page_count(),
                self.page_step
            ));
        }
        text.push_str(&format!("\n\nItem Type: {}\nToken Path: {}", self.item_type, token_label));
        text.push_str(&format!("\n\nCurrent ID: <code>{}</code>", self.current_id));
        text.push_str(&format!("\nCurrent Path: <code>{}</code>", self.current_path()));
        text.push_str(&format!("\nTimeout: {}", readable_time(self.remaining())));

        builder.build(text, 1, 8, 2)
    }

    /// Root container menu
    pub fn drives_menu(&self, token_label: &str) -> Menu {
        let mut builder = MenuBuilder::new();
        for (i, drive) in self.drives.iter().enumerate() {
            builder.button(drive.name.clone(), PickerAction::ChooseDrive(i).encode());
        }
        if self.dual_credentials() {
            builder.footer("Back", PickerAction::BackToDrives.encode());
        }
        builder.footer("Cancel", PickerAction::Cancel.encode());

        let mut text = self.header_text("Choose Drive:");
        text.push_str(&format!("\nToken Path: {}", token_label));
        text.push_str(&format!("\nTimeout: {}", readable_time(self.remaining())));
        builder.build(text, 2, 8, 2)
    }

    /// Owner-or-personal credential menu
    pub fn credential_menu(&self) -> Menu {
        let mut builder = MenuBuilder::new();
        builder.button("Owner Token", PickerAction::UseOwnerCredential.encode());
        builder.button("My Token", PickerAction::UseUserCredential.encode());
        builder.button("Cancel", PickerAction::Cancel.encode());

        let mut text = self.header_text("Choose Token:");
        text.push_str(&format!("\nTimeout: {}", readable_time(self.remaining())));
        builder.build(text, 2, 8, 2)
    }
}
