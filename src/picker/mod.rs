//! Interactive Drive picker
//!
//! Runs one `NavigationSession` per invocation: renders a menu, waits for
//! the user's next button press (bounded by the session deadline), applies
//! it, and repeats until the session has an outcome.
//!
//! # Workflow
//!
//! ```text
//! subscribe(user) ─▶ choose credential ─▶ list drives ─▶ list folder
//!                                                         │
//!       ┌─────────────────────────────────────────────────┘
//!       ▼
//!   wait for event ──timeout──▶ TimedOut
//!       │
//!       ▼
//!   apply action ─▶ outcome set? ──no──▶ wait for event
//!       │                │yes
//!       │ cancel press   ▼
//!       └───────────▶ unsubscribe, delete menu, return outcome
//! ```

pub mod action;
pub mod session;

pub use action::{ActionParseError, PickerAction, SelectKind};
pub use session::{
    BackTarget, Crumb, ListMode, NavigationSession, PickerOutcome, Selection, CANCELLED_MESSAGE,
    CREDENTIAL_MISSING_MESSAGE, DEFAULT_TIMEOUT, PAGE_SIZE, PAGE_STEP_CHOICES, PERSONAL_PREFIX,
    TIMED_OUT_MESSAGE,
};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::chat::{CallbackRouter, ChatSurface, Menu, MessageId, Subscription};
use crate::credential_store::{CredentialSource, CredentialStore};
use crate::format::strip_angle_brackets;
use crate::providers::{DriveService, ItemType, ProviderError};
use crate::user_data::UserDataStore;

/// Opens pickers for one user
pub struct DrivePicker {
    user_id: i64,
    chat: Arc<dyn ChatSurface>,
    credentials: Arc<dyn CredentialStore>,
    user_data: Arc<dyn UserDataStore>,
    /// Shown as the default destination when the user has none
    fallback_destination: Option<String>,
    timeout: Duration,
}

impl DrivePicker {
    pub fn new(
        user_id: i64,
        chat: Arc<dyn ChatSurface>,
        credentials: Arc<dyn CredentialStore>,
        user_data: Arc<dyn UserDataStore>,
    ) -> Self {
        Self {
            user_id,
            chat,
            credentials,
            user_data,
            fallback_destination: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_destination(mut self, id: &str) -> Self {
        self.fallback_destination = Some(id.to_string()).filter(|id| !id.is_empty());
        self
    }

    /// Run a picker and return the chosen id or the cancellation/error text
    pub async fn get_target_id(
        &self,
        router: &CallbackRouter,
        mode: ListMode,
        credential: Option<CredentialSource>,
    ) -> String {
        self.run(router, mode, credential).await.into_message()
    }

    /// Run a picker to completion
    ///
    /// `credential` forces a credential source; `None` lets the user choose
    /// when both the owner and the personal token are available.
    pub async fn run(
        &self,
        router: &CallbackRouter,
        mode: ListMode,
        credential: Option<CredentialSource>,
    ) -> PickerOutcome {
        let mut subscription = router.subscribe(self.user_id);
        let deadline = Instant::now() + self.timeout;
        let mut run = PickerRun {
            picker: self,
            session: NavigationSession::new(mode, self.timeout),
            service: None,
            reply: None,
        };
        info!("Picker opened for user {} ({})", self.user_id, mode.label());

        if timeout_at(deadline, run.start(credential)).await.is_err() {
            run.session.finish(PickerOutcome::TimedOut);
        }

        while !run.session.is_finished() {
            match timeout_at(deadline, subscription.recv()).await {
                Err(_) => {
                    run.session.finish(PickerOutcome::TimedOut);
                }
                Ok(None) => {
                    run.session.finish(PickerOutcome::Cancelled);
                }
                Ok(Some(event)) => {
                    let handled = run.handle_event(&event.data, &mut subscription);
                    if timeout_at(deadline, handled).await.is_err() {
                        run.session.finish(PickerOutcome::TimedOut);
                    }
                }
            }
        }

        drop(subscription);
        if let Some(reply) = run.reply.take() {
            if let Err(e) = self.chat.delete_message(reply).await {
                warn!("Failed to remove picker menu: {}", e);
            }
        }

        let outcome = run.session.take_outcome().unwrap_or(PickerOutcome::Cancelled);
        info!("Picker for user {} finished: {:?}", self.user_id, outcome);
        outcome
    }
}

/// State of one running picker
struct PickerRun<'a> {
    picker: &'a DrivePicker,
    session: NavigationSession,
    service: Option<Arc<dyn DriveService>>,
    reply: Option<MessageId>,
}

impl PickerRun<'_> {
    async fn start(&mut self, credential: Option<CredentialSource>) {
        match credential {
            Some(source) => {
                self.session
                    .set_available_credentials(source.is_owner(), !source.is_owner());
                self.session.use_credential(source);
                self.list_drives().await;
            }
            None => {
                let store = &self.picker.credentials;
                let owner = store.has_credential(CredentialSource::Owner).await;
                let user = store
                    .has_credential(CredentialSource::User(self.picker.user_id))
                    .await;
                self.session.set_available_credentials(owner, user);
                if !owner && !user {
                    self.session.finish(PickerOutcome::CredentialMissing);
                    return;
                }
                self.choose_credential().await;
            }
        }
    }

    /// Decode a payload; Cancel ends the session here
    fn accept(&mut self, data: &str) -> Option<PickerAction> {
        let action = match PickerAction::decode(data) {
            Ok(action) => action,
            Err(e) => {
                debug!("Ignoring callback: {}", e);
                return None;
            }
        };
        if action == PickerAction::Cancel {
            self.session.finish(PickerOutcome::Cancelled);
            return None;
        }
        Some(action)
    }

    async fn handle_event(&mut self, data: &str, subscription: &mut Subscription) {
        let Some(action) = self.accept(data) else {
            return;
        };
        if !self.session.try_begin() {
            debug!("Rejected {} while another action is rendering", action);
            return;
        }

        // only Cancel may interrupt a running action
        let cancelled = {
            let applying = self.apply(action);
            tokio::pin!(applying);
            loop {
                tokio::select! {
                    _ = &mut applying => break false,
                    event = subscription.recv() => match event {
                        Some(event) if !cancels_while_busy(&event.data) => continue,
                        _ => break true,
                    },
                }
            }
        };
        if cancelled {
            self.session.finish(PickerOutcome::Cancelled);
        }

        while let Some(event) = subscription.try_recv() {
            if cancels_while_busy(&event.data) {
                self.session.finish(PickerOutcome::Cancelled);
            }
        }
        self.session.end();
    }

    async fn apply(&mut self, action: PickerAction) {
        match action {
            PickerAction::Cancel => {
                self.session.finish(PickerOutcome::Cancelled);
            }
            PickerAction::PagePrev => {
                self.session.page_prev();
                self.show_items().await;
            }
            PickerAction::PageNext => {
                self.session.page_next();
                self.show_items().await;
            }
            PickerAction::BackToDrives => self.choose_credential().await,
            PickerAction::BackToParent => match self.session.back() {
                BackTarget::Parent => self.reload_items().await,
                BackTarget::Drives => self.list_drives().await,
                BackTarget::Credentials => self.choose_credential().await,
            },
            PickerAction::ChooseDrive(index) => {
                if self.session.choose_drive(index) {
                    self.reload_items().await;
                } else {
                    warn!("Drive index {} out of range", index);
                }
            }
            PickerAction::Select { kind, index } => match self.session.select(kind, index) {
                Selection::EnterFolder => self.reload_items().await,
                Selection::PickFile(id) => {
                    self.session.finish(PickerOutcome::Selected(id));
                }
                Selection::Invalid => warn!("Item index {} out of range", index),
            },
            PickerAction::SetPageStep(step) => {
                if self.session.set_page_step(step) {
                    self.show_items().await;
                }
            }
            PickerAction::JumpToRoot => {
                if self.session.jump_to_root() {
                    self.reload_items().await;
                }
            }
            PickerAction::SetItemType(item_type) => {
                if self.session.mode() == ListMode::Download {
                    self.session.set_item_type(item_type);
                    self.reload_items().await;
                }
            }
            PickerAction::ConfirmCurrent => {
                if self.session.current_id().is_empty() {
                    debug!("No folder open, ignoring {}", action);
                } else {
                    let id = self.session.tagged_id(self.session.current_id());
                    self.session.finish(PickerOutcome::Selected(id));
                }
            }
            PickerAction::SetAsDefault => self.set_as_default().await,
            PickerAction::UseOwnerCredential => self.switch_credential(CredentialSource::Owner).await,
            PickerAction::UseUserCredential => {
                self.switch_credential(CredentialSource::User(self.picker.user_id)).await
            }
        }
    }

    async fn switch_credential(&mut self, source: CredentialSource) {
        if !self.session.dual_credentials() {
            debug!("Credential menu not active, ignoring {}", source);
            return;
        }
        self.session.use_credential(source);
        self.list_drives().await;
    }

    async fn choose_credential(&mut self) {
        if self.session.dual_credentials() {
            let menu = self.session.credential_menu();
            self.send_menu(&menu).await;
            return;
        }
        let source = match self.session.credential() {
            Some(source) => source,
            None => CredentialSource::Owner,
        };
        let source = if self.picker.credentials.has_credential(source).await {
            source
        } else {
            CredentialSource::User(self.picker.user_id)
        };
        self.session.use_credential(source);
        self.list_drives().await;
    }

    async fn list_drives(&mut self) {
        let Some(source) = self.session.credential() else {
            self.session.finish(PickerOutcome::CredentialMissing);
            return;
        };
        let service = match self.picker.credentials.authorize(source).await {
            Ok(service) => service,
            Err(e) => return self.fail(e),
        };
        self.service = Some(service.clone());

        match service.list_drives().await {
            Err(e) => self.fail(e),
            Ok(drives) if drives.is_empty() => {
                self.session.enter_single_root();
                self.reload_items().await;
            }
            Ok(drives) => {
                self.session.set_drives(drives);
                let menu = self.session.drives_menu(&self.token_label());
                self.send_menu(&menu).await;
            }
        }
    }

    /// List the current folder, falling back to the other item type in
    /// download mode when nothing matches
    async fn reload_items(&mut self) {
        let Some(service) = self.service.clone() else {
            return self.fail(ProviderError::Other("Drive client not authorized".to_string()));
        };
        if self.session.mode() == ListMode::Upload {
            self.session.set_item_type(ItemType::Folders);
        }
        let folder_id = self.session.current_id().to_string();
        let item_type = self.session.item_type();

        let mut items = match service.list_folder(&folder_id, item_type).await {
            Ok(items) => items,
            Err(e) => return self.fail(e),
        };
        if self.session.is_finished() {
            return;
        }

        if items.is_empty() && self.session.mode() == ListMode::Download && item_type != ItemType::Both {
            let flipped = item_type.toggled();
            match service.list_folder(&folder_id, flipped).await {
                Ok(other) if !other.is_empty() => {
                    debug!("No {} in {}, showing {} instead", item_type, folder_id, flipped);
                    self.session.set_item_type(flipped);
                    items = other;
                }
                Ok(_) => {}
                Err(e) => return self.fail(e),
            }
        }

        self.session.set_items(items);
        self.show_items().await;
    }

    async fn set_as_default(&mut self) {
        if self.session.current_id().is_empty() {
            return;
        }
        let id = self.session.tagged_id(self.session.current_id());
        let user_id = self.picker.user_id;
        if self.picker.user_data.default_destination(user_id).await.as_deref() == Some(id.as_str()) {
            return;
        }
        if let Err(e) = self.picker.user_data.set_default_destination(user_id, &id).await {
            warn!("Failed to store default destination: {}", e);
        }
        self.show_items().await;
    }

    async fn show_items(&mut self) {
        let default_id = match self.picker.user_data.default_destination(self.picker.user_id).await {
            Some(id) => Some(id),
            None => self.picker.fallback_destination.clone(),
        };
        let label = self.token_label();
        let menu = self.session.items_menu(default_id.as_deref(), &label);
        self.send_menu(&menu).await;
    }

    fn token_label(&self) -> String {
        self.session
            .credential()
            .map(|source| self.picker.credentials.describe(source))
            .unwrap_or_default()
    }

    async fn send_menu(&mut self, menu: &Menu) {
        if self.session.is_finished() {
            return;
        }
        let chat = &self.picker.chat;
        match self.reply {
            None => match chat.send_menu(menu).await {
                Ok(id) => self.reply = Some(id),
                Err(e) => warn!("Failed to send picker menu: {}", e),
            },
            Some(id) => {
                if let Err(e) = chat.edit_menu(id, menu).await {
                    warn!("Failed to update picker menu: {}", e);
                }
            }
        }
    }

    fn fail(&mut self, err: ProviderError) {
        if let Some(attempts) = err.attempts() {
            info!("Total Attempts: {}", attempts);
        }
        self.session
            .finish(PickerOutcome::Failed(strip_angle_brackets(&err.to_string())));
    }
}

/// Inspect a press that arrived while an action was running; only Cancel counts
fn cancels_while_busy(data: &str) -> bool {
    match PickerAction::decode(data) {
        Ok(PickerAction::Cancel) => true,
        Ok(action) => {
            debug!("Rejected {} while another action is rendering", action);
            false
        }
        Err(e) => {
            debug!("Ignoring callback: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{CallbackEvent, ChatError};
    use crate::providers::{DriveEntry, DriveQuery, SharedDrive};
    use crate::user_data::{UserData, UserDataError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const USER: i64 = 77;

    #[derive(Default)]
    struct MockDrive {
        folders: HashMap<String, Vec<DriveEntry>>,
        drives: Vec<SharedDrive>,
        error: Option<String>,
        slow: HashMap<String, Duration>,
        calls: Mutex<Vec<(String, ItemType)>>,
    }

    impl MockDrive {
        fn calls(&self) -> Vec<(String, ItemType)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DriveService for MockDrive {
        async fn list_folder(&self, folder_id: &str, item_type: ItemType) -> Result<Vec<DriveEntry>, ProviderError> {
            self.calls.lock().unwrap().push((folder_id.to_string(), item_type));
            if let Some(delay) = self.slow.get(folder_id) {
                tokio::time::sleep(*delay).await;
            }
            if let Some(err) = &self.error {
                return Err(ProviderError::Other(err.clone()));
            }
            let entries = self.folders.get(folder_id).cloned().unwrap_or_default();
            Ok(entries
                .into_iter()
                .filter(|e| match item_type {
                    ItemType::Folders => e.is_folder(),
                    ItemType::Files => !e.is_folder(),
                    ItemType::Both => true,
                })
                .collect())
        }

        async fn list_drives(&self) -> Result<Vec<SharedDrive>, ProviderError> {
            Ok(self.drives.clone())
        }

        async fn query(&self, _query: &DriveQuery) -> Result<Vec<DriveEntry>, ProviderError> {
            Ok(Vec::new())
        }
    }

    struct MockCredentials {
        owner: bool,
        user: bool,
        drive: Arc<MockDrive>,
        authorized: Mutex<Vec<CredentialSource>>,
    }

    #[async_trait]
    impl CredentialStore for MockCredentials {
        async fn has_credential(&self, source: CredentialSource) -> bool {
            match source {
                CredentialSource::Owner => self.owner,
                CredentialSource::User(_) => self.user,
            }
        }

        fn describe(&self, source: CredentialSource) -> String {
            match source {
                CredentialSource::Owner => "token.json".to_string(),
                CredentialSource::User(id) => format!("tokens/{}.json", id),
            }
        }

        async fn authorize(&self, source: CredentialSource) -> Result<Arc<dyn DriveService>, ProviderError> {
            self.authorized.lock().unwrap().push(source);
            Ok(self.drive.clone())
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        menus: Mutex<Vec<Menu>>,
        deleted: AtomicUsize,
    }

    impl RecordingChat {
        fn count(&self) -> usize {
            self.menus.lock().unwrap().len()
        }

        fn last(&self) -> Menu {
            self.menus.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatSurface for RecordingChat {
        async fn send_menu(&self, menu: &Menu) -> Result<MessageId, ChatError> {
            self.menus.lock().unwrap().push(menu.clone());
            Ok(MessageId(1))
        }

        async fn edit_menu(&self, _message: MessageId, menu: &Menu) -> Result<(), ChatError> {
            self.menus.lock().unwrap().push(menu.clone());
            Ok(())
        }

        async fn delete_message(&self, _message: MessageId) -> Result<(), ChatError> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryUserData(Mutex<HashMap<i64, UserData>>);

    #[async_trait]
    impl UserDataStore for MemoryUserData {
        async fn get(&self, user_id: i64) -> UserData {
            self.0.lock().unwrap().get(&user_id).cloned().unwrap_or_default()
        }

        async fn set_default_destination(&self, user_id: i64, id: &str) -> Result<(), UserDataError> {
            self.0.lock().unwrap().entry(user_id).or_default().gdrive_id = Some(id.to_string());
            Ok(())
        }
    }

    struct Harness {
        router: CallbackRouter,
        chat: Arc<RecordingChat>,
        drive: Arc<MockDrive>,
        credentials: Arc<MockCredentials>,
        user_data: Arc<MemoryUserData>,
        handle: tokio::task::JoinHandle<PickerOutcome>,
    }

    impl Harness {
        fn start(drive: MockDrive, owner: bool, user: bool, mode: ListMode, timeout: Duration) -> Self {
            let drive = Arc::new(drive);
            let chat = Arc::new(RecordingChat::default());
            let credentials = Arc::new(MockCredentials {
                owner,
                user,
                drive: drive.clone(),
                authorized: Mutex::new(Vec::new()),
            });
            let user_data = Arc::new(MemoryUserData::default());
            let router = CallbackRouter::new();

            let picker = DrivePicker::new(USER, chat.clone(), credentials.clone(), user_data.clone())
                .with_timeout(timeout)
                .with_default_destination("0Aconfigured");
            let task_router = router.clone();
            let handle = tokio::spawn(async move { picker.run(&task_router, mode, None).await });

            Self { router, chat, drive, credentials, user_data, handle }
        }

        async fn wait_menus(&self, n: usize) {
            for _ in 0..400 {
                if self.chat.count() >= n {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("expected {} menus, saw {}", n, self.chat.count());
        }

        /// Press a button and wait for the menu it renders
        async fn press(&self, data: &str) {
            let before = self.chat.count();
            assert!(self.router.dispatch(CallbackEvent::new(USER, data)), "{} not routed", data);
            self.wait_menus(before + 1).await;
        }

        async fn finish(&mut self, data: &str) -> PickerOutcome {
            self.router.dispatch(CallbackEvent::new(USER, data));
            (&mut self.handle).await.unwrap()
        }
    }

    fn library() -> MockDrive {
        let mut folders = HashMap::new();
        folders.insert(
            "root".to_string(),
            vec![DriveEntry::folder("f-movies", "Movies"), DriveEntry::folder("f-docs", "Docs")],
        );
        folders.insert(
            "f-movies".to_string(),
            vec![
                DriveEntry::file("m10", "part10.mkv", "video/x-matroska", 2048),
                DriveEntry::file("m2", "part2.mkv", "video/x-matroska", 1024),
            ],
        );
        MockDrive { folders, ..Default::default() }
    }

    #[tokio::test]
    async fn test_pick_file_after_auto_fallback() {
        let mut h = Harness::start(library(), true, false, ListMode::Download, DEFAULT_TIMEOUT);
        h.wait_menus(1).await;
        let menu = h.chat.last();
        // Docs sorts before Movies
        assert!(menu.has_button("gdq pa fo 1"));
        assert!(menu.text.contains("Token Path: token.json"));

        h.press("gdq pa fo 1").await;
        let menu = h.chat.last();
        assert!(menu.text.contains("Item Type: files"));
        assert!(menu.text.contains("Current Path: <code>root/Movies</code>"));
        let labels: Vec<String> = menu.buttons().map(|b| b.text.clone()).collect();
        assert_eq!(labels[0], "[1KB] part2.mkv");
        assert_eq!(labels[1], "[2KB] part10.mkv");
        assert_eq!(
            h.drive.calls()[1..],
            [
                ("f-movies".to_string(), ItemType::Folders),
                ("f-movies".to_string(), ItemType::Files)
            ]
        );

        let outcome = h.finish("gdq pa fi 1").await;
        assert_eq!(outcome, PickerOutcome::Selected("m10".to_string()));
        assert_eq!(h.chat.deleted.load(Ordering::SeqCst), 1);
        assert!(!h.router.is_listening(USER));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let h = Harness::start(library(), true, false, ListMode::Download, Duration::from_millis(60));
        let outcome = h.handle.await.unwrap();
        assert_eq!(outcome, PickerOutcome::TimedOut);
        assert_eq!(outcome.into_message(), TIMED_OUT_MESSAGE);
        assert!(!h.router.is_listening(USER));
        assert_eq!(h.chat.deleted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let h = Harness::start(library(), false, false, ListMode::Upload, DEFAULT_TIMEOUT);
        let outcome = h.handle.await.unwrap();
        assert_eq!(outcome, PickerOutcome::CredentialMissing);
        assert_eq!(h.chat.count(), 0);
    }

    #[tokio::test]
    async fn test_dual_credentials_and_shared_drives() {
        let mut drive = library();
        drive.drives = vec![SharedDrive { id: "0Ateam".into(), name: "Team".into() }];
        drive.folders.insert("0Ateam".into(), vec![DriveEntry::folder("t1", "Shows")]);
        let mut h = Harness::start(drive, true, true, ListMode::Upload, DEFAULT_TIMEOUT);

        h.wait_menus(1).await;
        assert!(h.chat.last().text.starts_with("Choose Token:"));

        h.press("gdq user").await;
        let menu = h.chat.last();
        assert!(menu.text.starts_with("Choose Drive:"));
        assert!(menu.has_button("gdq dr 1"));
        assert!(menu.has_button("gdq back dr"));
        assert_eq!(*h.credentials.authorized.lock().unwrap(), vec![CredentialSource::User(USER)]);

        h.press("gdq dr 1").await;
        let menu = h.chat.last();
        assert!(menu.text.contains("Token Path: tokens/77.json"));
        assert!(menu.text.contains("Default Gdrive ID: 0Aconfigured"));
        assert!(menu.has_button("gdq back pa"));

        let outcome = h.finish("gdq cur").await;
        assert_eq!(outcome, PickerOutcome::Selected("mtp:0Ateam".to_string()));
    }

    #[tokio::test]
    async fn test_set_as_default_then_cancel() {
        let mut h = Harness::start(library(), true, false, ListMode::Upload, DEFAULT_TIMEOUT);
        h.wait_menus(1).await;

        h.press("gdq def").await;
        assert_eq!(h.user_data.get(USER).await.gdrive_id.as_deref(), Some("root"));
        assert!(h.chat.last().text.contains("Default Gdrive ID: root"));

        let outcome = h.finish("gdq cancel").await;
        assert_eq!(outcome, PickerOutcome::Cancelled);
        assert_eq!(h.chat.deleted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_ends_session() {
        let drive = MockDrive {
            error: Some("<HttpError 500 backendError>".to_string()),
            ..Default::default()
        };
        let h = Harness::start(drive, true, false, ListMode::Download, DEFAULT_TIMEOUT);
        let outcome = h.handle.await.unwrap();
        assert_eq!(outcome, PickerOutcome::Failed("HttpError 500 backendError".to_string()));
    }

    #[tokio::test]
    async fn test_overlapping_presses_are_rejected() {
        let mut drive = library();
        drive.folders.insert(
            "root".to_string(),
            (0..10).map(|i| DriveEntry::folder(&format!("f{}", i), &format!("dir{}", i))).collect(),
        );
        let mut h = Harness::start(drive, true, false, ListMode::Download, DEFAULT_TIMEOUT);
        h.wait_menus(1).await;
        let listings = h.drive.calls().len();

        // both queue before the picker task runs; the second arrives while busy
        assert!(h.router.dispatch(CallbackEvent::new(USER, "gdq nex")));
        assert!(h.router.dispatch(CallbackEvent::new(USER, "gdq pa fo 0")));
        h.wait_menus(2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.chat.count(), 2);
        assert_eq!(h.drive.calls().len(), listings);
        assert!(h.chat.last().text.contains("Page: 2/2"));

        let outcome = h.finish("gdq cancel").await;
        assert_eq!(outcome, PickerOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_listing() {
        let mut drive = library();
        drive.slow.insert("f-movies".to_string(), Duration::from_secs(3));
        let mut h = Harness::start(drive, true, false, ListMode::Download, DEFAULT_TIMEOUT);
        h.wait_menus(1).await;

        assert!(h.router.dispatch(CallbackEvent::new(USER, "gdq pa fo 1")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let pressed = std::time::Instant::now();

        let outcome = h.finish("gdq cancel").await;
        assert_eq!(outcome, PickerOutcome::Cancelled);
        assert!(pressed.elapsed() < Duration::from_secs(1), "cancel waited {:?}", pressed.elapsed());
        assert_eq!(h.chat.count(), 1);
        assert_eq!(h.chat.deleted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_buttons_render_expected_menus() {
        let mut drive = library();
        drive.drives = vec![SharedDrive { id: "0Ateam".into(), name: "Team".into() }];
        if let Some(root) = drive.folders.get_mut("root") {
            root.push(DriveEntry::file("r1", "readme.txt", "text/plain", 12));
        }
        let mut h = Harness::start(drive, true, true, ListMode::Download, DEFAULT_TIMEOUT);
        h.wait_menus(1).await;
        assert!(h.chat.last().text.starts_with("Choose Token:"));

        h.press("gdq owner").await;
        assert!(h.chat.last().has_button("gdq dr 1"));

        h.press("gdq dr 0").await;
        assert!(h.chat.last().has_button("gdq itype files"));

        h.press("gdq itype files").await;
        let menu = h.chat.last();
        assert!(menu.text.contains("Item Type: files"));
        assert!(menu.has_button("gdq pa fi 0"));
        assert!(menu.has_button("gdq itype folders"));
        assert_eq!(h.drive.calls().last(), Some(&("root".to_string(), ItemType::Files)));

        h.press("gdq itype folders").await;
        assert!(h.chat.last().has_button("gdq pa fo 1"));

        h.press("gdq pa fo 1").await;
        let menu = h.chat.last();
        assert!(menu.text.contains("Current Path: <code>root/Movies</code>"));
        assert!(menu.has_button("gdq root"));
        assert!(menu.has_button("gdq back pa"));

        h.press("gdq root").await;
        let menu = h.chat.last();
        assert!(menu.text.contains("Current Path: <code>root</code>"));
        assert!(!menu.has_button("gdq root"));
        assert_eq!(h.drive.calls().last(), Some(&("root".to_string(), ItemType::Files)));

        // drive root with more than one drive goes back to the drive list
        let listings = h.drive.calls().len();
        h.press("gdq back pa").await;
        assert!(h.chat.last().text.starts_with("Choose Drive:"));
        assert_eq!(h.drive.calls().len(), listings);

        h.press("gdq back dr").await;
        assert!(h.chat.last().text.starts_with("Choose Token:"));

        h.press("gdq user").await;
        assert!(h.chat.last().text.starts_with("Choose Drive:"));
        assert_eq!(
            *h.credentials.authorized.lock().unwrap(),
            vec![
                CredentialSource::Owner,
                CredentialSource::Owner,
                CredentialSource::User(USER)
            ]
        );

        let outcome = h.finish("gdq cancel").await;
        assert_eq!(outcome, PickerOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_confirm_without_open_folder_keeps_session() {
        let mut h = Harness::start(library(), true, true, ListMode::Upload, DEFAULT_TIMEOUT);
        h.wait_menus(1).await;

        assert!(h.router.dispatch(CallbackEvent::new(USER, "gdq cur")));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!h.handle.is_finished());
        assert_eq!(h.chat.count(), 1);

        h.press("gdq owner").await;
        let outcome = h.finish("gdq cur").await;
        assert_eq!(outcome, PickerOutcome::Selected("root".to_string()));
    }
}
