//! Chat platform seam
//!
//! Outbound menus (text plus a button grid), the `ChatSurface` trait the
//! picker renders through, and a router that hands `gdq`-tagged callback
//! events to the picker waiting for that user.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// First token of every picker callback payload
pub const CALLBACK_NAMESPACE: &str = "gdq";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message not found: {0}")]
    MessageNotFound(u64),
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Identifier of a message sent through a `ChatSurface`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

/// A message body with an inline keyboard
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Menu {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl Menu {
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.keyboard.iter().flatten()
    }

    pub fn has_button(&self, callback_data: &str) -> bool {
        self.buttons().any(|b| b.callback_data == callback_data)
    }
}

/// Collects body, header and footer buttons and lays them out in rows
#[derive(Debug, Default)]
pub struct MenuBuilder {
    header: Vec<Button>,
    body: Vec<Button>,
    footer: Vec<Button>,
}

impl MenuBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn make(text: impl Into<String>, callback_data: impl Into<String>) -> Button {
        Button {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }

    pub fn button(&mut self, text: impl Into<String>, callback_data: impl Into<String>) -> &mut Self {
        self.body.push(Self::make(text, callback_data));
        self
    }

    pub fn header(&mut self, text: impl Into<String>, callback_data: impl Into<String>) -> &mut Self {
        self.header.push(Self::make(text, callback_data));
        self
    }

    pub fn footer(&mut self, text: impl Into<String>, callback_data: impl Into<String>) -> &mut Self {
        self.footer.push(Self::make(text, callback_data));
        self
    }

    /// Header rows first, then body, then footer; each wrapped at its column count
    pub fn build(self, text: impl Into<String>, body_cols: usize, header_cols: usize, footer_cols: usize) -> Menu {
        let mut keyboard = Vec::new();
        for (buttons, cols) in [
            (self.header, header_cols),
            (self.body, body_cols),
            (self.footer, footer_cols),
        ] {
            let cols = cols.max(1);
            let mut row = Vec::with_capacity(cols);
            for button in buttons {
                row.push(button);
                if row.len() == cols {
                    keyboard.push(std::mem::take(&mut row));
                }
            }
            if !row.is_empty() {
                keyboard.push(row);
            }
        }
        Menu {
            text: text.into(),
            keyboard,
        }
    }
}

/// Where the picker renders its menus
#[async_trait]
pub trait ChatSurface: Send + Sync {
    async fn send_menu(&self, menu: &Menu) -> Result<MessageId, ChatError>;

    async fn edit_menu(&self, message: MessageId, menu: &Menu) -> Result<(), ChatError>;

    async fn delete_message(&self, message: MessageId) -> Result<(), ChatError>;
}

/// A button press delivered by the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub user_id: i64,
    pub data: String,
}

impl CallbackEvent {
    pub fn new(user_id: i64, data: impl Into<String>) -> Self {
        Self {
            user_id,
            data: data.into(),
        }
    }
}

type Listeners = HashMap<i64, (u64, mpsc::UnboundedSender<CallbackEvent>)>;

/// Routes picker callbacks to the subscription registered for the user
#[derive(Clone, Default)]
pub struct CallbackRouter {
    listeners: Arc<Mutex<Listeners>>,
    next_token: Arc<AtomicU64>,
}

impl CallbackRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a listener for `user_id`, replacing any previous one
    pub fn subscribe(&self, user_id: i64) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(user_id, (token, tx));
        Subscription {
            user_id,
            token,
            rx,
            router: self.clone(),
        }
    }

    /// Deliver an event; returns false when it is not a picker event or
    /// nobody is listening for the user
    pub fn dispatch(&self, event: CallbackEvent) -> bool {
        if event.data.split_whitespace().next() != Some(CALLBACK_NAMESPACE) {
            return false;
        }
        let listeners = self.lock();
        match listeners.get(&event.user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => {
                debug!("No picker listening for user {}", event.user_id);
                false
            }
        }
    }

    pub fn is_listening(&self, user_id: i64) -> bool {
        self.lock().contains_key(&user_id)
    }
}

/// Inbound events for one user; unregisters itself when dropped
pub struct Subscription {
    user_id: i64,
    token: u64,
    rx: mpsc::UnboundedReceiver<CallbackEvent>,
    router: CallbackRouter,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<CallbackEvent> {
        self.rx.recv().await
    }

    /// Next event already queued, without waiting
    pub fn try_recv(&mut self) -> Option<CallbackEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut listeners = self.router.lock();
        if listeners.get(&self.user_id).map(|(t, _)| *t) == Some(self.token) {
            listeners.remove(&self.user_id);
        }
    }
}

/// Prints menus to stdout; used by the CLI
#[derive(Default)]
pub struct ConsoleChat {
    next_id: AtomicU64,
    last_buttons: Mutex<Vec<String>>,
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a typed button number to its payload; anything else is taken as a raw payload
    pub fn resolve_input(&self, input: &str) -> String {
        let input = input.trim();
        let buttons = self.last_buttons.lock().unwrap_or_else(|e| e.into_inner());
        input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| buttons.get(i).cloned())
            .unwrap_or_else(|| input.to_string())
    }

    fn print(&self, menu: &Menu) {
        let mut buttons = self.last_buttons.lock().unwrap_or_else(|e| e.into_inner());
        buttons.clear();
        println!("\n{}\n", menu.text);
        for row in &menu.keyboard {
            let cells: Vec<String> = row
                .iter()
                .map(|b| {
                    buttons.push(b.callback_data.clone());
                    format!("[{}] {}", buttons.len(), b.text)
                })
                .collect();
            println!("  {}", cells.join("   "));
        }
    }
}

#[async_trait]
impl ChatSurface for ConsoleChat {
    async fn send_menu(&self, menu: &Menu) -> Result<MessageId, ChatError> {
        self.print(menu);
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn edit_menu(&self, _message: MessageId, menu: &Menu) -> Result<(), ChatError> {
        self.print(menu);
        Ok(())
    }

    async fn delete_message(&self, _message: MessageId) -> Result<(), ChatError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_builder_layout() {
        let mut builder = MenuBuilder::new();
        for i in 0..3 {
            builder.button(format!("item {}", i), format!("gdq pa fo {}", i));
        }
        builder.header("1", "gdq ps 1").header("2", "gdq ps 2");
        builder.footer("Previous", "gdq pre").footer("Next", "gdq nex").footer("Cancel", "gdq cancel");
        let menu = builder.build("Choose Path:", 1, 8, 2);

        let widths: Vec<usize> = menu.keyboard.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![2, 1, 1, 1, 2, 1]);
        assert_eq!(menu.keyboard[0][0].callback_data, "gdq ps 1");
        assert!(menu.has_button("gdq cancel"));
        assert_eq!(menu.buttons().count(), 8);
    }

    #[tokio::test]
    async fn test_router_routes_namespace_only() {
        let router = CallbackRouter::new();
        let mut sub = router.subscribe(10);

        assert!(!router.dispatch(CallbackEvent::new(10, "other cancel")));
        assert!(!router.dispatch(CallbackEvent::new(11, "gdq cancel")));
        assert!(router.dispatch(CallbackEvent::new(10, "gdq nex")));

        assert_eq!(sub.recv().await.unwrap().data, "gdq nex");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_subscription_unregisters_on_drop() {
        let router = CallbackRouter::new();
        let first = router.subscribe(3);
        let second = router.subscribe(3);
        drop(first);
        assert!(router.is_listening(3));
        drop(second);
        assert!(!router.is_listening(3));
    }

    #[tokio::test]
    async fn test_console_resolves_button_numbers() {
        let chat = ConsoleChat::new();
        let mut builder = MenuBuilder::new();
        builder.button("a", "gdq pa fo 0").footer("Cancel", "gdq cancel");
        chat.send_menu(&builder.build("t", 1, 8, 2)).await.unwrap();

        assert_eq!(chat.resolve_input("2"), "gdq cancel");
        assert_eq!(chat.resolve_input("gdq cur"), "gdq cur");
        assert_eq!(chat.resolve_input("9"), "9");
    }
}
