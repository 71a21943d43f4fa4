//! In-process browsing contexts.
//!
//! [`LocalWindow`] stands in for a real window or frame: it owns an inbox
//! and an event loop task that hands each posted event, in arrival order,
//! to every registered message listener. Windows share nothing but the
//! events posted between them.
//!
//! # Event Loop
//!
//! ```text
//! post_message ──► inbox (mpsc) ──► event loop task ──► listeners
//! ```
//!
//! Windows must be created inside a tokio runtime.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, WindowId};

use super::window::{
    MessageEvent, MessageListener, MessageWindow, WILDCARD_ORIGIN, WindowHandle, WindowUtils,
};

// ============================================================================
// Constants
// ============================================================================

/// Origin given to windows created without one.
const DEFAULT_ORIGIN: &str = "https://localhost";

// ============================================================================
// Types
// ============================================================================

/// Registered listeners in registration order.
type ListenerList = Vec<(ListenerId, MessageListener)>;

/// Sending half of a window inbox.
type InboxSender = mpsc::UnboundedSender<MessageEvent>;

// ============================================================================
// LocalWindow
// ============================================================================

/// An in-process browsing context.
pub struct LocalWindow {
    id: WindowId,
    name: String,
    origin: String,
    parent: Option<Weak<LocalWindow>>,
    this: Weak<LocalWindow>,
    inbox: Mutex<Option<InboxSender>>,
    listeners: Arc<Mutex<ListenerList>>,
}

impl fmt::Debug for LocalWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWindow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl LocalWindow {
    /// Creates a top-level window.
    #[must_use]
    pub fn top(name: impl Into<String>) -> Arc<Self> {
        Self::spawn(name.into(), DEFAULT_ORIGIN.to_string(), None)
    }

    /// Creates a window embedded in `parent`.
    #[must_use]
    pub fn child(name: impl Into<String>, parent: &Arc<LocalWindow>) -> Arc<Self> {
        Self::spawn(
            name.into(),
            parent.origin.clone(),
            Some(Arc::downgrade(parent)),
        )
    }

    /// Creates a window embedded in `parent` with its own origin.
    #[must_use]
    pub fn child_with_origin(
        name: impl Into<String>,
        origin: impl Into<String>,
        parent: &Arc<LocalWindow>,
    ) -> Arc<Self> {
        Self::spawn(name.into(), origin.into(), Some(Arc::downgrade(parent)))
    }

    fn spawn(name: String, origin: String, parent: Option<Weak<LocalWindow>>) -> Arc<Self> {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let listeners: Arc<Mutex<ListenerList>> = Arc::new(Mutex::new(Vec::new()));

        let window = Arc::new_cyclic(|this| Self {
            id: WindowId::next(),
            name,
            origin,
            parent,
            this: this.clone(),
            inbox: Mutex::new(Some(inbox_tx)),
            listeners: Arc::clone(&listeners),
        });

        tokio::spawn(Self::run_event_loop(window.id, inbox_rx, listeners));
        debug!(window = %window.id, name = %window.name, "Window created");

        window
    }

    /// Window name given at creation.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Window origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns this window as a generic handle.
    #[must_use]
    pub fn handle(self: &Arc<Self>) -> WindowHandle {
        Arc::clone(self) as WindowHandle
    }

    /// Number of registered message listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inbox.lock().is_none()
    }

    /// Stops the event loop. Later posts to this window fail.
    pub fn close(&self) {
        if self.inbox.lock().take().is_some() {
            debug!(window = %self.id, "Window closed");
        }
    }

    /// Delivers events to listeners until the inbox closes.
    async fn run_event_loop(
        id: WindowId,
        mut inbox_rx: mpsc::UnboundedReceiver<MessageEvent>,
        listeners: Arc<Mutex<ListenerList>>,
    ) {
        while let Some(event) = inbox_rx.recv().await {
            // Snapshot so listeners may add or remove listeners re-entrantly.
            let snapshot: Vec<MessageListener> = listeners
                .lock()
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();

            trace!(window = %id, listeners = snapshot.len(), "Dispatching event");
            for listener in snapshot {
                listener(&event);
            }
        }

        debug!(window = %id, "Event loop terminated");
    }
}

impl MessageWindow for LocalWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn deliver(&self, event: MessageEvent, target_origin: &str) -> Result<()> {
        if target_origin != WILDCARD_ORIGIN && target_origin != self.origin {
            trace!(window = %self.id, target_origin, "Dropping event for other origin");
            return Ok(());
        }

        let inbox = self.inbox.lock();
        let sender = inbox.as_ref().ok_or_else(|| Error::window_closed(self.id))?;
        sender
            .send(event)
            .map_err(|_| Error::window_closed(self.id))
    }
}

impl WindowUtils for LocalWindow {
    fn current_window(&self) -> WindowHandle {
        match self.this.upgrade() {
            Some(this) => this as WindowHandle,
            // Windows only exist behind the Arc built in `spawn`.
            None => unreachable!("LocalWindow used after drop"),
        }
    }

    fn parent_window(&self) -> Option<WindowHandle> {
        self.parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|parent| parent as WindowHandle)
    }

    fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.lock().push((id, listener));
        trace!(window = %self.id, listener = %id, "Listener added");
        id
    }

    fn remove_message_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    use crate::transport::window::same_window;

    fn forwarding_listener(tx: mpsc::UnboundedSender<MessageEvent>) -> MessageListener {
        Arc::new(move |event: &MessageEvent| {
            let _ = tx.send(event.clone());
        })
    }

    #[tokio::test]
    async fn test_post_reaches_listener_with_source() {
        let top = LocalWindow::top("top");
        let child = LocalWindow::child("child", &top);
        let (tx, mut rx) = mpsc::unbounded_channel();
        child.add_message_listener(forwarding_listener(tx));

        top.post_message(&child.handle(), "hello".into(), "*")
            .expect("post");

        let event = rx.recv().await.expect("event");
        assert_eq!(event.data, Value::String("hello".into()));
        let source = event.source.expect("source");
        assert!(same_window(&source, &top.handle()));
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let win = LocalWindow::top("top");
        let (tx, mut rx) = mpsc::unbounded_channel();
        win.add_message_listener(forwarding_listener(tx));

        for i in 0..10 {
            win.deliver(
                MessageEvent {
                    data: json!(i),
                    source: None,
                },
                "*",
            )
            .expect("deliver");
        }

        for i in 0..10 {
            assert_eq!(rx.recv().await.expect("event").data, json!(i));
        }
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let win = LocalWindow::top("top");
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = win.add_message_listener(forwarding_listener(tx));

        assert_eq!(win.listener_count(), 1);
        assert!(win.remove_message_listener(id));
        assert!(!win.remove_message_listener(id));
        assert_eq!(win.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_parent_and_top() {
        let top = LocalWindow::top("top");
        let child = LocalWindow::child("child", &top);

        assert!(top.is_top_window());
        assert!(!child.is_top_window());
        let parent = child.parent_window().expect("parent");
        assert!(same_window(&parent, &top.handle()));
    }

    #[tokio::test]
    async fn test_post_to_closed_window_fails() {
        let top = LocalWindow::top("top");
        let child = LocalWindow::child("child", &top);
        child.close();

        assert!(child.is_closed());
        let result = top.post_message(&child.handle(), "x".into(), "*");
        assert!(matches!(result, Err(Error::WindowClosed { .. })));
    }

    #[tokio::test]
    async fn test_mismatched_target_origin_is_dropped() {
        let top = LocalWindow::top("top");
        let child = LocalWindow::child_with_origin("ad", "https://ads.example", &top);
        let (tx, mut rx) = mpsc::unbounded_channel();
        child.add_message_listener(forwarding_listener(tx));

        top.post_message(&child.handle(), "dropped".into(), "https://other.example")
            .expect("post");
        top.post_message(&child.handle(), "kept".into(), "https://ads.example")
            .expect("post");

        let event = rx.recv().await.expect("event");
        assert_eq!(event.data, json!("kept"));
    }
}
