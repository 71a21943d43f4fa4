//! Window and message-channel abstractions.
//!
//! These traits are the only surface the protocol needs from a host
//! environment: something that can receive a posted string, and a
//! per-context set of primitives to listen on and post to the channel.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::identifiers::{ListenerId, WindowId};

// ============================================================================
// Constants
// ============================================================================

/// Target origin used for every post (any origin).
pub const WILDCARD_ORIGIN: &str = "*";

// ============================================================================
// MessageWindow
// ============================================================================

/// A browsing context that messages can be posted to.
pub trait MessageWindow: Send + Sync + fmt::Debug {
    /// Identity of the context.
    fn id(&self) -> WindowId;

    /// Queues an event for delivery to the context's listeners.
    ///
    /// Events whose `target_origin` matches neither `"*"` nor the
    /// context's own origin are dropped without error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WindowClosed`] if the context is gone.
    fn deliver(&self, event: MessageEvent, target_origin: &str) -> Result<()>;
}

/// Shared reference to a browsing context.
pub type WindowHandle = Arc<dyn MessageWindow>;

/// Returns `true` if both handles refer to the same context.
#[inline]
#[must_use]
pub fn same_window(a: &WindowHandle, b: &WindowHandle) -> bool {
    a.id() == b.id()
}

// ============================================================================
// MessageEvent
// ============================================================================

/// A native message event as seen by a listener.
#[derive(Clone)]
pub struct MessageEvent {
    /// Posted data. Protocol envelopes are always strings.
    pub data: Value,

    /// Posting context, if known.
    pub source: Option<WindowHandle>,
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("data", &self.data)
            .field("source", &self.source.as_ref().map(|s| s.id()))
            .finish()
    }
}

// ============================================================================
// WindowUtils
// ============================================================================

/// Native message listener.
pub type MessageListener = Arc<dyn Fn(&MessageEvent) + Send + Sync>;

/// Channel primitives of one browsing context.
pub trait WindowUtils: Send + Sync {
    /// The context these primitives belong to.
    fn current_window(&self) -> WindowHandle;

    /// The embedding context, or `None` for a top window.
    fn parent_window(&self) -> Option<WindowHandle>;

    /// Returns `true` if this context is not embedded in another.
    fn is_top_window(&self) -> bool {
        self.parent_window().is_none()
    }

    /// Registers a listener for incoming message events.
    fn add_message_listener(&self, listener: MessageListener) -> ListenerId;

    /// Unregisters a listener. Returns `false` if it was not registered.
    fn remove_message_listener(&self, id: ListenerId) -> bool;

    /// Posts string data to `target`, with this context as the source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WindowClosed`] if `target` is gone.
    fn post_message(&self, target: &WindowHandle, data: String, target_origin: &str) -> Result<()> {
        let event = MessageEvent {
            data: Value::String(data),
            source: Some(self.current_window()),
        };
        target.deliver(event, target_origin)
    }
}
