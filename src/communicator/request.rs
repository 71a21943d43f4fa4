//! Request descriptors and fan-out results.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use crate::dom::FrameElement;
use crate::error::{Error, Result};
use crate::transport::WindowHandle;

// ============================================================================
// MessageTarget
// ============================================================================

/// Destination of a request.
#[derive(Clone)]
pub enum MessageTarget {
    /// A frame element; its content window is resolved at send time.
    Frame(FrameElement),
    /// A window reference.
    Window(WindowHandle),
}

impl fmt::Debug for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(frame) => f.debug_tuple("Frame").field(frame).finish(),
            Self::Window(win) => f.debug_tuple("Window").field(&win.id()).finish(),
        }
    }
}

impl fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(frame) => write!(f, "frame {frame}"),
            Self::Window(win) => write!(f, "{}", win.id()),
        }
    }
}

impl From<FrameElement> for MessageTarget {
    fn from(frame: FrameElement) -> Self {
        Self::Frame(frame)
    }
}

impl From<WindowHandle> for MessageTarget {
    fn from(win: WindowHandle) -> Self {
        Self::Window(win)
    }
}

// ============================================================================
// MessageRequest
// ============================================================================

/// A command to send to one frame or window.
#[derive(Debug, Clone)]
pub struct MessageRequest {
    /// Command tag.
    pub command: String,
    /// Optional payload.
    pub message: Option<Value>,
    /// Destination.
    pub target: MessageTarget,
}

impl MessageRequest {
    /// Creates a request without payload.
    #[must_use]
    pub fn new(command: impl Into<String>, target: impl Into<MessageTarget>) -> Self {
        Self {
            command: command.into(),
            message: None,
            target: target.into(),
        }
    }

    /// Creates a request addressed to a frame element.
    #[inline]
    #[must_use]
    pub fn to_frame(command: impl Into<String>, frame: FrameElement) -> Self {
        Self::new(command, MessageTarget::Frame(frame))
    }

    /// Creates a request addressed to a window.
    #[inline]
    #[must_use]
    pub fn to_window(command: impl Into<String>, win: WindowHandle) -> Self {
        Self::new(command, MessageTarget::Window(win))
    }

    /// Sets the payload.
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: Value) -> Self {
        self.message = Some(message);
        self
    }
}

// ============================================================================
// SettledResult
// ============================================================================

/// Outcome of one request in a fan-out.
#[derive(Debug)]
pub enum SettledResult {
    /// The frame answered.
    Fulfilled(Option<Value>),
    /// The request failed or did not settle in time.
    Rejected(Error),
}

impl SettledResult {
    /// Returns `true` for [`SettledResult::Fulfilled`].
    #[inline]
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Returns `true` for [`SettledResult::Rejected`].
    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Converts back into a `Result`.
    #[inline]
    pub fn into_result(self) -> Result<Option<Value>> {
        match self {
            Self::Fulfilled(value) => Ok(value),
            Self::Rejected(error) => Err(error),
        }
    }
}

impl From<Result<Option<Value>>> for SettledResult {
    fn from(result: Result<Option<Value>>) -> Self {
        match result {
            Ok(value) => Self::Fulfilled(value),
            Err(error) => Self::Rejected(error),
        }
    }
}
