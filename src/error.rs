//! Error types for frame messaging.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use frame_messenger::{Result, Error};
//!
//! async fn example(communicator: &FrameCommunicator, frame: FrameElement) -> Result<()> {
//!     let request = MessageRequest::to_frame("my.command", frame);
//!     communicator.send_message(request).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Manifest`] |
//! | Destination | [`Error::WindowNotFound`], [`Error::SandboxedFrame`], [`Error::WindowClosed`] |
//! | Timing | [`Error::CannotConnect`], [`Error::RequestTimeout`], [`Error::Timeout`] |
//! | Remote | [`Error::Remote`] |
//! | Lookup | [`Error::ElementNotFound`], [`Error::FrameNotFound`], [`Error::InvalidPath`], [`Error::FrameDepthExceeded`] |
//! | Handler | [`Error::TooManyPending`], [`Error::NotInitialized`], [`Error::InvalidArgument`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::{MessageId, WindowId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when communicator options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Application manifest could not be read.
    #[error("Manifest error: {message}")]
    Manifest {
        /// Description of the manifest problem.
        message: String,
    },

    // ========================================================================
    // Destination Errors
    // ========================================================================
    /// No window could be resolved for the request target.
    #[error("Cannot get content window for {target}")]
    WindowNotFound {
        /// Description of the target.
        target: String,
    },

    /// Target frame is sandboxed without `allow-scripts`.
    ///
    /// Scripting is impossible in such a frame, so no message to it will
    /// ever be answered.
    #[error("Cannot connect to sandboxed frame {frame}")]
    SandboxedFrame {
        /// Description of the frame.
        frame: String,
    },

    /// Window no longer accepts messages.
    #[error("Window closed: {window}")]
    WindowClosed {
        /// The closed window.
        window: WindowId,
    },

    // ========================================================================
    // Timing Errors
    // ========================================================================
    /// Liveness ping was not acknowledged in time.
    #[error("Cannot connect to {target}: no ping response after {timeout_ms}ms")]
    CannotConnect {
        /// Description of the target.
        target: String,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    /// Request was not answered within the overall budget.
    #[error("Request {message_id} ({command}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Id of the unanswered request, if it was posted.
        message_id: MessageId,
        /// Command of the request.
        command: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// Peer answered with an error envelope.
    #[error("{name}: {message}")]
    Remote {
        /// Error name reported by the peer.
        name: String,
        /// Error message reported by the peer.
        message: String,
        /// Stack text reported by the peer (informational only).
        stack: String,
    },

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// Selector matched nothing.
    #[error("Element not found: selector={selector}")]
    ElementNotFound {
        /// Selector that matched nothing.
        selector: String,
    },

    /// No iframe in this document hosts the given window.
    #[error("Frame not found for {window}")]
    FrameNotFound {
        /// Window whose hosting frame was looked up.
        window: WindowId,
    },

    /// Path continues past an element that is not an iframe.
    #[error("Invalid path: {message}")]
    InvalidPath {
        /// Description of the path problem.
        message: String,
    },

    /// Frame recursion went deeper than allowed.
    #[error("Frame depth {depth} exceeds maximum {max}")]
    FrameDepthExceeded {
        /// Depth that was reached.
        depth: u32,
        /// Configured maximum.
        max: u32,
    },

    // ========================================================================
    // Handler Errors
    // ========================================================================
    /// Pending-callback table is full.
    #[error("Too many pending requests: {pending}/{max}")]
    TooManyPending {
        /// Current table size.
        pending: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Communicator used before `initialize()`.
    #[error("Not initialized: {component}")]
    NotInitialized {
        /// Component that was not initialized.
        component: &'static str,
    },

    /// Invalid argument.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response channel dropped before an answer arrived.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a manifest error.
    #[inline]
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Creates a window not found error.
    #[inline]
    pub fn window_not_found(target: impl Into<String>) -> Self {
        Self::WindowNotFound {
            target: target.into(),
        }
    }

    /// Creates a sandboxed frame error.
    #[inline]
    pub fn sandboxed_frame(frame: impl Into<String>) -> Self {
        Self::SandboxedFrame {
            frame: frame.into(),
        }
    }

    /// Creates a cannot connect (ping timeout) error.
    #[inline]
    pub fn cannot_connect(target: impl Into<String>, timeout_ms: u64) -> Self {
        Self::CannotConnect {
            target: target.into(),
            timeout_ms,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(
        message_id: MessageId,
        command: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self::RequestTimeout {
            message_id,
            command: command.into(),
            timeout_ms,
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(
        name: impl Into<String>,
        message: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self::Remote {
            name: name.into(),
            message: message.into(),
            stack: stack.into(),
        }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates a frame not found error.
    #[inline]
    pub fn frame_not_found(window: WindowId) -> Self {
        Self::FrameNotFound { window }
    }

    /// Creates an invalid path error.
    #[inline]
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Creates a frame depth exceeded error.
    #[inline]
    pub fn frame_depth_exceeded(depth: u32, max: u32) -> Self {
        Self::FrameDepthExceeded { depth, max }
    }

    /// Creates a too many pending error.
    #[inline]
    pub fn too_many_pending(pending: usize, max: usize) -> Self {
        Self::TooManyPending { pending, max }
    }

    /// Creates a window closed error.
    #[inline]
    pub fn window_closed(window: WindowId) -> Self {
        Self::WindowClosed { window }
    }

    /// Creates a not initialized error.
    #[inline]
    pub fn not_initialized(component: &'static str) -> Self {
        Self::NotInitialized { component }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Accessors
// ============================================================================

impl Error {
    /// Returns the variant name, used as the `name` of an error envelope.
    ///
    /// A [`Error::Remote`] reports the name it was received with, so an
    /// error relayed through several frames keeps its original name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Config { .. } => "Config",
            Self::Manifest { .. } => "Manifest",
            Self::WindowNotFound { .. } => "WindowNotFound",
            Self::SandboxedFrame { .. } => "SandboxedFrame",
            Self::WindowClosed { .. } => "WindowClosed",
            Self::CannotConnect { .. } => "CannotConnect",
            Self::RequestTimeout { .. } => "RequestTimeout",
            Self::Timeout { .. } => "Timeout",
            Self::Remote { name, .. } => name,
            Self::ElementNotFound { .. } => "ElementNotFound",
            Self::FrameNotFound { .. } => "FrameNotFound",
            Self::InvalidPath { .. } => "InvalidPath",
            Self::FrameDepthExceeded { .. } => "FrameDepthExceeded",
            Self::TooManyPending { .. } => "TooManyPending",
            Self::NotInitialized { .. } => "NotInitialized",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::Io(_) => "Io",
            Self::Json(_) => "Json",
            Self::ChannelClosed(_) => "ChannelClosed",
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::CannotConnect { .. } | Self::Timeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the destination could not be reached at all.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::WindowNotFound { .. }
                | Self::SandboxedFrame { .. }
                | Self::CannotConnect { .. }
                | Self::WindowClosed { .. }
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed if the caller reissues the request.
    /// Nothing in this crate retries on its own.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CannotConnect { .. }
                | Self::Timeout { .. }
                | Self::RequestTimeout { .. }
                | Self::TooManyPending { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
