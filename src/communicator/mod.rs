//! Frame communicator.
//!
//! Builds ping-gated request/response, typed command handlers, and
//! fan-out on top of [`WindowMessageHandler`](crate::transport::WindowMessageHandler).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`FrameCommunicator`] and [`CommandHandler`] |
//! | `options` | [`CommunicatorOptions`] |
//! | `request` | [`MessageRequest`], [`MessageTarget`], [`SettledResult`] |

// ============================================================================
// Submodules
// ============================================================================

/// Communicator implementation.
pub mod core;

/// Timeouts and limits.
pub mod options;

/// Request descriptors and fan-out results.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{
    CommandHandler, DISPOSE_COMMAND, FrameCommunicator, PING_COMMAND, WeakFrameCommunicator,
};
pub use options::{
    CommunicatorOptions, DEFAULT_DISPOSE_TIMEOUT, DEFAULT_MAX_FRAME_DEPTH, DEFAULT_PING_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use request::{MessageRequest, MessageTarget, SettledResult};
