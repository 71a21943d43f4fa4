//! Cross-document message channel.
//!
//! This module abstracts the `postMessage`-style primitive that is the only
//! link between browsing contexts, and hosts the per-context handler that
//! correlates requests with responses.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                        ┌──────────────────────┐
//! │  Top window          │                        │  Frame window        │
//! │                      │     post_message       │                      │
//! │  WindowMessageHandler│───────────────────────►│  WindowMessageHandler│
//! │   pending table      │◄───────────────────────│   subscriber table   │
//! │                      │   response (same id)   │                      │
//! └──────────────────────┘                        └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `window` | Channel traits and event type |
//! | `local` | In-process windows backed by tokio channels |
//! | `handler` | Listener, pending and subscriber tables |

// ============================================================================
// Submodules
// ============================================================================

/// Listener plus pending and subscriber tables of one context.
pub mod handler;

/// In-process windows.
pub mod local;

/// Channel traits and event type.
pub mod window;

// ============================================================================
// Re-exports
// ============================================================================

pub use handler::{
    CallbackResult, DEFAULT_MAX_PENDING, FrameMessageCallback, IncomingMessage, Responder,
    ResponseCallback, WindowMessageHandler,
};
pub use local::LocalWindow;
pub use window::{
    MessageEvent, MessageListener, MessageWindow, WILDCARD_ORIGIN, WindowHandle, WindowUtils,
    same_window,
};
