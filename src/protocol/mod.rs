//! Cross-frame protocol message types.
//!
//! This module defines the envelope exchanged between browsing contexts,
//! the marshaller that signs and filters envelopes, and the typed command
//! catalogue.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | Request envelope | Sender → Frame | Command with fresh `messageId` |
//! | Response envelope | Frame → Sender | Answer reusing the request `messageId` |
//! | Error envelope | Frame → Sender | `error` instead of `message` |
//!
//! Every request is preceded by an `insights.ping` round trip.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Typed command definitions |
//! | `envelope` | Envelope and error content types |
//! | `marshaller` | Envelope construction and authenticity filtering |

// ============================================================================
// Submodules
// ============================================================================

/// Typed command definitions.
pub mod command;

/// Envelope and error content types.
pub mod envelope;

/// Envelope construction, parsing, and authenticity filtering.
pub mod marshaller;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Dispose, ElementReport, FindElementByPath, FindElementByPosition, FrameCommand, PathMessage,
    Ping, PositionMessage, ReportElementPath,
};
pub use envelope::{ErrorMessageContent, MESSAGE_STABLE_SIGNATURE, MessageContent, WindowMessage};
pub use marshaller::{AppIdentity, IdGenerator, WindowMessageMarshaller};
