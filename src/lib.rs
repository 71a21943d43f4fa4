//! Frame Messenger - request/response messaging across nested frames.
//!
//! Code running in one browsing context coordinates with code running in
//! arbitrarily nested, isolated child contexts. The only link between
//! contexts is a `postMessage`-style primitive: fire a string at a target
//! window. This crate layers correlation, liveness checks, timeouts, and
//! typed commands on top of it.
//!
//! # Architecture
//!
//! Each context owns its own stack; contexts share nothing but the channel:
//!
//! - **Marshaller**: signs envelopes and drops foreign traffic
//! - **Window Message Handler**: one listener per context, pending and
//!   subscriber tables
//! - **Frame Communicator**: ping-gated requests, fan-out, recursive dispose
//! - **Finders**: path, position, and upward report resolution across frames
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frame_messenger::dom::{Document, Element, FrameElement};
//! use frame_messenger::{
//!     AppIdentity, FrameCommunicator, LocalWindow, MessageRequest, Result,
//!     WindowMessageHandler, WindowMessageMarshaller, WindowUtils,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let marshaller = WindowMessageMarshaller::new(AppIdentity::new("my-app", "1.0.0"));
//!
//!     // Top window hosting one iframe
//!     let top = LocalWindow::top("top");
//!     let child = LocalWindow::child("child", &top);
//!     let iframe = Element::builder("iframe").content_window(child.handle()).build();
//!     let doc = Arc::new(Document::with_elements([iframe.clone()]));
//!
//!     let top_comm = FrameCommunicator::new(
//!         WindowMessageHandler::new(top.clone() as Arc<dyn WindowUtils>, marshaller.clone()),
//!         doc,
//!     );
//!     let child_comm = FrameCommunicator::new(
//!         WindowMessageHandler::new(child.clone() as Arc<dyn WindowUtils>, marshaller),
//!         Arc::new(Document::new()),
//!     );
//!     top_comm.initialize();
//!     child_comm.initialize();
//!
//!     let frame = FrameElement::try_from(iframe)?;
//!     let echoed = top_comm
//!         .send_message(MessageRequest::to_frame("insights.ping", frame))
//!         .await?;
//!     println!("frame answered: {echoed:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`communicator`] | [`FrameCommunicator`], options, request types |
//! | [`dom`] | Element model and document queries |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`finder`] | Path, position, and frame finders |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Envelope, marshaller, typed commands |
//! | [`transport`] | Channel traits, local windows, message handler |

// ============================================================================
// Modules
// ============================================================================

/// Frame communicator.
///
/// Ping-gated request/response, typed command handlers, fan-out and
/// recursive dispose.
pub mod communicator;

/// Document model.
///
/// [`dom::HtmlElementUtils`] is the query surface; [`dom::Document`] is an
/// in-memory implementation.
pub mod dom;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Frame-aware element finders.
pub mod finder;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Envelope, marshaller, and typed command definitions.
pub mod protocol;

/// Cross-document message channel.
///
/// Channel traits, in-process windows, and the per-context message handler.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Communicator types
pub use communicator::{
    CommandHandler, CommunicatorOptions, DISPOSE_COMMAND, FrameCommunicator, MessageRequest,
    MessageTarget, PING_COMMAND, SettledResult, WeakFrameCommunicator,
};

// Finder types
pub use finder::{ElementFinderByPath, ElementFinderByPosition, FrameFinder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerId, MessageId, WindowId};

// Protocol types
pub use protocol::{
    AppIdentity, ErrorMessageContent, FrameCommand, MessageContent, WindowMessage,
    WindowMessageMarshaller,
};

// Transport types
pub use transport::{
    IncomingMessage, LocalWindow, MessageWindow, Responder, WindowHandle, WindowMessageHandler,
    WindowUtils,
};
