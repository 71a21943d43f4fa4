//! Envelope and error content types.
//!
//! An envelope is the unit exchanged over the cross-document channel. It is
//! serialized as JSON text and posted as a string payload.
//!
//! # Format
//!
//! ```json
//! {
//!   "messageId": "uuid",
//!   "command": "insights.ping",
//!   "message": { ... },
//!   "error": { "name": "...", "message": "...", "stack": "..." },
//!   "messageStableSignature": "e467510c-ca1f-47df-ace1-a39f7f0678c9",
//!   "messageSourceId": "app name",
//!   "messageVersion": "app version"
//! }
//! ```
//!
//! `message` and `error` are mutually exclusive and both optional.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::identifiers::MessageId;

// ============================================================================
// Constants
// ============================================================================

/// Constant signature stamped on every envelope.
///
/// Partner code relies on this exact value to tell this protocol's messages
/// apart from unknown traffic on the same channel. Never change it.
pub const MESSAGE_STABLE_SIGNATURE: &str = "e467510c-ca1f-47df-ace1-a39f7f0678c9";

// ============================================================================
// ErrorMessageContent
// ============================================================================

/// Structured error carried across the message boundary.
///
/// Stack text is informational only; it is never meaningful in the
/// receiving context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessageContent {
    /// Error name (kind).
    #[serde(default)]
    pub name: String,

    /// Human readable message.
    #[serde(default)]
    pub message: String,

    /// Stack text from the producing side.
    #[serde(default)]
    pub stack: String,
}

impl ErrorMessageContent {
    /// Creates error content without a stack.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: String::new(),
        }
    }

    /// Sets the stack text.
    #[inline]
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Builds error content from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "subscriber panicked".to_string()
        };

        Self::new("Panic", message)
    }

    /// Converts into the crate error seen by the original caller.
    #[inline]
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::remote(self.name, self.message, self.stack)
    }
}

impl From<&Error> for ErrorMessageContent {
    fn from(err: &Error) -> Self {
        match err {
            Error::Remote {
                name,
                message,
                stack,
            } => Self {
                name: name.clone(),
                message: message.clone(),
                stack: stack.clone(),
            },
            other => Self::new(other.name(), other.to_string()),
        }
    }
}

impl From<Error> for ErrorMessageContent {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// MessageContent
// ============================================================================

/// Receiving-side view of an envelope body.
///
/// `Ok(None)` is an envelope with neither payload nor error.
pub type MessageContent = std::result::Result<Option<Value>, ErrorMessageContent>;

// ============================================================================
// WindowMessage
// ============================================================================

/// A protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowMessage {
    /// Correlation id; echoed unchanged on responses.
    pub message_id: MessageId,

    /// Semantic operation.
    #[serde(default)]
    pub command: String,

    /// Payload (absent when `error` is set).
    ///
    /// `None` is omitted on the wire. `Some(Value::Null)` is written as
    /// `"message": null` and reads back as `Some(Value::Null)`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub message: Option<Value>,

    /// Error content (absent when `message` is set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessageContent>,

    /// Always [`MESSAGE_STABLE_SIGNATURE`].
    pub message_stable_signature: String,

    /// Producing application id.
    pub message_source_id: String,

    /// Producing application version.
    pub message_version: String,
}

/// A field that is present deserializes to `Some`, JSON `null` included.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl WindowMessage {
    /// Returns the body as a tagged result, cloning the payload.
    #[must_use]
    pub fn content(&self) -> MessageContent {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.message.clone()),
        }
    }

    /// Consumes the envelope and returns its body.
    #[must_use]
    pub fn into_content(self) -> MessageContent {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.message),
        }
    }

    /// Returns `true` if the envelope carries an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
