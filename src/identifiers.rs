//! Type-safe identifiers for messaging entities.
//!
//! Newtype wrappers keep window, listener, and message identifiers from
//! being mixed up at compile time.
//!
//! | Type | Backing | Source |
//! |------|---------|--------|
//! | [`WindowId`] | `u64` | Process-wide counter |
//! | [`ListenerId`] | `u64` | Process-wide counter |
//! | [`MessageId`] | `String` | UUID v4 text, or whatever a peer sent |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Counters
// ============================================================================

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// WindowId
// ============================================================================

/// Identity of a browsing context (top window or frame).
///
/// Two window handles refer to the same context exactly when their ids
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    /// Allocates a fresh, process-unique window id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Registration handle for a native message listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates a fresh listener id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// MessageId
// ============================================================================

/// Correlation id carried by every envelope.
///
/// Freshly generated ids are UUID v4 strings. Ids received from peers are
/// kept verbatim, whatever their shape, since a response must echo the
/// request id exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generates a new random message id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing id string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_ids_are_unique() {
        let a = WindowId::next();
        let b = WindowId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_generated_message_id_is_uuid() {
        let id = MessageId::generate();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(id, MessageId::generate());
    }

    #[test]
    fn test_message_id_serializes_as_plain_string() {
        let id = MessageId::new("id1");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"id1\"");
        let parsed: MessageId = serde_json::from_str("\"id1\"").expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageId::new("abc").to_string(), "abc");
        assert!(WindowId::next().to_string().starts_with("window-"));
    }
}
