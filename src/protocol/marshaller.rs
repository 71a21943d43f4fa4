//! Envelope construction, parsing, and authenticity filtering.
//!
//! The channel is shared with arbitrary other code, so every incoming
//! payload is checked against the local [`AppIdentity`] and the stable
//! signature before it is allowed any further.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::MessageId;

use super::envelope::{MESSAGE_STABLE_SIGNATURE, MessageContent, WindowMessage};

// ============================================================================
// Types
// ============================================================================

/// Message id generator.
pub type IdGenerator = Arc<dyn Fn() -> MessageId + Send + Sync>;

// ============================================================================
// AppIdentity
// ============================================================================

/// Identity of the producing application, used as the envelope signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    /// Application id (manifest `name`).
    pub source_id: String,
    /// Application version (manifest `version`).
    pub version: String,
}

/// Subset of an extension manifest this crate reads.
#[derive(Deserialize)]
struct ManifestFields {
    name: String,
    version: String,
}

impl AppIdentity {
    /// Creates an identity from explicit values.
    #[inline]
    #[must_use]
    pub fn new(source_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            version: version.into(),
        }
    }

    /// Reads `name` and `version` from manifest JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] if the text is not JSON or lacks either
    /// field.
    pub fn from_manifest_str(manifest: &str) -> Result<Self> {
        let fields: ManifestFields = serde_json::from_str(manifest)
            .map_err(|e| Error::manifest(format!("invalid manifest: {e}")))?;

        if fields.name.is_empty() || fields.version.is_empty() {
            return Err(Error::manifest("manifest name and version must be non-empty"));
        }

        Ok(Self::new(fields.name, fields.version))
    }

    /// Reads `name` and `version` from a manifest file.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Manifest`] if its content is invalid
    pub fn from_manifest_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_manifest_str(&text)
    }
}

// ============================================================================
// WindowMessageMarshaller
// ============================================================================

/// Builds and parses envelopes for one application identity.
#[derive(Clone)]
pub struct WindowMessageMarshaller {
    identity: AppIdentity,
    generate_id: IdGenerator,
}

impl fmt::Debug for WindowMessageMarshaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowMessageMarshaller")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl WindowMessageMarshaller {
    /// Creates a marshaller generating UUID v4 message ids.
    #[must_use]
    pub fn new(identity: AppIdentity) -> Self {
        Self::with_id_generator(identity, Arc::new(MessageId::generate))
    }

    /// Creates a marshaller with a custom id generator.
    #[must_use]
    pub fn with_id_generator(identity: AppIdentity, generate_id: IdGenerator) -> Self {
        Self {
            identity,
            generate_id,
        }
    }

    /// Returns the identity stamped on outgoing envelopes.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Builds an envelope.
    ///
    /// An `Err` content goes to the `error` field and leaves `message`
    /// empty. `response_id` becomes the envelope id when replying to an
    /// earlier request; otherwise a fresh id is generated.
    #[must_use]
    pub fn create_message(
        &self,
        command: &str,
        content: MessageContent,
        response_id: Option<MessageId>,
    ) -> WindowMessage {
        let (message, error) = match content {
            Ok(message) => (message, None),
            Err(error) => (None, Some(error)),
        };

        WindowMessage {
            message_id: response_id.unwrap_or_else(|| (self.generate_id)()),
            command: command.to_string(),
            message,
            error,
            message_stable_signature: MESSAGE_STABLE_SIGNATURE.to_string(),
            message_source_id: self.identity.source_id.clone(),
            message_version: self.identity.version.clone(),
        }
    }

    /// Serializes an envelope to the JSON text posted on the channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn serialize(&self, message: &WindowMessage) -> Result<String> {
        Ok(serde_json::to_string(message)?)
    }

    /// Parses raw channel data into an envelope.
    ///
    /// Returns `None` for anything that is not a string holding a JSON
    /// object signed by this application. Never fails.
    #[must_use]
    pub fn parse_message(&self, raw: &Value) -> Option<WindowMessage> {
        let Value::String(text) = raw else {
            trace!("Dropping non-string message data");
            return None;
        };

        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(text) else {
            trace!("Dropping message data that is not a JSON object");
            return None;
        };

        if !self.is_authentic(&fields) {
            trace!("Dropping message with foreign signature");
            return None;
        }

        serde_json::from_value(Value::Object(fields)).ok()
    }

    fn is_authentic(&self, fields: &Map<String, Value>) -> bool {
        let field_is = |key: &str, expected: &str| {
            fields.get(key).and_then(Value::as_str) == Some(expected)
        };

        fields.get("messageId").is_some_and(Value::is_string)
            && field_is("messageStableSignature", MESSAGE_STABLE_SIGNATURE)
            && field_is("messageSourceId", self.identity.source_id.as_str())
            && field_is("messageVersion", self.identity.version.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
