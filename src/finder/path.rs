//! Element lookup by a chain of frame-relative selectors.
//!
//! `["#outer", "#inner", "button.ok"]` means: find `#outer` here, it must be
//! an iframe, ask that frame for `["#inner", "button.ok"]`, and so on. The
//! last selector's match is answered with its outer HTML.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tracing::debug;

use crate::communicator::{CommandHandler, FrameCommunicator};
use crate::dom::FrameElement;
use crate::error::{Error, Result};
use crate::protocol::{FindElementByPath, PathMessage};
use crate::transport::WindowHandle;

use super::{check_depth, next_depth};

// ============================================================================
// ElementFinderByPath
// ============================================================================

/// Answers `insights.findElementByPath` for one context.
#[derive(Debug, Clone)]
pub struct ElementFinderByPath {
    communicator: FrameCommunicator,
}

impl ElementFinderByPath {
    /// Creates a finder on top of `communicator`.
    #[must_use]
    pub fn new(communicator: FrameCommunicator) -> Self {
        Self { communicator }
    }

    /// Subscribes to the path command.
    pub fn initialize(&self) -> bool {
        self.communicator
            .subscribe_command_bound::<FindElementByPath, _, _>(Self::new)
    }

    /// Resolves `message.path` starting in this document.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the path is empty or a selector is malformed
    /// - [`Error::ElementNotFound`] if a selector matches nothing
    /// - [`Error::InvalidPath`] if the path continues past a non-frame element
    /// - [`Error::FrameDepthExceeded`] if the path crosses too many frames
    /// - any error from the request into the next frame
    pub async fn process_request(&self, message: PathMessage) -> Result<String> {
        let max_depth = self.communicator.options().max_frame_depth;
        check_depth(message.depth, max_depth)?;

        let Some((selector, rest)) = message.path.split_first() else {
            return Err(Error::invalid_argument("element path must not be empty"));
        };

        let element = self
            .communicator
            .html_utils()
            .query_selector(selector)?
            .ok_or_else(|| Error::element_not_found(selector.as_str()))?;

        if rest.is_empty() {
            return Ok(element.outer_html());
        }

        let frame = FrameElement::try_from(element).map_err(|_| {
            Error::invalid_path(format!(
                "'{selector}' is not a frame but {} selector(s) remain",
                rest.len()
            ))
        })?;

        let next_depth = next_depth(message.depth, max_depth)?;

        debug!(%selector, depth = next_depth, remaining = rest.len(), "Descending into frame");
        self.communicator
            .send::<FindElementByPath>(
                frame,
                PathMessage {
                    path: rest.to_vec(),
                    depth: next_depth,
                },
            )
            .await
    }
}

#[async_trait]
impl CommandHandler<FindElementByPath> for ElementFinderByPath {
    async fn handle(&self, message: PathMessage, _source: WindowHandle) -> Result<String> {
        self.process_request(message).await
    }
}

// ============================================================================
// Tests
// ============================================================================
