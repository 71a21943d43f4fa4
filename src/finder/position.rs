//! Element lookup by viewport point, through nested frames.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::communicator::{CommandHandler, FrameCommunicator};
use crate::dom::FrameElement;
use crate::error::Result;
use crate::protocol::{FindElementByPosition, PositionMessage};
use crate::transport::WindowHandle;

use super::{check_depth, next_depth};

// ============================================================================
// ElementFinderByPosition
// ============================================================================

/// Answers `insights.findElementByPosition` for one context.
///
/// The answer is the selector chain to the topmost element at the point,
/// outermost frame first. When the point hits an iframe the query is
/// forwarded into it in the frame's own coordinate space.
#[derive(Debug, Clone)]
pub struct ElementFinderByPosition {
    communicator: FrameCommunicator,
}

impl ElementFinderByPosition {
    /// Creates a finder on top of `communicator`.
    #[must_use]
    pub fn new(communicator: FrameCommunicator) -> Self {
        Self { communicator }
    }

    /// Subscribes to the position command.
    pub fn initialize(&self) -> bool {
        self.communicator
            .subscribe_command_bound::<FindElementByPosition, _, _>(Self::new)
    }

    /// Resolves the element under `(message.x, message.y)`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::FrameDepthExceeded`] if the point crosses too many frames
    /// - any error from the request into the hit frame
    pub async fn process_request(&self, message: PositionMessage) -> Result<Vec<String>> {
        let max_depth = self.communicator.options().max_frame_depth;
        check_depth(message.depth, max_depth)?;

        let utils = self.communicator.html_utils();
        let Some(element) = utils.elements_from_point(message.x, message.y).into_iter().next()
        else {
            trace!(x = message.x, y = message.y, "No element at point");
            return Ok(Vec::new());
        };

        let selector = utils.unique_selector(&element);
        let Ok(frame) = FrameElement::try_from(element) else {
            return Ok(vec![selector]);
        };

        let next_depth = next_depth(message.depth, max_depth)?;

        let (scroll_x, scroll_y) = utils.scroll_position();
        let offset = utils.offset(frame.element());
        let inner = PositionMessage {
            x: message.x + scroll_x - offset.left,
            y: message.y + scroll_y - offset.top,
            depth: next_depth,
        };

        debug!(%selector, x = inner.x, y = inner.y, depth = next_depth, "Forwarding point into frame");
        let mut chain = self
            .communicator
            .send::<FindElementByPosition>(frame, inner)
            .await?;
        chain.insert(0, selector);
        Ok(chain)
    }
}

#[async_trait]
impl CommandHandler<FindElementByPosition> for ElementFinderByPosition {
    async fn handle(&self, message: PositionMessage, _source: WindowHandle) -> Result<Vec<String>> {
        self.process_request(message).await
    }
}

// ============================================================================
// Tests
// ============================================================================
