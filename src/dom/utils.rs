//! Document queries used by the communicator and finders.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::transport::WindowHandle;

use super::element::{Element, FrameElement, Offset};

// ============================================================================
// HtmlElementUtils
// ============================================================================

/// Read-only view of one context's document.
pub trait HtmlElementUtils: Send + Sync {
    /// All frame elements currently in the document, in document order.
    fn all_iframes(&self) -> Vec<FrameElement>;

    /// Browsing context hosted by `frame`, if it has loaded.
    fn content_window(&self, frame: &FrameElement) -> Option<WindowHandle> {
        frame.content_window()
    }

    /// First element matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if the selector is malformed.
    fn query_selector(&self, selector: &str) -> Result<Option<Element>>;

    /// Elements under the viewport point, topmost first.
    fn elements_from_point(&self, x: f64, y: f64) -> Vec<Element>;

    /// Position of `element` relative to the document origin.
    fn offset(&self, element: &Element) -> Offset {
        let rect = element.rect();
        Offset {
            left: rect.left,
            top: rect.top,
        }
    }

    /// Current `(scroll_x, scroll_y)` of the viewport.
    fn scroll_position(&self) -> (f64, f64);

    /// Selector that addresses `element` within this document.
    fn unique_selector(&self, element: &Element) -> String;
}
