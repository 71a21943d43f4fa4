//! Upward frame resolution and element report relay.
//!
//! A frame cannot see its own hosting iframe, only its parent window. To
//! tell the top window which element was picked inside a nested frame, the
//! report walks up one hop at a time:
//!
//! ```text
//! frame C: report ["button.ok"] ──► frame B: prepend "#c" ──► top: prepend "#b" ──► listener
//!                                                                   ["#b", "#c", "button.ok"]
//! ```
//!
//! Each hop finds the iframe whose content window sent the report and
//! prepends that iframe's selector.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::communicator::{CommandHandler, FrameCommunicator, MessageTarget};
use crate::dom::{Element, FrameElement};
use crate::error::{Error, Result};
use crate::protocol::{ElementReport, ReportElementPath};
use crate::transport::{WindowHandle, same_window};

use super::{check_depth, next_depth};

// ============================================================================
// Types
// ============================================================================

/// Receives element reports in the top window.
pub type ReportListener = Arc<dyn Fn(ElementReport) + Send + Sync>;

// ============================================================================
// FrameFinder
// ============================================================================

/// Relays `insights.reportElementPath` toward the top window.
#[derive(Clone)]
pub struct FrameFinder {
    communicator: FrameCommunicator,
    listener: Arc<Mutex<Option<ReportListener>>>,
}

impl fmt::Debug for FrameFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameFinder")
            .field("communicator", &self.communicator)
            .field("has_listener", &self.listener.lock().is_some())
            .finish()
    }
}

impl FrameFinder {
    /// Creates a finder on top of `communicator`.
    #[must_use]
    pub fn new(communicator: FrameCommunicator) -> Self {
        Self {
            communicator,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribes to the report command.
    ///
    /// Requests are served by a finder sharing this one's listener slot.
    pub fn initialize(&self) -> bool {
        let listener = Arc::clone(&self.listener);
        self.communicator
            .subscribe_command_bound::<ReportElementPath, _, _>(move |communicator| Self {
                communicator,
                listener: Arc::clone(&listener),
            })
    }

    /// The iframe in this document hosting `win`.
    #[must_use]
    pub fn frame_element_for_window(&self, win: &WindowHandle) -> Option<FrameElement> {
        let utils = self.communicator.html_utils();
        utils.all_iframes().into_iter().find(|frame| {
            utils
                .content_window(frame)
                .is_some_and(|content| same_window(&content, win))
        })
    }

    /// Installs the listener for reports reaching this window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless this is the top window.
    pub fn set_report_listener(&self, listener: ReportListener) -> Result<()> {
        if !self.is_top_window() {
            return Err(Error::invalid_argument(
                "report listener can only be set in the top window",
            ));
        }
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    /// Removes the report listener.
    pub fn clear_report_listener(&self) {
        self.listener.lock().take();
    }

    /// Starts a report for `element` from this frame.
    ///
    /// # Errors
    ///
    /// See [`report_element`](Self::report_element).
    pub async fn report(&self, element: &Element) -> Result<()> {
        let selector = self.communicator.html_utils().unique_selector(element);
        self.report_element(selector, element.outer_html()).await
    }

    /// Starts a report from this frame.
    ///
    /// In the top window the listener is called directly. Elsewhere the
    /// report is sent to the parent window, which completes once the top
    /// window has received it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the top window has no listener
    /// - any error from the request to the parent window
    pub async fn report_element(
        &self,
        selector: impl Into<String>,
        html: impl Into<String>,
    ) -> Result<()> {
        self.deliver(ElementReport {
            target: vec![selector.into()],
            html: html.into(),
            depth: 0,
        })
        .await
    }

    /// Handles a report sent by the child frame `source`.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameNotFound`] if no iframe here hosts `source`
    /// - [`Error::FrameDepthExceeded`] if the report crossed too many frames
    /// - errors from [`report_element`](Self::report_element) delivery
    pub async fn process_report(&self, mut report: ElementReport, source: WindowHandle) -> Result<()> {
        check_depth(report.depth, self.communicator.options().max_frame_depth)?;

        let frame = self
            .frame_element_for_window(&source)
            .ok_or_else(|| Error::frame_not_found(source.id()))?;
        let frame_selector = self.communicator.html_utils().unique_selector(frame.element());

        debug!(
            frame = %frame_selector,
            source = %source.id(),
            depth = report.depth,
            "Relaying element report"
        );
        report.target.insert(0, frame_selector);
        self.deliver(report).await
    }

    fn is_top_window(&self) -> bool {
        self.communicator.handler().window_utils().is_top_window()
    }

    async fn deliver(&self, mut report: ElementReport) -> Result<()> {
        let window_utils = self.communicator.handler().window_utils();

        let Some(parent) = window_utils.parent_window() else {
            let listener = self.listener.lock().clone();
            let listener = listener
                .ok_or_else(|| Error::invalid_argument("top window has no report listener"))?;
            listener(report);
            return Ok(());
        };

        report.depth = next_depth(report.depth, self.communicator.options().max_frame_depth)?;
        self.communicator
            .send::<ReportElementPath>(MessageTarget::Window(parent), report)
            .await
    }
}

#[async_trait]
impl CommandHandler<ReportElementPath> for FrameFinder {
    async fn handle(&self, message: ElementReport, source: WindowHandle) -> Result<()> {
        self.process_report(message, source).await
    }
}

// ============================================================================
// Tests
// ============================================================================
