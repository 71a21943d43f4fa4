//! Shared fixtures for integration tests.
//!
//! Builds trees of in-process windows, each with its own document,
//! communicator, and finders, wired the way a page and its iframes are.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;

use frame_messenger::dom::{Document, ElementBuilder, FrameElement, HtmlElementUtils};
use frame_messenger::protocol::WindowMessage;
use frame_messenger::transport::MessageEvent;
use frame_messenger::{
    AppIdentity, CommunicatorOptions, ElementFinderByPath, ElementFinderByPosition,
    FrameCommunicator, FrameFinder, LocalWindow, WindowMessageHandler, WindowMessageMarshaller,
    WindowUtils,
};
use parking_lot::Mutex;
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

pub const APP_NAME: &str = "frame-messenger-tests";
pub const APP_VERSION: &str = "1.2.3";

// ============================================================================
// Setup
// ============================================================================

static TRACING: Once = Once::new();

/// Installs a test log subscriber once. Controlled by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn marshaller() -> WindowMessageMarshaller {
    WindowMessageMarshaller::new(AppIdentity::new(APP_NAME, APP_VERSION))
}

// ============================================================================
// FrameNode
// ============================================================================

/// One browsing context with its full messaging stack.
pub struct FrameNode {
    pub window: Arc<LocalWindow>,
    pub document: Arc<Document>,
    pub communicator: FrameCommunicator,
    pub path_finder: ElementFinderByPath,
    pub position_finder: ElementFinderByPosition,
    pub frame_finder: FrameFinder,
}

impl FrameNode {
    /// Creates an initialized top window.
    pub fn top(name: &str) -> Self {
        Self::top_with_options(name, CommunicatorOptions::default())
    }

    /// Creates an initialized top window with custom options.
    pub fn top_with_options(name: &str, options: CommunicatorOptions) -> Self {
        init_tracing();
        Self::attach(LocalWindow::top(name), options)
    }

    /// Embeds an initialized child frame described by `iframe`.
    ///
    /// The iframe element is appended to this node's document.
    pub fn embed(&self, name: &str, iframe: ElementBuilder) -> (FrameNode, FrameElement) {
        let (window, frame) = self.embed_silent(name, iframe);
        let node = Self::attach(window, *self.communicator.options());
        (node, frame)
    }

    /// Embeds a child window that runs no messaging stack at all.
    pub fn embed_silent(
        &self,
        name: &str,
        iframe: ElementBuilder,
    ) -> (Arc<LocalWindow>, FrameElement) {
        let window = LocalWindow::child(name, &self.window);
        let element = self
            .document
            .append(iframe.content_window(window.handle()).build());
        let frame = FrameElement::try_from(element).expect("iframe element");
        (window, frame)
    }

    fn attach(window: Arc<LocalWindow>, options: CommunicatorOptions) -> Self {
        let document = Arc::new(Document::new());
        let handler =
            WindowMessageHandler::new(Arc::clone(&window) as Arc<dyn WindowUtils>, marshaller());
        let html_utils = Arc::clone(&document) as Arc<dyn HtmlElementUtils>;
        let communicator = FrameCommunicator::with_options(handler, html_utils, options)
            .expect("valid options");

        let path_finder = ElementFinderByPath::new(communicator.clone());
        let position_finder = ElementFinderByPosition::new(communicator.clone());
        let frame_finder = FrameFinder::new(communicator.clone());

        communicator.initialize();
        path_finder.initialize();
        position_finder.initialize();
        frame_finder.initialize();

        Self {
            window,
            document,
            communicator,
            path_finder,
            position_finder,
            frame_finder,
        }
    }
}

// ============================================================================
// Recording
// ============================================================================

/// Records every envelope delivered to `window`.
pub fn record_envelopes(window: &LocalWindow) -> Arc<Mutex<Vec<WindowMessage>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);

    window.add_message_listener(Arc::new(move |event: &MessageEvent| {
        if let Value::String(text) = &event.data
            && let Ok(message) = serde_json::from_str::<WindowMessage>(text)
        {
            sink.lock().push(message);
        }
    }));

    log
}

/// Lets spawned window event loops drain.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
