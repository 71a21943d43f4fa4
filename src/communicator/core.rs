//! Ping-gated request/response over the window message handler.
//!
//! # Request Lifecycle
//!
//! ```text
//! resolve window ──► post ping ──► ack within ping timeout? ──no──► CannotConnect
//!                                        │ yes
//!                                        ▼
//!                                  post command ──► answer before deadline? ──no──► RequestTimeout
//!                                        │ yes
//!                                        ▼
//!                                 payload / Remote error
//! ```
//!
//! The deadline covers the ping and the command together. Every wait that
//! ends without an answer evicts its pending entry, so a late reply is
//! treated as an unmatched message.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, trace, warn};

use crate::dom::HtmlElementUtils;
use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::{Dispose, ErrorMessageContent, FrameCommand, MessageContent, Ping};
use crate::transport::{
    CallbackResult, FrameMessageCallback, IncomingMessage, WindowHandle, WindowMessageHandler,
};

use super::options::CommunicatorOptions;
use super::request::{MessageRequest, MessageTarget, SettledResult};

// ============================================================================
// Constants
// ============================================================================

/// Liveness check command.
pub const PING_COMMAND: &str = Ping::NAME;

/// Recursive teardown command.
pub const DISPOSE_COMMAND: &str = Dispose::NAME;

// ============================================================================
// CommandHandler
// ============================================================================

/// Async handler for a typed command.
#[async_trait]
pub trait CommandHandler<C: FrameCommand>: Send + Sync + 'static {
    /// Handles one decoded request from `source`.
    async fn handle(&self, message: C::Message, source: WindowHandle) -> Result<C::Response>;
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Evicts a pending entry when the wait for it ends, whatever the reason.
struct PendingGuard<'a> {
    handler: &'a WindowMessageHandler,
    message_id: MessageId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.handler.remove_pending(&self.message_id) {
            trace!(message_id = %self.message_id, "Evicted pending entry");
        }
    }
}

// ============================================================================
// FrameCommunicator
// ============================================================================

struct CommunicatorInner {
    handler: WindowMessageHandler,
    html_utils: Arc<dyn HtmlElementUtils>,
    options: CommunicatorOptions,
    subscribed: AtomicBool,
}

/// Request/response client and server of one browsing context.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct FrameCommunicator {
    inner: Arc<CommunicatorInner>,
}

impl fmt::Debug for FrameCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCommunicator")
            .field("handler", &self.inner.handler)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl FrameCommunicator {
    /// Creates a communicator with default options.
    #[must_use]
    pub fn new(handler: WindowMessageHandler, html_utils: Arc<dyn HtmlElementUtils>) -> Self {
        Self::build(handler, html_utils, CommunicatorOptions::default())
    }

    /// Creates a communicator with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `options` fail validation.
    pub fn with_options(
        handler: WindowMessageHandler,
        html_utils: Arc<dyn HtmlElementUtils>,
        options: CommunicatorOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(handler, html_utils, options))
    }

    fn build(
        handler: WindowMessageHandler,
        html_utils: Arc<dyn HtmlElementUtils>,
        options: CommunicatorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(CommunicatorInner {
                handler,
                html_utils,
                options,
                subscribed: AtomicBool::new(false),
            }),
        }
    }

    /// The underlying message handler.
    #[inline]
    #[must_use]
    pub fn handler(&self) -> &WindowMessageHandler {
        &self.inner.handler
    }

    /// Document queries of this context.
    #[inline]
    #[must_use]
    pub fn html_utils(&self) -> &Arc<dyn HtmlElementUtils> {
        &self.inner.html_utils
    }

    /// Active options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &CommunicatorOptions {
        &self.inner.options
    }

    /// Returns `true` while the handler listens for messages.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.handler.is_initialized()
    }

    /// Registers the ping and dispose responders and starts listening.
    ///
    /// Calling again is a no-op, also after [`dispose`](Self::dispose)
    /// except that listening resumes.
    pub fn initialize(&self) {
        if !self.inner.subscribed.swap(true, Ordering::SeqCst) {
            self.subscribe(PING_COMMAND, Arc::new(Self::answer_ping));

            let weak = Arc::downgrade(&self.inner);
            self.subscribe(
                DISPOSE_COMMAND,
                Arc::new(move |incoming: IncomingMessage| {
                    Self::answer_dispose(&weak, incoming);
                    Ok(())
                }),
            );
            debug!("Frame communicator initialized");
        }

        self.inner.handler.initialize();
    }

    fn answer_ping(incoming: IncomingMessage) -> CallbackResult {
        incoming
            .responder
            .respond(incoming.content)
            .map_err(ErrorMessageContent::from)
    }

    fn answer_dispose(weak: &Weak<CommunicatorInner>, incoming: IncomingMessage) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let communicator = FrameCommunicator { inner };

        tokio::spawn(async move {
            if let Err(e) = communicator.dispose().await {
                warn!(error = %e, "Dispose requested by parent failed");
            }
            incoming.responder.respond_or_log(incoming.content);
        });
    }

    /// Registers a raw subscriber. The first registration for a command wins.
    pub fn subscribe(&self, command: impl Into<String>, callback: FrameMessageCallback) -> bool {
        self.inner.handler.add_subscriber(command, callback)
    }

    /// Unregisters the subscriber for `command`.
    pub fn unsubscribe(&self, command: &str) -> bool {
        self.inner.handler.remove_subscriber(command)
    }

    /// Registers a typed handler for `C`.
    ///
    /// The payload is decoded as `C::Message`; a payload that does not
    /// decode is answered with a `TypeError`. The handler runs on its own
    /// task and its result, error, or panic is sent back to the requester.
    ///
    /// The subscription owns `handler`. A handler that owns this
    /// communicator would keep it alive forever; register those through
    /// [`subscribe_command_bound`](Self::subscribe_command_bound).
    pub fn subscribe_command<C, H>(&self, handler: H) -> bool
    where
        C: FrameCommand,
        H: CommandHandler<C>,
    {
        let handler = Arc::new(handler);
        self.subscribe_typed::<C, H, _>(move || Some(Arc::clone(&handler)))
    }

    /// Registers a typed handler for `C` that is built per request from
    /// this communicator.
    ///
    /// The subscription holds the communicator weakly, so `bind` may
    /// return a handler that owns a [`FrameCommunicator`]. A request that
    /// arrives after the communicator is gone is answered with
    /// [`Error::NotInitialized`].
    pub fn subscribe_command_bound<C, H, F>(&self, bind: F) -> bool
    where
        C: FrameCommand,
        H: CommandHandler<C>,
        F: Fn(FrameCommunicator) -> H + Send + Sync + 'static,
    {
        let weak = self.downgrade();
        self.subscribe_typed::<C, H, _>(move || weak.upgrade().map(|c| Arc::new(bind(c))))
    }

    /// A handle that does not keep the communicator alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakFrameCommunicator {
        WeakFrameCommunicator {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn subscribe_typed<C, H, R>(&self, resolve: R) -> bool
    where
        C: FrameCommand,
        H: CommandHandler<C>,
        R: Fn() -> Option<Arc<H>> + Send + Sync + 'static,
    {
        self.subscribe(
            C::NAME,
            Arc::new(move |incoming: IncomingMessage| {
                let payload = match incoming.content {
                    Ok(payload) => payload.unwrap_or(Value::Null),
                    Err(_) => {
                        return Err(ErrorMessageContent::new(
                            "TypeError",
                            format!("{} expects a message, got an error", C::NAME),
                        ));
                    }
                };
                let message: C::Message = serde_json::from_value(payload).map_err(|e| {
                    ErrorMessageContent::new("TypeError", format!("Invalid {} message: {e}", C::NAME))
                })?;

                let handler = resolve().ok_or_else(|| {
                    ErrorMessageContent::from(Error::not_initialized("FrameCommunicator"))
                })?;
                let responder = incoming.responder;
                let source = incoming.source;

                tokio::spawn(async move {
                    let outcome = AssertUnwindSafe(handler.handle(message, source))
                        .catch_unwind()
                        .await;

                    let content: MessageContent = match outcome {
                        Ok(Ok(response)) => serde_json::to_value(response)
                            .map(Some)
                            .map_err(|e| ErrorMessageContent::from(Error::from(e))),
                        Ok(Err(e)) => Err(ErrorMessageContent::from(&e)),
                        Err(panic) => Err(ErrorMessageContent::from_panic(panic.as_ref())),
                    };
                    responder.respond_or_log(content);
                });

                Ok(())
            }),
        )
    }

    /// Sends a request and waits for its answer.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the handler is not listening
    /// - [`Error::WindowNotFound`] if the target has no window
    /// - [`Error::SandboxedFrame`] if the target frame forbids scripts
    /// - [`Error::CannotConnect`] if the ping is not acknowledged in time
    /// - [`Error::RequestTimeout`] if the command is not answered in time
    /// - [`Error::Remote`] if the frame answered with an error
    pub async fn send_message(&self, request: MessageRequest) -> Result<Option<Value>> {
        self.ensure_initialized()?;

        let win = self.resolve_window(&request.target)?;
        let options = &self.inner.options;
        let deadline = Instant::now() + options.request_timeout;

        debug!(
            command = %request.command,
            target = %request.target,
            window = %win.id(),
            "Sending request"
        );

        let (ping_guard, ping_rx) = self.post_request(&win, PING_COMMAND, None)?;
        match timeout(options.ping_timeout, ping_rx).await {
            Ok(ack) => {
                ack?.map_err(ErrorMessageContent::into_error)?;
            }
            Err(_) => {
                warn!(target = %request.target, "No ping response");
                return Err(Error::cannot_connect(
                    request.target.to_string(),
                    millis(options.ping_timeout),
                ));
            }
        }
        drop(ping_guard);

        let (guard, rx) = self.post_request(&win, &request.command, request.message)?;
        match timeout_at(deadline, rx).await {
            Ok(answer) => answer?.map_err(ErrorMessageContent::into_error),
            Err(_) => {
                warn!(command = %request.command, message_id = %guard.message_id, "Request timed out");
                Err(Error::request_timeout(
                    guard.message_id.clone(),
                    request.command,
                    millis(options.request_timeout),
                ))
            }
        }
    }

    /// Sends a typed command.
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message), plus [`Error::Json`]
    /// if the message or response does not (de)serialize.
    pub async fn send<C: FrameCommand>(
        &self,
        target: impl Into<MessageTarget>,
        message: C::Message,
    ) -> Result<C::Response> {
        let request =
            MessageRequest::new(C::NAME, target).with_message(serde_json::to_value(message)?);
        let response = self.send_message(request).await?;
        Ok(serde_json::from_value(response.unwrap_or(Value::Null))?)
    }

    /// Sends every request concurrently and waits until all have settled
    /// or `wait` elapses.
    ///
    /// Results are in request order. A request still unsettled at the
    /// deadline is reported as `Rejected(Error::Timeout)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the handler is not listening.
    pub async fn execute_request_for_all_frame_requests(
        &self,
        requests: Vec<MessageRequest>,
        wait: Duration,
    ) -> Result<Vec<SettledResult>> {
        self.ensure_initialized()?;

        let commands: Vec<String> = requests.iter().map(|r| r.command.clone()).collect();
        let slots: Mutex<Vec<Option<SettledResult>>> =
            Mutex::new(requests.iter().map(|_| None).collect());

        let sends = requests.into_iter().enumerate().map(|(index, request)| {
            let slots = &slots;
            async move {
                let settled = SettledResult::from(self.send_message(request).await);
                slots.lock()[index] = Some(settled);
            }
        });

        let completed = timeout(wait, join_all(sends)).await.is_ok();
        if !completed {
            warn!(requests = commands.len(), wait_ms = millis(wait), "Fan-out timed out");
        }

        let results = slots
            .into_inner()
            .into_iter()
            .zip(commands)
            .map(|(slot, command)| {
                slot.unwrap_or_else(|| {
                    SettledResult::Rejected(Error::timeout(
                        format!("{command} fan-out"),
                        millis(wait),
                    ))
                })
            })
            .collect();

        Ok(results)
    }

    /// Disposes every child frame, then stops listening.
    ///
    /// Returns the settled dispose results, one per iframe present when
    /// the call started.
    ///
    /// An uninitialized communicator has no frames to reach and returns
    /// no results.
    ///
    /// # Errors
    ///
    /// Propagates errors from
    /// [`execute_request_for_all_frame_requests`](Self::execute_request_for_all_frame_requests).
    pub async fn dispose(&self) -> Result<Vec<SettledResult>> {
        let results = if self.is_initialized() {
            let requests = self
                .inner
                .html_utils
                .all_iframes()
                .into_iter()
                .map(|frame| MessageRequest::to_frame(DISPOSE_COMMAND, frame))
                .collect();

            self.execute_request_for_all_frame_requests(requests, self.inner.options.dispose_timeout)
                .await?
        } else {
            Vec::new()
        };

        self.inner.handler.dispose();
        debug!(frames = results.len(), "Frame communicator disposed");
        Ok(results)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.inner.handler.is_initialized() {
            Ok(())
        } else {
            Err(Error::not_initialized("FrameCommunicator"))
        }
    }

    fn resolve_window(&self, target: &MessageTarget) -> Result<WindowHandle> {
        match target {
            MessageTarget::Window(win) => Ok(Arc::clone(win)),
            MessageTarget::Frame(frame) => {
                let win = self
                    .inner
                    .html_utils
                    .content_window(frame)
                    .ok_or_else(|| Error::window_not_found(target.to_string()))?;

                if !frame.supports_scripting() {
                    warn!(%frame, "Cannot connect to sandboxed frame");
                    return Err(Error::sandboxed_frame(frame.to_string()));
                }
                Ok(win)
            }
        }
    }

    fn post_request(
        &self,
        win: &WindowHandle,
        command: &str,
        message: Option<Value>,
    ) -> Result<(PendingGuard<'_>, oneshot::Receiver<MessageContent>)> {
        let (tx, rx) = oneshot::channel();
        let message_id = self.inner.handler.post(
            win,
            command,
            Ok(message),
            Some(Box::new(move |incoming: IncomingMessage| {
                let _ = tx.send(incoming.content);
                Ok(())
            })),
            None,
        )?;

        let guard = PendingGuard {
            handler: &self.inner.handler,
            message_id,
        };
        Ok((guard, rx))
    }
}

// ============================================================================
// WeakFrameCommunicator
// ============================================================================

/// Non-owning handle to a [`FrameCommunicator`].
#[derive(Clone)]
pub struct WeakFrameCommunicator {
    inner: Weak<CommunicatorInner>,
}

impl fmt::Debug for WeakFrameCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakFrameCommunicator")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl WeakFrameCommunicator {
    /// The communicator, if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<FrameCommunicator> {
        self.inner.upgrade().map(|inner| FrameCommunicator { inner })
    }
}

#[inline]
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::dom::{Document, Element, FrameElement};
    use crate::protocol::{AppIdentity, FindElementByPath, PathMessage, WindowMessageMarshaller};
    use crate::transport::{LocalWindow, MessageWindow, WindowUtils};

    fn communicator_for(win: &Arc<LocalWindow>, doc: Arc<Document>) -> FrameCommunicator {
        let handler = WindowMessageHandler::new(
            Arc::clone(win) as Arc<dyn WindowUtils>,
            WindowMessageMarshaller::new(AppIdentity::new("app", "1.0")),
        );
        FrameCommunicator::new(handler, doc)
    }

    #[tokio::test]
    async fn test_send_requires_initialize() {
        let top = LocalWindow::top("top");
        let comm = communicator_for(&top, Arc::new(Document::new()));

        let result = comm
            .send_message(MessageRequest::to_window("x", top.handle()))
            .await;
        assert!(matches!(result, Err(Error::NotInitialized { .. })));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let top = LocalWindow::top("top");
        let comm = communicator_for(&top, Arc::new(Document::new()));

        comm.initialize();
        comm.initialize();

        assert_eq!(top.listener_count(), 1);
        assert!(comm.handler().has_subscriber(PING_COMMAND));
        assert!(comm.handler().has_subscriber(DISPOSE_COMMAND));
    }

    #[tokio::test]
    async fn test_frame_without_window_is_rejected() {
        let top = LocalWindow::top("top");
        let comm = communicator_for(&top, Arc::new(Document::new()));
        comm.initialize();
        let frame = FrameElement::try_from(Element::builder("iframe").build()).expect("iframe");

        let result = comm.send_message(MessageRequest::to_frame("x", frame)).await;
        assert!(matches!(result, Err(Error::WindowNotFound { .. })));
    }

    #[tokio::test]
    async fn test_ping_subscriber_echoes_content() {
        let top = LocalWindow::top("top");
        let child = LocalWindow::child("child", &top);
        let top_comm = communicator_for(&top, Arc::new(Document::new()));
        let child_comm = communicator_for(&child, Arc::new(Document::new()));
        top_comm.initialize();
        child_comm.initialize();

        let echoed = top_comm
            .send_message(
                MessageRequest::to_window(PING_COMMAND, child.handle()).with_message(json!(7)),
            )
            .await
            .expect("echo");

        assert_eq!(echoed, Some(json!(7)));
        assert_eq!(top_comm.handler().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_without_frames_stops_listening() {
        let top = LocalWindow::top("top");
        let comm = communicator_for(&top, Arc::new(Document::new()));
        comm.initialize();

        let results = comm.dispose().await.expect("dispose");

        assert!(results.is_empty());
        assert!(!comm.is_initialized());
        assert_eq!(top.listener_count(), 0);

        comm.initialize();
        assert_eq!(top.listener_count(), 1);
    }

    /// Answers with the window name of the communicator it was bound to.
    struct WindowName(FrameCommunicator);

    #[async_trait]
    impl CommandHandler<FindElementByPath> for WindowName {
        async fn handle(&self, _message: PathMessage, _source: WindowHandle) -> Result<String> {
            Ok(self.0.handler().window_utils().current_window().id().to_string())
        }
    }

    #[tokio::test]
    async fn test_bound_subscription_does_not_own_communicator() {
        let top = LocalWindow::top("top");
        let child = LocalWindow::child("child", &top);
        let doc = Arc::new(Document::new());
        let top_comm = communicator_for(&top, Arc::new(Document::new()));
        let child_comm = communicator_for(&child, Arc::clone(&doc));
        top_comm.initialize();
        child_comm.initialize();
        assert!(child_comm.subscribe_command_bound::<FindElementByPath, _, _>(WindowName));

        let answer = top_comm
            .send::<FindElementByPath>(child.handle(), PathMessage::new(["#x"]))
            .await
            .expect("bound handler answers");
        assert_eq!(answer, child.handle().id().to_string());

        let weak = child_comm.downgrade();
        let weak_doc = Arc::downgrade(&doc);
        drop(doc);
        child_comm.dispose().await.expect("dispose");
        drop(child_comm);

        assert!(weak.upgrade().is_none());
        assert!(weak_doc.upgrade().is_none());
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
