//! Per-window message listener and request/response correlation.
//!
//! [`WindowMessageHandler`] owns the single native listener of a browsing
//! context. It keeps two tables:
//!
//! - **pending**: message id → one-shot callback awaiting the response to a
//!   request this context sent
//! - **subscribers**: command → callback for unsolicited incoming commands
//!
//! An incoming envelope whose id is pending is a response; anything else
//! is a new command routed by its `command` tag. A subscriber that fails
//! or panics is answered on its behalf with an error envelope carrying the
//! same message id, so the sender never waits on a dead subscriber.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, MessageId};
use crate::protocol::{ErrorMessageContent, MessageContent, WindowMessageMarshaller};

use super::window::{MessageEvent, WILDCARD_ORIGIN, WindowHandle, WindowUtils};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on the pending-callback table.
pub const DEFAULT_MAX_PENDING: usize = 1000;

// ============================================================================
// Types
// ============================================================================

/// Outcome of a callback. `Err` is sent back to the message source.
pub type CallbackResult = std::result::Result<(), ErrorMessageContent>;

/// Subscriber for an incoming command.
pub type FrameMessageCallback = Arc<dyn Fn(IncomingMessage) -> CallbackResult + Send + Sync>;

/// One-shot callback awaiting a response.
pub type ResponseCallback = Box<dyn FnOnce(IncomingMessage) -> CallbackResult + Send>;

type PendingMap = FxHashMap<MessageId, ResponseCallback>;
type SubscriberMap = FxHashMap<String, FrameMessageCallback>;

// ============================================================================
// IncomingMessage
// ============================================================================

/// A parsed envelope handed to a callback.
pub struct IncomingMessage {
    /// Command tag of the envelope.
    pub command: String,
    /// Payload or error content.
    pub content: MessageContent,
    /// Window that posted the envelope.
    pub source: WindowHandle,
    /// Replies to `source`, reusing the envelope id.
    pub responder: Responder,
}

impl fmt::Debug for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingMessage")
            .field("command", &self.command)
            .field("content", &self.content)
            .field("source", &self.source.id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Responder
// ============================================================================

/// Reply handle closed over `(source window, command, message id)`.
#[derive(Clone)]
pub struct Responder {
    handler: WindowMessageHandler,
    target: WindowHandle,
    command: String,
    message_id: MessageId,
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("target", &self.target.id())
            .field("command", &self.command)
            .field("message_id", &self.message_id)
            .finish()
    }
}

impl Responder {
    /// Message id the reply will carry.
    #[inline]
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Window the reply goes to.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &WindowHandle {
        &self.target
    }

    /// Posts `content` back to the source window.
    ///
    /// # Errors
    ///
    /// Returns the error from [`WindowMessageHandler::post`].
    pub fn respond(&self, content: MessageContent) -> Result<()> {
        self.handler
            .post(
                &self.target,
                &self.command,
                content,
                None,
                Some(self.message_id.clone()),
            )
            .map(|_| ())
    }

    /// Posts content and logs instead of returning a failure.
    ///
    /// Used from spawned tasks, where nobody is left to receive the error.
    pub fn respond_or_log(&self, content: MessageContent) {
        if let Err(e) = self.respond(content) {
            warn!(
                command = %self.command,
                message_id = %self.message_id,
                error = %e,
                "Failed to post response"
            );
        }
    }
}

// ============================================================================
// WindowMessageHandler
// ============================================================================

struct HandlerInner {
    window_utils: Arc<dyn WindowUtils>,
    marshaller: WindowMessageMarshaller,
    max_pending: usize,
    listener: Mutex<Option<ListenerId>>,
    pending: Mutex<PendingMap>,
    subscribers: Mutex<SubscriberMap>,
}

/// Native listener plus correlation tables of one browsing context.
///
/// Cheap to clone; clones share state. No table lock is held while a
/// callback runs, so callbacks may post or (un)subscribe freely.
#[derive(Clone)]
pub struct WindowMessageHandler {
    inner: Arc<HandlerInner>,
}

impl fmt::Debug for WindowMessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowMessageHandler")
            .field("window", &self.inner.window_utils.current_window().id())
            .field("initialized", &self.is_initialized())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl WindowMessageHandler {
    /// Creates a handler for the context behind `window_utils`.
    #[must_use]
    pub fn new(window_utils: Arc<dyn WindowUtils>, marshaller: WindowMessageMarshaller) -> Self {
        Self::with_max_pending(window_utils, marshaller, DEFAULT_MAX_PENDING)
    }

    /// Creates a handler with a custom pending-table bound.
    #[must_use]
    pub fn with_max_pending(
        window_utils: Arc<dyn WindowUtils>,
        marshaller: WindowMessageMarshaller,
        max_pending: usize,
    ) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                window_utils,
                marshaller,
                max_pending,
                listener: Mutex::new(None),
                pending: Mutex::new(PendingMap::default()),
                subscribers: Mutex::new(SubscriberMap::default()),
            }),
        }
    }

    /// Channel primitives of the hosting context.
    #[inline]
    #[must_use]
    pub fn window_utils(&self) -> &Arc<dyn WindowUtils> {
        &self.inner.window_utils
    }

    /// Attaches the native listener. Calling again is a no-op.
    pub fn initialize(&self) {
        let mut listener = self.inner.listener.lock();
        if listener.is_some() {
            return;
        }

        let weak: Weak<HandlerInner> = Arc::downgrade(&self.inner);
        let id = self
            .inner
            .window_utils
            .add_message_listener(Arc::new(move |event: &MessageEvent| {
                if let Some(inner) = weak.upgrade() {
                    WindowMessageHandler { inner }.on_message(event);
                }
            }));

        *listener = Some(id);
        debug!(listener = %id, "Window message handler initialized");
    }

    /// Removes the native listener and drops all pending callbacks.
    ///
    /// Waiters on dropped callbacks observe a closed channel.
    pub fn dispose(&self) {
        let Some(id) = self.inner.listener.lock().take() else {
            return;
        };

        self.inner.window_utils.remove_message_listener(id);
        let dropped = {
            let mut pending = self.inner.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };

        debug!(listener = %id, dropped, "Window message handler disposed");
    }

    /// Returns `true` while the native listener is attached.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    /// Registers `callback` for `command`.
    ///
    /// The first registration wins: if `command` already has a subscriber
    /// this is a no-op returning `false`.
    pub fn add_subscriber(&self, command: impl Into<String>, callback: FrameMessageCallback) -> bool {
        let command = command.into();
        let mut subscribers = self.inner.subscribers.lock();

        if subscribers.contains_key(&command) {
            warn!(%command, "Subscriber already registered, ignoring new one");
            return false;
        }

        trace!(%command, "Subscriber added");
        subscribers.insert(command, callback);
        true
    }

    /// Unregisters the subscriber for `command`.
    pub fn remove_subscriber(&self, command: &str) -> bool {
        self.inner.subscribers.lock().remove(command).is_some()
    }

    /// Returns `true` if `command` has a subscriber.
    #[must_use]
    pub fn has_subscriber(&self, command: &str) -> bool {
        self.inner.subscribers.lock().contains_key(command)
    }

    /// Posts an envelope to `win`.
    ///
    /// With a `callback`, it is recorded under the envelope id and invoked
    /// once when the response arrives. Without one, any entry for that id
    /// is removed. `response_id` reuses an existing id (replies).
    ///
    /// # Errors
    ///
    /// - [`Error::TooManyPending`] if the pending table is full
    /// - [`Error::Json`] if the payload cannot be serialized
    /// - [`Error::WindowClosed`] if `win` no longer accepts messages
    pub fn post(
        &self,
        win: &WindowHandle,
        command: &str,
        content: MessageContent,
        callback: Option<ResponseCallback>,
        response_id: Option<MessageId>,
    ) -> Result<MessageId> {
        let message = self
            .inner
            .marshaller
            .create_message(command, content, response_id);
        let message_id = message.message_id.clone();
        let data = self.inner.marshaller.serialize(&message)?;
        let awaits_response = callback.is_some();

        {
            let mut pending = self.inner.pending.lock();
            match callback {
                Some(callback) => {
                    if pending.len() >= self.inner.max_pending
                        && !pending.contains_key(&message_id)
                    {
                        warn!(
                            pending = pending.len(),
                            max = self.inner.max_pending,
                            %command,
                            "Too many pending requests"
                        );
                        return Err(Error::too_many_pending(
                            pending.len(),
                            self.inner.max_pending,
                        ));
                    }
                    pending.insert(message_id.clone(), callback);
                }
                None => {
                    pending.remove(&message_id);
                }
            }
        }

        if let Err(e) = self
            .inner
            .window_utils
            .post_message(win, data, WILDCARD_ORIGIN)
        {
            if awaits_response {
                self.inner.pending.lock().remove(&message_id);
            }
            return Err(e);
        }

        trace!(%command, %message_id, window = %win.id(), "Message posted");
        Ok(message_id)
    }

    /// Evicts a pending callback. Returns `false` if none was recorded.
    pub fn remove_pending(&self, message_id: &MessageId) -> bool {
        self.inner.pending.lock().remove(message_id).is_some()
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Builds a responder that replies to `source` under `message_id`.
    #[must_use]
    pub fn create_frame_responder(
        &self,
        source: WindowHandle,
        command: impl Into<String>,
        message_id: MessageId,
    ) -> Responder {
        Responder {
            handler: self.clone(),
            target: source,
            command: command.into(),
            message_id,
        }
    }

    /// Routes one native message event.
    fn on_message(&self, event: &MessageEvent) {
        let Some(message) = self.inner.marshaller.parse_message(&event.data) else {
            return;
        };

        let Some(source) = event.source.clone() else {
            warn!(
                command = %message.command,
                message_id = %message.message_id,
                "Dropping message without source window"
            );
            return;
        };

        let message_id = message.message_id.clone();
        let command = message.command.clone();
        let incoming = IncomingMessage {
            command: command.clone(),
            content: message.into_content(),
            source: Arc::clone(&source),
            responder: self.create_frame_responder(
                Arc::clone(&source),
                command.clone(),
                message_id.clone(),
            ),
        };

        let pending = self.inner.pending.lock().remove(&message_id);
        let outcome = match pending {
            Some(callback) => {
                trace!(%command, %message_id, "Dispatching response");
                catch_unwind(AssertUnwindSafe(move || callback(incoming)))
            }
            None => {
                let subscriber = self.inner.subscribers.lock().get(&command).cloned();
                let Some(subscriber) = subscriber else {
                    trace!(%command, %message_id, "No subscriber for command");
                    return;
                };
                trace!(%command, %message_id, "Dispatching command");
                catch_unwind(AssertUnwindSafe(move || subscriber(incoming)))
            }
        };

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(content)) => content,
            Err(panic) => {
                let content = ErrorMessageContent::from_panic(panic.as_ref());
                error!(%command, %message_id, message = %content.message, "Callback panicked");
                content
            }
        };

        debug!(%command, %message_id, error = %failure.message, "Notifying source of failure");
        if let Err(e) = self.post(&source, &command, Err(failure), None, Some(message_id)) {
            warn!(%command, error = %e, "Failed to notify source of failure");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use serde_json::{Value, json};

    use crate::identifiers::WindowId;
    use crate::protocol::{AppIdentity, WindowMessage};
    use crate::transport::window::{MessageListener, MessageWindow};

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    #[derive(Debug)]
    struct StubWindow {
        id: WindowId,
        received: Mutex<Vec<Value>>,
        closed: AtomicBool,
    }

    impl StubWindow {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: WindowId::next(),
                received: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            })
        }

        fn envelopes(&self) -> Vec<WindowMessage> {
            self.received
                .lock()
                .iter()
                .map(|data| {
                    serde_json::from_str(data.as_str().expect("string data")).expect("envelope")
                })
                .collect()
        }
    }

    impl MessageWindow for StubWindow {
        fn id(&self) -> WindowId {
            self.id
        }

        fn deliver(&self, event: MessageEvent, target_origin: &str) -> Result<()> {
            assert_eq!(target_origin, "*");
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::window_closed(self.id));
            }
            self.received.lock().push(event.data);
            Ok(())
        }
    }

    struct MockWindowUtils {
        me: Arc<StubWindow>,
        listeners: Mutex<Vec<(ListenerId, MessageListener)>>,
        add_calls: AtomicUsize,
        remove_calls: AtomicUsize,
    }

    impl MockWindowUtils {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                me: StubWindow::new(),
                listeners: Mutex::new(Vec::new()),
                add_calls: AtomicUsize::new(0),
                remove_calls: AtomicUsize::new(0),
            })
        }

        fn emit(&self, data: Value, source: Option<WindowHandle>) {
            let listeners: Vec<MessageListener> =
                self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
            let event = MessageEvent { data, source };
            for listener in listeners {
                listener(&event);
            }
        }
    }

    impl WindowUtils for MockWindowUtils {
        fn current_window(&self) -> WindowHandle {
            Arc::clone(&self.me) as WindowHandle
        }

        fn parent_window(&self) -> Option<WindowHandle> {
            None
        }

        fn add_message_listener(&self, listener: MessageListener) -> ListenerId {
            self.add_calls.fetch_add(1, Ordering::SeqCst);
            let id = ListenerId::next();
            self.listeners.lock().push((id, listener));
            id
        }

        fn remove_message_listener(&self, id: ListenerId) -> bool {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
            let mut listeners = self.listeners.lock();
            let before = listeners.len();
            listeners.retain(|(existing, _)| *existing != id);
            before != listeners.len()
        }
    }

    // ------------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------------

    fn marshaller() -> WindowMessageMarshaller {
        WindowMessageMarshaller::new(AppIdentity::new("app id", "1.0"))
    }

    fn setup() -> (WindowMessageHandler, Arc<MockWindowUtils>) {
        let utils = MockWindowUtils::new();
        let handler = WindowMessageHandler::new(Arc::clone(&utils) as Arc<dyn WindowUtils>, marshaller());
        handler.initialize();
        (handler, utils)
    }

    fn envelope(id: &str, command: &str, message: Value) -> Value {
        let m = marshaller();
        let created = m.create_message(command, Ok(Some(message)), Some(MessageId::new(id)));
        Value::String(m.serialize(&created).expect("serialize"))
    }

    fn flag_callback(flag: Arc<AtomicBool>) -> ResponseCallback {
        Box::new(move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_initialize_attaches_listener_once() {
        let (handler, utils) = setup();
        handler.initialize();

        assert_eq!(utils.add_calls.load(Ordering::SeqCst), 1);
        assert!(handler.is_initialized());
    }

    #[test]
    fn test_dispose_removes_listener() {
        let (handler, utils) = setup();
        handler.dispose();
        handler.dispose();

        assert_eq!(utils.remove_calls.load(Ordering::SeqCst), 1);
        assert!(utils.listeners.lock().is_empty());
        assert!(!handler.is_initialized());

        handler.initialize();
        assert_eq!(utils.add_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_post_sends_signed_envelope_with_wildcard_origin() {
        let (handler, _utils) = setup();
        let target = StubWindow::new();
        let target_handle = Arc::clone(&target) as WindowHandle;

        let id = handler
            .post(&target_handle, "command1", Ok(Some(json!({"a": 1}))), None, None)
            .expect("post");

        let sent = target.envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_id, id);
        assert_eq!(sent[0].command, "command1");
        assert_eq!(sent[0].message, Some(json!({"a": 1})));
        assert_eq!(handler.pending_count(), 0);
    }

    #[test]
    fn test_response_callback_invoked_for_matching_id() {
        let (handler, utils) = setup();
        let target = StubWindow::new();
        let target_handle = Arc::clone(&target) as WindowHandle;
        let received = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&received);
        handler
            .post(
                &target_handle,
                "command1",
                Ok(None),
                Some(Box::new(move |incoming: IncomingMessage| {
                    *slot.lock() = Some(incoming.content);
                    Ok(())
                })),
                Some(MessageId::new("id1")),
            )
            .expect("post");
        assert_eq!(handler.pending_count(), 1);

        utils.emit(
            envelope("id1", "command1", json!({"answer": 42})),
            Some(Arc::clone(&target_handle)),
        );

        assert_eq!(*received.lock(), Some(Ok(Some(json!({"answer": 42})))));
        assert_eq!(handler.pending_count(), 0);
    }

    #[test]
    fn test_response_callback_not_invoked_for_other_id() {
        let (handler, utils) = setup();
        let target = StubWindow::new() as WindowHandle;
        let invoked = Arc::new(AtomicBool::new(false));

        handler
            .post(
                &target,
                "command1",
                Ok(None),
                Some(flag_callback(Arc::clone(&invoked))),
                Some(MessageId::new("id1")),
            )
            .expect("post");

        utils.emit(envelope("anotherid", "command1", json!("")), Some(target));

        assert!(!invoked.load(Ordering::SeqCst));
        assert_eq!(handler.pending_count(), 1);
    }

    #[test]
    fn test_pending_callback_takes_precedence_over_subscriber() {
        let (handler, utils) = setup();
        let target = StubWindow::new() as WindowHandle;
        let response_invoked = Arc::new(AtomicBool::new(false));
        let subscriber_invoked = Arc::new(AtomicBool::new(false));

        handler
            .post(
                &target,
                "command1",
                Ok(None),
                Some(flag_callback(Arc::clone(&response_invoked))),
                Some(MessageId::new("id1")),
            )
            .expect("post");

        let flag = Arc::clone(&subscriber_invoked);
        handler.add_subscriber(
            "command1",
            Arc::new(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        );

        utils.emit(envelope("id1", "command1", json!({})), Some(target));

        assert!(response_invoked.load(Ordering::SeqCst));
        assert!(!subscriber_invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_subscribers_routed_by_command() {
        let (handler, utils) = setup();
        let source = StubWindow::new() as WindowHandle;
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        handler.add_subscriber(
            "command1",
            Arc::new(move |incoming: IncomingMessage| {
                assert_eq!(incoming.content, Ok(Some(json!({"x": 1}))));
                assert_eq!(incoming.responder.message_id(), &MessageId::new("id7"));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        handler.add_subscriber(
            "someother command",
            Arc::new(|_| panic!("should not call other command subscriber")),
        );

        utils.emit(envelope("id7", "command1", json!({"x": 1})), Some(source));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_subscriber_wins() {
        let (handler, utils) = setup();
        let source = StubWindow::new() as WindowHandle;
        let which = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&which);
        let second = Arc::clone(&which);
        assert!(handler.add_subscriber(
            "command1",
            Arc::new(move |_| {
                first.lock().push("first");
                Ok(())
            })
        ));
        assert!(!handler.add_subscriber(
            "command1",
            Arc::new(move |_| {
                second.lock().push("second");
                Ok(())
            })
        ));

        utils.emit(envelope("id1", "command1", json!(null)), Some(source));

        assert_eq!(*which.lock(), vec!["first"]);
    }

    #[test]
    fn test_removed_subscriber_not_called() {
        let (handler, utils) = setup();
        let source = StubWindow::new() as WindowHandle;
        let invoked = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&invoked);
        handler.add_subscriber(
            "command1",
            Arc::new(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        );
        assert!(handler.remove_subscriber("command1"));
        assert!(!handler.remove_subscriber("command1"));

        utils.emit(envelope("id1", "command1", json!(null)), Some(source));

        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failing_subscriber_notifies_source() {
        let (handler, utils) = setup();
        let source = StubWindow::new();

        handler.add_subscriber(
            "command1",
            Arc::new(|_| Err(ErrorMessageContent::new("Error", "sample error"))),
        );

        utils.emit(
            envelope("id1", "command1", json!({})),
            Some(Arc::clone(&source) as WindowHandle),
        );

        let replies = source.envelopes();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message_id, MessageId::new("id1"));
        assert_eq!(replies[0].command, "command1");
        assert!(replies[0].message.is_none());
        assert_eq!(
            replies[0].error.as_ref().map(|e| e.message.as_str()),
            Some("sample error")
        );
    }

    #[test]
    fn test_panicking_subscriber_notifies_source() {
        let (handler, utils) = setup();
        let source = StubWindow::new();

        handler.add_subscriber("command1", Arc::new(|_| panic!("subscriber exploded")));

        utils.emit(
            envelope("id1", "command1", json!({})),
            Some(Arc::clone(&source) as WindowHandle),
        );

        let replies = source.envelopes();
        assert_eq!(replies.len(), 1);
        let error = replies[0].error.clone().expect("error content");
        assert_eq!(error.name, "Panic");
        assert_eq!(error.message, "subscriber exploded");
        assert!(handler.is_initialized());
    }

    #[test]
    fn test_responder_reuses_message_id() {
        let (handler, _utils) = setup();
        let target = StubWindow::new();

        let responder = handler.create_frame_responder(
            Arc::clone(&target) as WindowHandle,
            "command1",
            MessageId::new("id1"),
        );
        responder.respond(Ok(Some(json!({"done": true})))).expect("respond");

        let sent = target.envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_id, MessageId::new("id1"));
        assert_eq!(sent[0].message, Some(json!({"done": true})));
    }

    #[test]
    fn test_invalid_and_sourceless_messages_ignored() {
        let (handler, utils) = setup();
        let invoked = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&invoked);
        handler.add_subscriber(
            "command1",
            Arc::new(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        );

        utils.emit(json!("responseMessage"), Some(StubWindow::new() as WindowHandle));
        utils.emit(json!({"messageId": "id1"}), Some(StubWindow::new() as WindowHandle));
        utils.emit(envelope("id1", "command1", json!(null)), None);

        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_pending_table_is_bounded() {
        let utils = MockWindowUtils::new();
        let handler =
            WindowMessageHandler::with_max_pending(Arc::clone(&utils) as Arc<dyn WindowUtils>, marshaller(), 1);
        handler.initialize();
        let target = StubWindow::new();
        let target_handle = Arc::clone(&target) as WindowHandle;

        handler
            .post(&target_handle, "a", Ok(None), Some(Box::new(|_| Ok(()))), None)
            .expect("first fits");
        let refused = handler.post(&target_handle, "b", Ok(None), Some(Box::new(|_| Ok(()))), None);

        assert!(matches!(refused, Err(Error::TooManyPending { pending: 1, max: 1 })));
        assert_eq!(target.envelopes().len(), 1);
    }

    #[test]
    fn test_failed_post_does_not_leave_pending_entry() {
        let (handler, _utils) = setup();
        let target = StubWindow::new();
        target.closed.store(true, Ordering::SeqCst);
        let target_handle = Arc::clone(&target) as WindowHandle;

        let result = handler.post(&target_handle, "a", Ok(None), Some(Box::new(|_| Ok(()))), None);

        assert!(matches!(result, Err(Error::WindowClosed { .. })));
        assert_eq!(handler.pending_count(), 0);
    }

    #[test]
    fn test_remove_pending_and_dispose_clear_entries() {
        let (handler, _utils) = setup();
        let target = StubWindow::new() as WindowHandle;

        let first = handler
            .post(&target, "a", Ok(None), Some(Box::new(|_| Ok(()))), None)
            .expect("post");
        handler
            .post(&target, "b", Ok(None), Some(Box::new(|_| Ok(()))), None)
            .expect("post");

        assert!(handler.remove_pending(&first));
        assert!(!handler.remove_pending(&first));
        assert_eq!(handler.pending_count(), 1);

        handler.dispose();
        assert_eq!(handler.pending_count(), 0);
    }
}
