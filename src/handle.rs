//! Plugin handles: typed proxies for attached plugin instances.
//!
//! A [`Handle`] represents one plugin instance attached to a gateway
//! session. It translates a small command surface into session-level
//! requests stamped with its gateway-assigned id, and receives the
//! asynchronous pushes addressed to that id.
//!
//! Plugin-specific behavior is supplied through the [`PluginHandler`]
//! trait, whose methods default to no-ops; bindings for a concrete
//! plugin implement `on_event` and the lifecycle hooks.
//!
//! # Example
//!
//! ```ignore
//! use janus_client::{Session, HandleEvent};
//!
//! # async fn example(session: &Session) -> janus_client::Result<()> {
//! let echo = session.handle("janus.plugin.echotest").label("echo").build();
//! echo.attach().await?;
//! echo.send_message(serde_json::json!({ "audio": true }), None).await?;
//! echo.detach().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::HandleId;
use crate::protocol::{IncomingMessage, Request, ServerEvent};
use crate::session::{Session, SessionInner};

// ============================================================================
// Constants
// ============================================================================

/// Capacity of the per-handle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// HandleState
// ============================================================================

/// Attachment lifecycle state.
///
/// Transitions: `Unattached → Attaching → Attached → Detaching →
/// Unattached`. Attach and detach are the only legal transitions;
/// plugin traffic while unattached is a usage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// No gateway-side plugin instance.
    Unattached,
    /// Attach request in flight.
    Attaching,
    /// Attached; plugin traffic allowed.
    Attached,
    /// Detach request in flight.
    Detaching,
}

// ============================================================================
// HandleEvent
// ============================================================================

/// Handle-scope notification fanned out to subscribers.
#[derive(Debug, Clone)]
pub enum HandleEvent {
    /// The handle completed attaching.
    Attached(HandleId),
    /// The handle detached, by request or by the gateway.
    Detached,
    /// An asynchronous push addressed to this handle.
    Event(ServerEvent),
}

// ============================================================================
// PluginHandler
// ============================================================================

/// Plugin-specific behavior for a [`Handle`].
///
/// All methods default to no-ops, so a binding only implements what it
/// cares about. `on_event` is invoked for every asynchronous push
/// addressed to the handle; the lifecycle hooks fire after attach and
/// detach complete.
#[async_trait]
pub trait PluginHandler: Send + Sync + 'static {
    /// Called for every push addressed to this handle.
    async fn on_event(&self, _event: ServerEvent) {}

    /// Called once the handle finished attaching.
    async fn on_attached(&self, _id: HandleId) {}

    /// Called once the handle finished detaching.
    async fn on_detached(&self) {}
}

/// The do-nothing default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl PluginHandler for NoopHandler {}

// ============================================================================
// HandleBuilder
// ============================================================================

/// Configures and builds an unattached [`Handle`].
///
/// Obtained from [`Session::handle`].
pub struct HandleBuilder {
    session: Weak<SessionInner>,
    plugin: String,
    label: Option<String>,
    handler: Option<Arc<dyn PluginHandler>>,
}

impl HandleBuilder {
    /// Creates a builder bound to a session.
    pub(crate) fn new(session: Weak<SessionInner>, plugin: String) -> Self {
        Self {
            session,
            plugin,
            label: None,
            handler: None,
        }
    }

    /// Sets a human-readable label for diagnostics.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the plugin-specific behavior.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn PluginHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Builds the handle, still unattached.
    #[must_use]
    pub fn build(self) -> Handle {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let label = self.label.unwrap_or_else(|| self.plugin.clone());

        Handle {
            inner: Arc::new(HandleInner {
                session: self.session,
                plugin: self.plugin,
                label,
                state: Mutex::new(HandleState::Unattached),
                id: Mutex::new(None),
                handler: self.handler.unwrap_or_else(|| Arc::new(NoopHandler)),
                events,
            }),
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// A proxy for one plugin instance attached to a gateway session.
///
/// Cheap to clone; clones share the same attachment state. The handle
/// holds a non-owning reference to its session; the session outlives
/// individual handles and may have many.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

/// Shared state behind a [`Handle`].
struct HandleInner {
    /// Non-owning back-reference to the owning session.
    session: Weak<SessionInner>,
    /// Plugin package name to attach to.
    plugin: String,
    /// Human-readable label for diagnostics.
    label: String,
    /// Attachment lifecycle state.
    state: Mutex<HandleState>,
    /// Gateway-assigned id; `None` before attach.
    id: Mutex<Option<HandleId>>,
    /// Plugin-specific behavior.
    handler: Arc<dyn PluginHandler>,
    /// Handle-scope event fan-out.
    events: broadcast::Sender<HandleEvent>,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("plugin", &self.inner.plugin)
            .field("label", &self.inner.label)
            .field("id", &*self.inner.id.lock())
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Handle - Accessors
// ============================================================================

impl Handle {
    /// Returns the plugin package name.
    #[inline]
    #[must_use]
    pub fn plugin(&self) -> &str {
        &self.inner.plugin
    }

    /// Returns the diagnostic label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Returns the gateway-assigned id, if attached.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<HandleId> {
        *self.inner.id.lock()
    }

    /// Returns the attachment lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> HandleState {
        *self.inner.state.lock()
    }

    /// Returns `true` if the handle is attached.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state() == HandleState::Attached
    }

    /// Subscribes to handle-scope events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<HandleEvent> {
        self.inner.events.subscribe()
    }

    /// Rebuilds the owning session facade.
    fn session(&self) -> Result<Session> {
        self.inner
            .session
            .upgrade()
            .map(Session::from_inner)
            .ok_or(Error::ConnectionClosed)
    }

    /// Returns the id, or a usage error when plugin traffic is illegal.
    fn attached_id(&self) -> Result<HandleId> {
        if self.state() != HandleState::Attached {
            return Err(Error::usage("plugin traffic requires an attached handle"));
        }
        self.id()
            .ok_or_else(|| Error::usage("plugin traffic requires an attached handle"))
    }
}

// ============================================================================
// Handle - Attach / Detach
// ============================================================================

impl Handle {
    /// Attaches the plugin instance on the gateway.
    ///
    /// On success the handle captures its assigned id, registers itself
    /// with the session's routing table, invokes
    /// [`PluginHandler::on_attached`] and publishes
    /// [`HandleEvent::Attached`] exactly once.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the handle is not unattached (checked
    ///   before any network interaction)
    /// - the [`Session::send`] rejection modes, leaving the handle
    ///   unattached
    pub async fn attach(&self) -> Result<HandleId> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                HandleState::Unattached => *state = HandleState::Attaching,
                HandleState::Attaching | HandleState::Attached => {
                    return Err(Error::usage("handle is already attached"));
                }
                HandleState::Detaching => {
                    return Err(Error::usage("handle is detaching"));
                }
            }
        }

        let attach_result = match self.session() {
            Ok(session) => {
                let result = session.send(Request::attach(self.inner.plugin.as_str())).await;
                result.map(|reply| (session, reply))
            }
            Err(e) => Err(e),
        };

        let (session, reply) = match attach_result {
            Ok(ok) => ok,
            Err(e) => {
                *self.inner.state.lock() = HandleState::Unattached;
                return Err(e);
            }
        };

        let Some(raw_id) = reply.data_id() else {
            *self.inner.state.lock() = HandleState::Unattached;
            return Err(Error::protocol(0, "attach reply carried no handle id"));
        };
        let id = HandleId::new(raw_id);

        *self.inner.id.lock() = Some(id);
        *self.inner.state.lock() = HandleState::Attached;
        session.register_handle(id, self.clone());

        debug!(plugin = %self.inner.plugin, handle_id = %id, "handle attached");

        self.inner.handler.on_attached(id).await;
        let _ = self.inner.events.send(HandleEvent::Attached(id));

        Ok(id)
    }

    /// Detaches the plugin instance.
    ///
    /// The local side always completes: the handle deregisters,
    /// transitions to unattached, invokes
    /// [`PluginHandler::on_detached`] and publishes
    /// [`HandleEvent::Detached`], even if the gateway's reply was an
    /// error, which is still returned to the caller.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the handle is not attached
    /// - the [`Session::send`] rejection modes
    pub async fn detach(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != HandleState::Attached {
                return Err(Error::usage("handle is not attached"));
            }
            *state = HandleState::Detaching;
        }

        let id = self.id();
        let result = match (self.session(), id) {
            (Ok(session), Some(id)) => {
                let mut request = Request::detach();
                request.stamp_handle(id);
                let result = session.send(request).await;
                session.unregister_handle(id);
                result.map(|_| ())
            }
            (Err(e), _) => Err(e),
            (_, None) => Err(Error::usage("handle has no id")),
        };

        self.finish_detach().await;
        result
    }
}

// ============================================================================
// Handle - Plugin Traffic
// ============================================================================

impl Handle {
    /// Low-level passthrough: sends `request` stamped with this
    /// handle's id.
    ///
    /// Exposed for advanced use; prefer the typed helpers.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the handle is not attached
    /// - the [`Session::send`] rejection modes
    pub async fn send(&self, mut request: Request) -> Result<IncomingMessage> {
        let id = self.attached_id()?;
        request.stamp_handle(id);
        self.session()?.send(request).await
    }

    /// Sends a plugin message body, optionally with a session
    /// description payload.
    pub async fn send_message(&self, body: Value, jsep: Option<Value>) -> Result<IncomingMessage> {
        self.send(Request::message(body, jsep)).await
    }

    /// Sends a session description with an empty body.
    pub async fn send_jsep(&self, jsep: Value) -> Result<IncomingMessage> {
        self.send_message(json!({}), Some(jsep)).await
    }

    /// Sends a trickle ICE candidate notification.
    ///
    /// `candidate` may be a single candidate object, an array, or
    /// `Value::Null` as the end-of-candidates marker; all pass through
    /// verbatim.
    pub async fn send_trickle(&self, candidate: Value) -> Result<IncomingMessage> {
        self.send(Request::trickle(candidate)).await
    }

    /// Hangs up the media connection without detaching the handle.
    pub async fn hangup(&self) -> Result<()> {
        self.send(Request::hangup()).await.map(|_| ())
    }
}

// ============================================================================
// Handle - Dispatch (session-internal)
// ============================================================================

impl Handle {
    /// Delivers one asynchronous push addressed to this handle.
    ///
    /// Called by the session's event loop. Publishes the typed event to
    /// subscribers, then invokes the [`PluginHandler::on_event`] hook.
    pub(crate) async fn deliver(&self, message: IncomingMessage) {
        let event = message.parse_event();
        let _ = self.inner.events.send(HandleEvent::Event(event.clone()));
        self.inner.handler.on_event(event).await;
    }

    /// Completes a detach: resets state, fires the hook and the
    /// notification.
    ///
    /// Used both for caller-initiated detach and for the gateway's
    /// `detached` push.
    pub(crate) async fn finish_detach(&self) {
        *self.inner.state.lock() = HandleState::Unattached;
        *self.inner.id.lock() = None;

        debug!(plugin = %self.inner.plugin, "handle detached");

        self.inner.handler.on_detached().await;
        let _ = self.inner.events.send(HandleEvent::Detached);
    }

    /// Resets attachment state on session teardown.
    ///
    /// No hook here: the session is gone, there is nothing left for a
    /// handler to act on. Subscribers still learn about the detach.
    pub(crate) fn reset_on_close(&self) {
        *self.inner.state.lock() = HandleState::Unattached;
        *self.inner.id.lock() = None;
        let _ = self.inner.events.send(HandleEvent::Detached);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::options::SessionOptions;
    use crate::transport::fake::{FakeGateway, Pusher, fake_pair};

    /// Handler that records everything it sees.
    struct RecordingHandler {
        events: mpsc::UnboundedSender<ServerEvent>,
        lifecycle: mpsc::UnboundedSender<&'static str>,
    }

    impl RecordingHandler {
        fn new() -> (
            Arc<Self>,
            mpsc::UnboundedReceiver<ServerEvent>,
            mpsc::UnboundedReceiver<&'static str>,
        ) {
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    events: events_tx,
                    lifecycle: lifecycle_tx,
                }),
                events_rx,
                lifecycle_rx,
            )
        }
    }

    #[async_trait]
    impl PluginHandler for RecordingHandler {
        async fn on_event(&self, event: ServerEvent) {
            let _ = self.events.send(event);
        }

        async fn on_attached(&self, _id: HandleId) {
            let _ = self.lifecycle.send("attached");
        }

        async fn on_detached(&self) {
            let _ = self.lifecycle.send("detached");
        }
    }

    fn connected() -> (Session, FakeGateway) {
        let (transport, gateway) = fake_pair();
        let options = SessionOptions::new().with_request_timeout(Duration::from_millis(500));
        (Session::new(Box::new(transport), options), gateway)
    }

    /// Plays the gateway: answers every request, assigning handle ids
    /// from 42 upward.
    fn spawn_responder(mut gateway: FakeGateway) -> Pusher {
        let pusher = gateway.pusher();
        let reply = gateway.pusher();

        tokio::spawn(async move {
            let mut next_handle_id = 42u64;
            while let Some(raw) = gateway.outbound.recv().await {
                let request: serde_json::Value =
                    serde_json::from_str(&raw).expect("valid request");
                let transaction = request["transaction"].as_str().expect("transaction");

                match request["janus"].as_str().expect("verb") {
                    "create" => reply.push(json!({
                        "janus": "success",
                        "transaction": transaction,
                        "data": { "id": 111 }
                    })),
                    "attach" => {
                        let id = next_handle_id;
                        next_handle_id += 1;
                        reply.push(json!({
                            "janus": "success",
                            "transaction": transaction,
                            "data": { "id": id }
                        }));
                    }
                    "detach" | "hangup" | "destroy" => reply.push(json!({
                        "janus": "success",
                        "transaction": transaction
                    })),
                    _ => reply.push(json!({
                        "janus": "ack",
                        "transaction": transaction
                    })),
                }
            }
        });

        pusher
    }

    async fn recv_handle_event(rx: &mut broadcast::Receiver<HandleEvent>) -> HandleEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_attach_detach_round_trip() {
        let (session, gateway) = connected();
        let _pusher = spawn_responder(gateway);

        let (handler, _events, mut lifecycle) = RecordingHandler::new();
        let handle = session
            .handle("janus.plugin.echotest")
            .label("echo")
            .handler(handler)
            .build();
        let mut notifications = handle.events();

        assert_eq!(handle.state(), HandleState::Unattached);

        let id = handle.attach().await.expect("attach");
        assert_eq!(id, HandleId::new(42));
        assert!(handle.is_attached());
        assert_eq!(handle.id(), Some(id));
        assert_eq!(session.handle_count(), 1);
        assert_eq!(lifecycle.recv().await, Some("attached"));
        assert!(matches!(
            recv_handle_event(&mut notifications).await,
            HandleEvent::Attached(got) if got == id
        ));

        handle.detach().await.expect("detach");
        assert!(!handle.is_attached());
        assert_eq!(handle.id(), None);
        assert_eq!(session.handle_count(), 0);
        assert_eq!(lifecycle.recv().await, Some("detached"));
        assert!(matches!(
            recv_handle_event(&mut notifications).await,
            HandleEvent::Detached
        ));

        // Exactly once each: nothing further is pending.
        assert!(notifications.try_recv().is_err());
        assert!(lifecycle.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_attach_error_reply_leaves_unattached() {
        let (session, mut gateway) = connected();

        let handle = session.handle("janus.plugin.videoroom").build();
        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.attach().await }
        });

        let request = gateway.next_request().await;
        assert_eq!(request["janus"], "attach");
        assert_eq!(request["plugin"], "janus.plugin.videoroom");
        gateway.push(json!({
            "janus": "error",
            "transaction": request["transaction"],
            "error": { "code": 460, "reason": "No such plugin" }
        }));

        let err = pending.await.expect("task").expect_err("attach rejected");
        assert!(matches!(err, Error::Protocol { code: 460, .. }));
        assert_eq!(handle.state(), HandleState::Unattached);
        assert_eq!(session.handle_count(), 0);

        // The handle is reusable after a failed attach.
        let retry = tokio::spawn({
            let handle = handle.clone();
            async move { handle.attach().await }
        });
        let request = gateway.next_request().await;
        gateway.push(json!({
            "janus": "success",
            "transaction": request["transaction"],
            "data": { "id": 42 }
        }));
        retry.await.expect("task").expect("attach succeeds");
        assert!(handle.is_attached());
    }

    #[tokio::test]
    async fn test_attach_twice_is_synchronous_usage_error() {
        let (session, mut gateway) = connected();

        let handle = session.handle("janus.plugin.echotest").build();
        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.attach().await }
        });

        let request = gateway.next_request().await;
        gateway.push(json!({
            "janus": "success",
            "transaction": request["transaction"],
            "data": { "id": 42 }
        }));
        pending.await.expect("task").expect("first attach");

        let err = handle.attach().await.expect_err("second attach");
        assert!(err.is_usage());

        // Nothing went over the wire for the rejected attach.
        assert!(gateway.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_plugin_traffic_before_attach_is_usage_error() {
        let (session, gateway) = connected();

        let handle = session.handle("janus.plugin.echotest").build();
        let err = handle
            .send_message(json!({ "audio": true }), None)
            .await
            .expect_err("unattached");
        assert!(err.is_usage());

        let err = handle.hangup().await.expect_err("unattached");
        assert!(err.is_usage());

        drop(gateway);
    }

    #[tokio::test]
    async fn test_push_routed_to_owning_handle_only() {
        let (session, gateway) = connected();
        let mut session_events = session.events();
        let pusher = spawn_responder(gateway);

        let (handler_a, mut events_a, _lifecycle_a) = RecordingHandler::new();
        let (handler_b, mut events_b, _lifecycle_b) = RecordingHandler::new();

        let handle_a = session
            .handle("janus.plugin.echotest")
            .handler(handler_a)
            .build();
        let handle_b = session
            .handle("janus.plugin.echotest")
            .handler(handler_b)
            .build();

        let id_a = handle_a.attach().await.expect("attach a");
        let id_b = handle_b.attach().await.expect("attach b");
        assert_ne!(id_a, id_b);

        pusher.push(json!({
            "janus": "event",
            "sender": id_a.as_u64(),
            "plugindata": {
                "plugin": "janus.plugin.echotest",
                "data": { "result": "ok" }
            }
        }));
        // Session-scope sentinel: once it arrives, the push above has
        // already been dispatched.
        pusher.push(json!({ "janus": "timeout" }));

        let event = timeout(Duration::from_secs(2), events_a.recv())
            .await
            .expect("delivered")
            .expect("open");
        assert!(matches!(event, ServerEvent::Plugin { ref data, .. } if data["result"] == "ok"));

        match timeout(Duration::from_secs(2), session_events.recv())
            .await
            .expect("sentinel")
            .expect("open")
        {
            crate::session::SessionEvent::Gateway(message) => {
                assert!(message.sender.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The other handle and the session channel saw nothing of the push.
        assert!(events_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_hangup_does_not_detach() {
        let (session, gateway) = connected();
        let _pusher = spawn_responder(gateway);

        let handle = session.handle("janus.plugin.echotest").build();
        handle.attach().await.expect("attach");

        handle.hangup().await.expect("hangup");
        assert!(handle.is_attached());
        assert_eq!(session.handle_count(), 1);
    }

    #[tokio::test]
    async fn test_send_message_wire_shape() {
        let (session, mut gateway) = connected();

        let handle = session.handle("janus.plugin.echotest").build();
        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.attach().await }
        });
        let request = gateway.next_request().await;
        gateway.push(json!({
            "janus": "success",
            "transaction": request["transaction"],
            "data": { "id": 42 }
        }));
        pending.await.expect("task").expect("attach");

        let pending = tokio::spawn({
            let handle = handle.clone();
            async move {
                handle
                    .send_message(json!({ "request": "start" }), Some(json!({ "type": "offer" })))
                    .await
            }
        });

        let request = gateway.next_request().await;
        assert_eq!(request["janus"], "message");
        assert_eq!(request["handle_id"], 42);
        assert_eq!(request["body"]["request"], "start");
        assert_eq!(request["jsep"]["type"], "offer");

        gateway.push(json!({ "janus": "ack", "transaction": request["transaction"] }));
        pending.await.expect("task").expect("ack");
    }

    #[tokio::test]
    async fn test_send_trickle_end_of_candidates() {
        let (session, mut gateway) = connected();

        let handle = session.handle("janus.plugin.echotest").build();
        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.attach().await }
        });
        let request = gateway.next_request().await;
        gateway.push(json!({
            "janus": "success",
            "transaction": request["transaction"],
            "data": { "id": 42 }
        }));
        pending.await.expect("task").expect("attach");

        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.send_trickle(Value::Null).await }
        });

        let request = gateway.next_request().await;
        assert_eq!(request["janus"], "trickle");
        assert!(request.get("candidate").is_some());
        assert_eq!(request["candidate"], Value::Null);

        gateway.push(json!({ "janus": "ack", "transaction": request["transaction"] }));
        pending.await.expect("task").expect("ack");
    }

    #[tokio::test]
    async fn test_gateway_initiated_detach() {
        let (session, gateway) = connected();
        let pusher = spawn_responder(gateway);

        let (handler, mut events, mut lifecycle) = RecordingHandler::new();
        let handle = session
            .handle("janus.plugin.echotest")
            .handler(handler)
            .build();
        let id = handle.attach().await.expect("attach");
        assert_eq!(lifecycle.recv().await, Some("attached"));

        pusher.push(json!({ "janus": "detached", "sender": id.as_u64() }));

        // The push reaches the event hook, then the lifecycle completes.
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("delivered")
            .expect("open");
        assert!(matches!(event, ServerEvent::Detached));
        assert_eq!(lifecycle.recv().await, Some("detached"));

        assert!(!handle.is_attached());
        assert_eq!(session.handle_count(), 0);

        let err = handle.hangup().await.expect_err("detached handle");
        assert!(err.is_usage());
    }

    #[tokio::test]
    async fn test_session_teardown_resets_handles() {
        let (session, gateway) = connected();
        let _pusher = spawn_responder(gateway);

        let handle = session.handle("janus.plugin.echotest").build();
        handle.attach().await.expect("attach");
        let mut notifications = handle.events();

        session.close().await;

        assert!(matches!(
            recv_handle_event(&mut notifications).await,
            HandleEvent::Detached
        ));
        assert!(!handle.is_attached());
    }
}
