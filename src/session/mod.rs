//! Gateway session: transport owner, correlation, and message routing.
//!
//! A [`Session`] is the single owner of one transport connection and the
//! sole point of transaction-id assignment and incoming-message
//! classification. It spawns an event loop task that handles:
//!
//! - Outgoing requests from callers (session methods and handle proxies)
//! - Incoming replies, resolved against the pending-transaction registry
//! - Incoming pushes, routed to the attached handle named by `sender`
//! - Session-scope notifications, fanned out to subscribers
//!
//! # Classification
//!
//! Incoming messages are classified once each, in priority order:
//!
//! 1. `transaction` matches a pending request → settle that request
//! 2. `sender` matches an attached handle → deliver to that handle
//! 3. otherwise → session-level event for subscribers
//!
//! Unroutable or malformed messages are logged and dropped; nothing on
//! the dispatch path is allowed to take the session down.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `transactions` | Pending-transaction registry |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::handle::{Handle, HandleBuilder};
use crate::identifiers::{HandleId, SessionId, TransactionId};
use crate::options::SessionOptions;
use crate::protocol::{IncomingMessage, MessageKind, Request};
use crate::transport::Transport;

// ============================================================================
// Submodules
// ============================================================================

pub(crate) mod transactions;

use transactions::TransactionRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Capacity of the session-level event channel.
///
/// Slow subscribers that fall further behind than this lose the oldest
/// events, not the session.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// SessionState
// ============================================================================

/// Connection lifecycle state.
///
/// Transitions: `Connected → Closing → Disconnected`. Pending
/// transactions and handle dispatch are only valid in `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport attached, event loop running.
    Connected,
    /// Close requested, teardown in progress.
    Closing,
    /// Event loop terminated; all pending work rejected.
    Disconnected,
}

// ============================================================================
// SessionEvent
// ============================================================================

/// Session-scope notification fanned out to subscribers.
///
/// Publishing with zero subscribers is not an error; events are simply
/// dropped.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A gateway push not addressed to any attached handle.
    Gateway(IncomingMessage),

    /// A keepalive failed or timed out.
    ///
    /// Health signal only. The transport is left open; closing it is
    /// the embedder's policy decision.
    KeepaliveFailed {
        /// Description of the failure.
        reason: String,
    },

    /// The session was torn down and all pending requests rejected.
    Closed,
}

// ============================================================================
// LoopCommand
// ============================================================================

/// Internal commands for the event loop.
enum LoopCommand {
    /// Write a registered request to the transport.
    Send {
        transaction: TransactionId,
        payload: String,
    },
    /// Close the transport and tear down.
    Shutdown { done: oneshot::Sender<()> },
}

// ============================================================================
// Session
// ============================================================================

/// A client session against the gateway.
///
/// Cheap to clone; clones share the same connection. The session owns
/// the transport exclusively for its lifetime; callers interact only
/// through [`send`](Session::send) and the handle registration contract.
///
/// # Thread Safety
///
/// `Session` is `Send + Sync` and can be shared across tasks. All
/// operations are non-blocking; callers of `send` suspend until a
/// matching reply arrives, a timeout fires, or the session closes.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

/// Shared state behind a [`Session`].
pub(crate) struct SessionInner {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<LoopCommand>,
    /// Pending-transaction registry (shared with the event loop).
    transactions: TransactionRegistry,
    /// Attached handles by gateway-assigned id (shared with the event loop).
    handles: Arc<Mutex<FxHashMap<HandleId, Handle>>>,
    /// Session-level event fan-out.
    events: broadcast::Sender<SessionEvent>,
    /// Lifecycle state (shared with the event loop).
    state: Arc<Mutex<SessionState>>,
    /// Gateway-assigned session id, set by `create`.
    session_id: Mutex<Option<SessionId>>,
    /// Background keepalive task, at most one per connected session.
    keepalive: Mutex<Option<JoinHandle<()>>>,
    /// Timing configuration.
    options: SessionOptions,
}

// ============================================================================
// Session - Constructor
// ============================================================================

impl Session {
    /// Takes ownership of an established transport and starts the
    /// event loop.
    ///
    /// The session starts in [`SessionState::Connected`]; call
    /// [`create`](Session::create) to obtain a gateway session before
    /// attaching handles.
    #[must_use]
    pub fn new(transport: Box<dyn Transport>, options: SessionOptions) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let transactions = TransactionRegistry::new();
        let handles = Arc::new(Mutex::new(FxHashMap::default()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(Mutex::new(SessionState::Connected));

        tokio::spawn(run_event_loop(
            transport,
            command_rx,
            transactions.clone(),
            Arc::clone(&handles),
            events.clone(),
            Arc::clone(&state),
        ));

        Self {
            inner: Arc::new(SessionInner {
                command_tx,
                transactions,
                handles,
                events,
                state,
                session_id: Mutex::new(None),
                keepalive: Mutex::new(None),
                options,
            }),
        }
    }

    /// Rebuilds a facade from shared state (handle back-references).
    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Returns the gateway-assigned session id, if created.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        *self.inner.session_id.lock()
    }

    /// Returns the number of in-flight requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.transactions.len()
    }

    /// Returns the number of attached handles.
    #[inline]
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.inner.handles.lock().len()
    }

    /// Subscribes to session-level events.
    ///
    /// Each subscriber gets every event published after subscribing.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Starts building an unattached handle for the named plugin.
    #[must_use]
    pub fn handle(&self, plugin: impl Into<String>) -> HandleBuilder {
        HandleBuilder::new(Arc::downgrade(&self.inner), plugin.into())
    }
}

// ============================================================================
// Session - Send Path
// ============================================================================

impl Session {
    /// Sends a request and awaits the correlated reply, with the
    /// configured default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the session is not connected
    /// - [`Error::RequestTimeout`] if no reply arrives in time
    /// - [`Error::Protocol`] if the gateway answers with an error reply
    pub async fn send(&self, request: Request) -> Result<IncomingMessage> {
        self.send_with_timeout(request, self.inner.options.request_timeout)
            .await
    }

    /// Sends a request and awaits the correlated reply with a custom
    /// timeout.
    ///
    /// Assigns a transaction identifier if the request does not already
    /// carry one, and stamps the gateway session id once known.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Session::send); additionally [`Error::Usage`] if
    /// the request carries a transaction id that is already pending.
    pub async fn send_with_timeout(
        &self,
        mut request: Request,
        request_timeout: Duration,
    ) -> Result<IncomingMessage> {
        if self.state() != SessionState::Connected {
            return Err(Error::ConnectionClosed);
        }

        if let Some(session_id) = self.session_id() {
            request.stamp_session(session_id);
        }

        let (transaction, reply_rx) = self
            .inner
            .transactions
            .register(request.transaction.take())?;
        request.transaction = Some(transaction.clone());

        let payload = match serde_json::to_string(&request) {
            Ok(payload) => payload,
            Err(e) => {
                self.inner.transactions.discard(&transaction);
                return Err(Error::Json(e));
            }
        };

        let command = LoopCommand::Send {
            transaction: transaction.clone(),
            payload,
        };
        if self.inner.command_tx.send(command).is_err() {
            self.inner.transactions.discard(&transaction);
            return Err(Error::ConnectionClosed);
        }

        match timeout(request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Timeout. Remove the entry so a late reply is dropped.
                self.inner.transactions.discard(&transaction);
                Err(Error::request_timeout(
                    transaction,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }
}

// ============================================================================
// Session - Gateway Lifecycle
// ============================================================================

impl Session {
    /// Creates the gateway session and starts the keepalive task.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the session was already created
    /// - [`Error::Protocol`] if the reply carries no session id
    /// - plus the usual [`send`](Session::send) rejection modes
    pub async fn create(&self) -> Result<SessionId> {
        if self.session_id().is_some() {
            return Err(Error::usage("session already created"));
        }

        let reply = self.send(Request::create()).await?;
        let session_id = reply
            .data_id()
            .map(SessionId::new)
            .ok_or_else(|| Error::protocol(0, "create reply carried no session id"))?;

        *self.inner.session_id.lock() = Some(session_id);
        self.start_keepalive();

        debug!(%session_id, "gateway session created");
        Ok(session_id)
    }

    /// Destroys the gateway session and closes the connection.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] if the session was never created
    /// - plus the usual [`send`](Session::send) rejection modes; the
    ///   local teardown happens regardless
    pub async fn destroy(&self) -> Result<()> {
        if self.session_id().is_none() {
            return Err(Error::usage("session was never created"));
        }

        self.stop_keepalive();
        let result = self.send(Request::destroy()).await.map(|_| ());
        *self.inner.session_id.lock() = None;
        self.close().await;

        result
    }

    /// Force-closes the session.
    ///
    /// Rejects every pending transaction with
    /// [`Error::ConnectionClosed`] as one batch, resets all attached
    /// handles, publishes [`SessionEvent::Closed`] and returns once the
    /// event loop has torn down. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != SessionState::Connected {
                return;
            }
            *state = SessionState::Closing;
        }

        self.stop_keepalive();

        let (done_tx, done_rx) = oneshot::channel();
        if self
            .inner
            .command_tx
            .send(LoopCommand::Shutdown { done: done_tx })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }
}

// ============================================================================
// Session - Keepalive
// ============================================================================

impl Session {
    /// Starts the periodic keepalive task, replacing any existing one.
    fn start_keepalive(&self) {
        self.stop_keepalive();

        let weak = Arc::downgrade(&self.inner);
        let keepalive_interval = self.inner.options.keepalive_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval(keepalive_interval);
            // The first tick fires immediately; the session was just active.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else { break };
                let session = Session::from_inner(inner);
                if session.state() != SessionState::Connected {
                    break;
                }

                if let Err(e) = session.send(Request::keepalive()).await {
                    warn!(error = %e, "keepalive failed");
                    let _ = session.inner.events.send(SessionEvent::KeepaliveFailed {
                        reason: e.to_string(),
                    });
                }
            }
        });

        *self.inner.keepalive.lock() = Some(task);
    }

    /// Stops the keepalive task if one is running.
    fn stop_keepalive(&self) {
        if let Some(task) = self.inner.keepalive.lock().take() {
            task.abort();
        }
    }
}

// ============================================================================
// Session - Handle Bookkeeping
// ============================================================================

impl Session {
    /// Registers an attached handle under its gateway-assigned id.
    pub(crate) fn register_handle(&self, id: HandleId, handle: Handle) {
        self.inner.handles.lock().insert(id, handle);
        trace!(handle_id = %id, "handle registered");
    }

    /// Removes a handle from the routing table.
    pub(crate) fn unregister_handle(&self, id: HandleId) {
        if self.inner.handles.lock().remove(&id).is_some() {
            trace!(handle_id = %id, "handle unregistered");
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Event loop owning the transport for the session's lifetime.
async fn run_event_loop(
    transport: Box<dyn Transport>,
    mut command_rx: mpsc::UnboundedReceiver<LoopCommand>,
    transactions: TransactionRegistry,
    handles: Arc<Mutex<FxHashMap<HandleId, Handle>>>,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<Mutex<SessionState>>,
) {
    let (mut transport_tx, mut transport_rx) = transport.split();
    let mut shutdown_ack = None;

    loop {
        tokio::select! {
            // Inbound messages from the gateway
            inbound = transport_rx.receive_raw() => {
                match inbound {
                    Some(text) => {
                        dispatch_incoming(&text, &transactions, &handles, &events).await;
                    }
                    None => {
                        debug!("transport closed by remote");
                        break;
                    }
                }
            }

            // Commands from the session facade
            command = command_rx.recv() => {
                match command {
                    Some(LoopCommand::Send { transaction, payload }) => {
                        if let Err(e) = transport_tx.send_raw(payload).await {
                            // Notify the registered caller; the write failed
                            // before anything went out.
                            transactions.fail(&transaction, Error::connection(e.to_string()));
                        } else {
                            trace!(%transaction, "request sent");
                        }
                    }

                    Some(LoopCommand::Shutdown { done }) => {
                        debug!("shutdown command received");
                        let _ = transport_tx.close().await;
                        shutdown_ack = Some(done);
                        break;
                    }

                    None => {
                        debug!("command channel closed");
                        break;
                    }
                }
            }
        }
    }

    // Teardown: one consistent batch, no partial state.
    *state.lock() = SessionState::Disconnected;
    transactions.fail_all();

    let orphaned: Vec<Handle> = handles.lock().drain().map(|(_, handle)| handle).collect();
    for handle in orphaned {
        handle.reset_on_close();
    }

    let _ = events.send(SessionEvent::Closed);

    if let Some(done) = shutdown_ack {
        let _ = done.send(());
    }

    debug!("session event loop terminated");
}

/// Classifies and dispatches one inbound message.
async fn dispatch_incoming(
    text: &str,
    transactions: &TransactionRegistry,
    handles: &Arc<Mutex<FxHashMap<HandleId, Handle>>>,
    events: &broadcast::Sender<SessionEvent>,
) {
    let message: IncomingMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "failed to parse incoming message, dropping");
            return;
        }
    };

    // 1. Reply to a pending transaction.
    let transaction = message.transaction.clone();
    let message = match transaction {
        Some(transaction) => match transactions.resolve(&transaction, message) {
            None => return,
            Some(unclaimed) => unclaimed,
        },
        None => message,
    };

    // 2. Push addressed to an attached handle.
    if let Some(sender) = message.sender {
        let handle = handles.lock().get(&sender).cloned();

        if let Some(handle) = handle {
            let gateway_detached = message.janus == MessageKind::Detached;
            handle.deliver(message).await;

            if gateway_detached {
                handles.lock().remove(&sender);
                handle.finish_detach().await;
            }
            return;
        }

        debug!(sender = %sender, "push for unknown handle dropped");
        return;
    }

    // 3. Late reply for a transaction that already settled or timed out.
    if message.transaction.is_some()
        && matches!(
            message.janus,
            MessageKind::Success | MessageKind::Ack | MessageKind::Error
        )
    {
        trace!("late reply dropped");
        return;
    }

    // 4. Session-scope notification.
    let _ = events.send(SessionEvent::Gateway(message));
}

// ============================================================================
// Tests
// ============================================================================
