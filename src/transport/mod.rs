//! Transport abstraction.
//!
//! The session engine is transport-agnostic: it consumes one
//! bidirectional, message-oriented connection through the [`Transport`]
//! trait and never touches sockets itself. The built-in
//! [`WebSocketTransport`] covers the gateway's WebSocket endpoint; tests
//! use channel-backed fakes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (event │          Transport           │  Gateway        │
//! │  loop task)     │◄────────────────────────────►│                 │
//! │                 │   send_raw / receive_raw     │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! The session's event loop takes exclusive ownership of the transport
//! for the lifetime of the connection and splits it into its two
//! directions, so the inbound stream can be polled concurrently with
//! outbound writes.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | WebSocket transport over `tokio-tungstenite` |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::WebSocketTransport;

// ============================================================================
// Transport
// ============================================================================

/// One established, message-oriented connection to the gateway.
///
/// Implementations hand over their two directions via [`split`];
/// connect/close lifecycle outside the session's ownership window is the
/// embedder's business.
///
/// [`split`]: Transport::split
pub trait Transport: Send + 'static {
    /// Splits the connection into its write and read halves.
    fn split(self: Box<Self>) -> (Box<dyn TransportTx>, Box<dyn TransportRx>);
}

// ============================================================================
// TransportTx
// ============================================================================

/// Write half of a transport connection.
#[async_trait]
pub trait TransportTx: Send + 'static {
    /// Writes one serialized message.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the write fails; the session treats
    /// that as fatal for the affected request, not for the connection.
    async fn send_raw(&mut self, message: String) -> Result<()>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<()>;
}

// ============================================================================
// TransportRx
// ============================================================================

/// Read half of a transport connection.
#[async_trait]
pub trait TransportRx: Send + 'static {
    /// Receives the next inbound message payload.
    ///
    /// Returns `None` once the connection is closed. Implementations
    /// must be cancel-safe: the session polls this inside a
    /// `tokio::select!` arm and may drop the future between messages.
    async fn receive_raw(&mut self) -> Option<String>;
}

// ============================================================================
// Test Fakes
// ============================================================================

#[cfg(test)]
pub(crate) mod fake {
    //! Channel-backed transport for exercising the session without a
    //! network.

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::error::{Error, Result};

    use super::{Transport, TransportRx, TransportTx};

    /// In-memory transport; the paired [`FakeGateway`] plays the remote end.
    pub(crate) struct FakeTransport {
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    }

    /// Test-side view of the fake connection.
    pub(crate) struct FakeGateway {
        /// Messages the session wrote, in order.
        pub outbound: mpsc::UnboundedReceiver<String>,
        /// Feed for inbound messages; drop to simulate remote close.
        pub inbound: Option<mpsc::UnboundedSender<String>>,
    }

    /// Creates a connected transport/gateway pair.
    pub(crate) fn fake_pair() -> (FakeTransport, FakeGateway) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        (
            FakeTransport {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            FakeGateway {
                outbound: outbound_rx,
                inbound: Some(inbound_tx),
            },
        )
    }

    impl FakeGateway {
        /// Awaits the next request the session wrote, parsed as JSON.
        pub(crate) async fn next_request(&mut self) -> Value {
            let raw = self.outbound.recv().await.expect("session wrote a request");
            serde_json::from_str(&raw).expect("session wrote valid JSON")
        }

        /// Pushes a message toward the session.
        pub(crate) fn push(&self, message: Value) {
            self.inbound
                .as_ref()
                .expect("gateway still open")
                .send(message.to_string())
                .expect("session still reading");
        }

        /// Returns an independent pusher, usable after the gateway moves
        /// into a responder task.
        pub(crate) fn pusher(&self) -> Pusher {
            Pusher(
                self.inbound
                    .as_ref()
                    .expect("gateway still open")
                    .clone(),
            )
        }

        /// Closes the gateway side of the connection.
        ///
        /// Only closes the inbound stream if no [`Pusher`] clones are
        /// still alive.
        pub(crate) fn close(&mut self) {
            self.inbound = None;
        }
    }

    /// Clonable inbound feed detached from the [`FakeGateway`].
    #[derive(Clone)]
    pub(crate) struct Pusher(mpsc::UnboundedSender<String>);

    impl Pusher {
        /// Pushes a message toward the session.
        pub(crate) fn push(&self, message: Value) {
            self.0
                .send(message.to_string())
                .expect("session still reading");
        }
    }

    impl Transport for FakeTransport {
        fn split(self: Box<Self>) -> (Box<dyn TransportTx>, Box<dyn TransportRx>) {
            (Box::new(FakeTx(self.outbound)), Box::new(FakeRx(self.inbound)))
        }
    }

    struct FakeTx(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl TransportTx for FakeTx {
        async fn send_raw(&mut self, message: String) -> Result<()> {
            self.0
                .send(message)
                .map_err(|_| Error::connection("fake transport closed"))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FakeRx(mpsc::UnboundedReceiver<String>);

    #[async_trait]
    impl TransportRx for FakeRx {
        async fn receive_raw(&mut self) -> Option<String> {
            self.0.recv().await
        }
    }
}
