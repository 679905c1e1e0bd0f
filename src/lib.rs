//! Janus gateway client - async signaling protocol engine.
//!
//! This library multiplexes one bidirectional gateway connection into
//! many concurrent logical request/response exchanges, and fans
//! server-pushed events out to the attached plugin handle they belong
//! to.
//!
//! # Architecture
//!
//! The client follows the gateway's session model:
//!
//! - **[`Session`]**: owns the transport, correlates every reply to the
//!   request awaiting it, routes pushes, keeps the session alive
//! - **[`Handle`]**: proxy for one attached plugin instance, layered
//!   entirely on [`Session::send`]
//!
//! Key design principles:
//!
//! - One event-loop task per session owns the socket; callers never
//!   block it, they suspend on their own reply channel
//! - Replies arrive in any order; correlation is by transaction id,
//!   never by position
//! - A failed or unroutable inbound message is logged and dropped; the
//!   dispatch path other requests depend on must not die
//!
//! # Quick Start
//!
//! ```no_run
//! use janus_client::{Session, SessionOptions, WebSocketTransport, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to the gateway and create a session
//!     let transport = WebSocketTransport::connect("ws://127.0.0.1:8188/janus").await?;
//!     let session = Session::new(Box::new(transport), SessionOptions::default());
//!     session.create().await?;
//!
//!     // Attach a plugin handle and talk to it
//!     let echo = session.handle("janus.plugin.echotest").label("echo").build();
//!     echo.attach().await?;
//!     echo.send_message(serde_json::json!({ "audio": true }), None).await?;
//!
//!     echo.detach().await?;
//!     session.destroy().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`handle`] | Plugin handle proxy and [`PluginHandler`] trait |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`options`] | Session timing configuration |
//! | [`protocol`] | Wire message types |
//! | [`session`] | Session, correlation and routing engine |
//! | [`transport`] | Transport trait and WebSocket implementation |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Plugin handle proxy.
///
/// Use [`Session::handle`] to build a [`Handle`]; implement
/// [`PluginHandler`] for plugin-specific behavior.
pub mod handle;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Session timing configuration.
pub mod options;

/// Wire protocol message types.
///
/// Request/reply/push structures exchanged with the gateway.
pub mod protocol;

/// Session engine: correlation, routing, keepalive.
pub mod session;

/// Transport layer.
///
/// The [`Transport`] seam and the built-in WebSocket implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Handle types
pub use handle::{Handle, HandleBuilder, HandleEvent, HandleState, NoopHandler, PluginHandler};

// Identifier types
pub use identifiers::{HandleId, SessionId, TransactionId};

// Options
pub use options::SessionOptions;

// Protocol types
pub use protocol::{GatewayError, IncomingMessage, MessageKind, PluginData, Request, ServerEvent, Verb};

// Session types
pub use session::{Session, SessionEvent, SessionState};

// Transport types
pub use transport::{Transport, TransportRx, TransportTx, WebSocketTransport};
