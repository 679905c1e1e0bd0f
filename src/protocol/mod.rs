//! Wire protocol message types.
//!
//! This module defines the JSON message format spoken with the gateway.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Request`] | Client → Gateway | Verb-tagged command |
//! | [`IncomingMessage`] | Gateway → Client | Reply or asynchronous push |
//!
//! Replies are correlated to requests by the echoed `transaction` field;
//! pushes carry a `sender` handle ID instead. Classification lives in
//! the session, not here.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | Outgoing [`Request`] and [`Verb`] |
//! | `message` | Incoming message envelope and payloads |
//! | `event` | Typed [`ServerEvent`] view of pushes |

// ============================================================================
// Submodules
// ============================================================================

/// Typed server event view.
pub mod event;

/// Incoming message envelope.
pub mod message;

/// Outgoing request types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::ServerEvent;
pub use message::{GatewayError, IncomingMessage, MessageKind, PluginData};
pub use request::{Request, Verb};
