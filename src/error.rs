//! Error types for the gateway client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use janus_client::{Result, Error};
//!
//! async fn example(handle: &Handle) -> Result<()> {
//!     handle.send_message(serde_json::json!({"audio": true}), None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | Gateway | [`Error::Protocol`] |
//! | Request | [`Error::RequestTimeout`] |
//! | Caller | [`Error::Usage`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::TransactionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    ///
    /// Returned when the connection cannot be established or a write fails.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while requests were outstanding.
    ///
    /// All pending transactions are rejected with this error as a batch
    /// when the session is torn down.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Gateway Errors
    // ========================================================================
    /// The gateway answered a request with an explicit error reply.
    ///
    /// Carries the server-provided error code and reason. Never retried
    /// automatically; surfaced to the original caller.
    #[error("Gateway error {code}: {reason}")]
    Protocol {
        /// Numeric error code from the gateway.
        code: i64,
        /// Human-readable reason from the gateway.
        reason: String,
    },

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// No reply arrived within the configured deadline.
    ///
    /// The transaction is removed from the registry, so a very late reply
    /// is silently dropped.
    #[error("Transaction {transaction} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The transaction that timed out.
        transaction: TransactionId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// Caller violated a precondition.
    ///
    /// Detected synchronously, before any network interaction, e.g.
    /// attaching an already-attached handle, or sending plugin traffic
    /// while unattached.
    #[error("Usage error: {message}")]
    Usage {
        /// Description of the violated precondition.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a gateway protocol error.
    #[inline]
    pub fn protocol(code: i64, reason: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            reason: reason.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(transaction: TransactionId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            transaction,
            timeout_ms,
        }
    }

    /// Creates a usage error.
    #[inline]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a request timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a gateway error reply.
    #[inline]
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a caller precondition violation.
    #[inline]
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
