//! Incoming message types.
//!
//! Everything the gateway sends arrives as one JSON shape, discriminated
//! by the `janus` field. A message with a `transaction` matching a
//! pending request is a reply; a message with a `sender` is addressed to
//! an attached handle; anything else is a session-scope notification.
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `success` | positive reply, payload in `data` or `plugindata` |
//! | `ack` | reply acknowledging receipt (message/trickle/keepalive) |
//! | `error` | negative reply, payload in `error.code`/`error.reason` |
//! | `event` and friends | asynchronous push, see [`ServerEvent`](super::ServerEvent) |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{HandleId, SessionId, TransactionId};

// ============================================================================
// MessageKind
// ============================================================================

/// Discriminator carried in the `janus` field of incoming messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Positive reply.
    Success,
    /// Receipt acknowledgment reply.
    Ack,
    /// Negative reply.
    Error,
    /// Plugin event push.
    Event,
    /// PeerConnection is up.
    Webrtcup,
    /// PeerConnection was hung up.
    Hangup,
    /// Media started or stopped flowing.
    Media,
    /// The gateway reports packet loss.
    Slowlink,
    /// Trickle candidate from the remote side.
    Trickle,
    /// The gateway detached the handle.
    Detached,
    /// The gateway expired the session.
    Timeout,
    /// Any kind this client does not model.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// GatewayError
// ============================================================================

/// Error payload of an `error` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable reason.
    pub reason: String,
}

// ============================================================================
// PluginData
// ============================================================================

/// Plugin payload of a plugin event or synchronous plugin reply.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginData {
    /// Originating plugin package name.
    pub plugin: String,
    /// Plugin-defined payload.
    #[serde(default)]
    pub data: Value,
}

// ============================================================================
// IncomingMessage
// ============================================================================

/// A message from the gateway, reply or push.
///
/// # Format
///
/// Reply:
/// ```json
/// { "janus": "success", "transaction": "t1", "data": { "id": 42 } }
/// ```
///
/// Push:
/// ```json
/// { "janus": "event", "sender": 42,
///   "plugindata": { "plugin": "janus.plugin.echotest", "data": {} } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    /// Message kind.
    pub janus: MessageKind,

    /// Echoed correlation identifier (replies only).
    #[serde(default)]
    pub transaction: Option<TransactionId>,

    /// Owning gateway session.
    #[serde(default)]
    pub session_id: Option<SessionId>,

    /// Originating handle (pushes addressed to a handle).
    #[serde(default)]
    pub sender: Option<HandleId>,

    /// Gateway payload of a `success` reply.
    #[serde(default)]
    pub data: Option<Value>,

    /// Plugin payload.
    #[serde(default)]
    pub plugindata: Option<PluginData>,

    /// Session description payload.
    #[serde(default)]
    pub jsep: Option<Value>,

    /// Error payload of an `error` reply.
    #[serde(default)]
    pub error: Option<GatewayError>,

    /// Kind-specific fields not modeled above (hangup reason,
    /// media type, slowlink counters, trickle candidate).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// IncomingMessage - Predicates
// ============================================================================

impl IncomingMessage {
    /// Returns `true` if this is an `error` reply.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.janus == MessageKind::Error
    }

    /// Returns `true` if this is an `ack` reply.
    #[inline]
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.janus == MessageKind::Ack
    }
}

// ============================================================================
// IncomingMessage - Accessors
// ============================================================================

impl IncomingMessage {
    /// Converts a reply into a result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] carrying the gateway's code and reason
    /// if the reply was an `error`.
    pub fn into_result(self) -> Result<Self> {
        if self.is_error() {
            let (code, reason) = match self.error {
                Some(e) => (e.code, e.reason),
                None => (0, "unknown gateway error".to_string()),
            };
            return Err(Error::protocol(code, reason));
        }
        Ok(self)
    }

    /// Gets the `id` field of the `data` payload.
    ///
    /// This is where `create` and `attach` replies carry the assigned
    /// identifier.
    #[inline]
    #[must_use]
    pub fn data_id(&self) -> Option<u64> {
        self.data
            .as_ref()
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_u64())
    }

    /// Gets a string from the kind-specific fields.
    ///
    /// Returns an empty string if the key is missing or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.extra
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a u64 from the kind-specific fields.
    ///
    /// Returns 0 if the key is missing or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.extra
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }

    /// Gets a boolean from the kind-specific fields.
    ///
    /// Returns false if the key is missing or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.extra
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
