//! Outgoing request message types.
//!
//! Defines the message format for requests from the client to the
//! gateway. Every request carries a verb in its `janus` field and a
//! client-generated `transaction` identifier; the remaining fields
//! depend on the verb.
//!
//! # Format
//!
//! ```json
//! {
//!   "janus": "attach",
//!   "transaction": "abc123",
//!   "session_id": 8589934592,
//!   "plugin": "janus.plugin.echotest"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::identifiers::{HandleId, SessionId, TransactionId};

// ============================================================================
// Verb
// ============================================================================

/// Request verb carried in the `janus` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// Create a new gateway session.
    Create,
    /// Attach a plugin handle to the session.
    Attach,
    /// Detach a plugin handle.
    Detach,
    /// Send a plugin-directed message body.
    Message,
    /// Deliver a trickle ICE candidate.
    Trickle,
    /// Hang up the handle's media connection without detaching.
    Hangup,
    /// Refresh the session so the gateway does not expire it.
    Keepalive,
    /// Destroy the gateway session.
    Destroy,
}

// ============================================================================
// Request
// ============================================================================

/// A request from the client to the gateway.
///
/// Optional fields are omitted from the wire when unset. The
/// `transaction` is assigned by the session's send path if the request
/// does not already carry one; `session_id` and `handle_id` are stamped
/// by the owning session and handle respectively.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Request verb.
    pub janus: Verb,

    /// Correlation identifier, assigned at send time if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionId>,

    /// Owning gateway session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    /// Target plugin handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_id: Option<HandleId>,

    /// Plugin package name (attach only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    /// Plugin-defined message body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Session description payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsep: Option<Value>,

    /// Single trickle ICE candidate, or `null` for end-of-candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<Value>,

    /// Batched trickle ICE candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Value>,
}

// ============================================================================
// Request - Constructors
// ============================================================================

impl Request {
    /// Creates a bare request for the given verb.
    #[inline]
    #[must_use]
    pub fn new(janus: Verb) -> Self {
        Self {
            janus,
            transaction: None,
            session_id: None,
            handle_id: None,
            plugin: None,
            body: None,
            jsep: None,
            candidate: None,
            candidates: None,
        }
    }

    /// Creates a session `create` request.
    #[inline]
    #[must_use]
    pub fn create() -> Self {
        Self::new(Verb::Create)
    }

    /// Creates an `attach` request for the named plugin.
    #[inline]
    #[must_use]
    pub fn attach(plugin: impl Into<String>) -> Self {
        Self {
            plugin: Some(plugin.into()),
            ..Self::new(Verb::Attach)
        }
    }

    /// Creates a `detach` request.
    #[inline]
    #[must_use]
    pub fn detach() -> Self {
        Self::new(Verb::Detach)
    }

    /// Creates a plugin `message` request with an optional jsep payload.
    #[inline]
    #[must_use]
    pub fn message(body: Value, jsep: Option<Value>) -> Self {
        Self {
            body: Some(body),
            jsep,
            ..Self::new(Verb::Message)
        }
    }

    /// Creates a `trickle` request.
    ///
    /// `candidate` may be a single candidate object, an array of
    /// candidates, or `Value::Null` as the end-of-candidates marker; all
    /// three pass through verbatim. Arrays go out in the `candidates`
    /// field per the wire protocol, everything else in `candidate`.
    #[must_use]
    pub fn trickle(candidate: Value) -> Self {
        let mut request = Self::new(Verb::Trickle);
        if candidate.is_array() {
            request.candidates = Some(candidate);
        } else {
            request.candidate = Some(candidate);
        }
        request
    }

    /// Creates a `hangup` request.
    #[inline]
    #[must_use]
    pub fn hangup() -> Self {
        Self::new(Verb::Hangup)
    }

    /// Creates a `keepalive` request.
    #[inline]
    #[must_use]
    pub fn keepalive() -> Self {
        Self::new(Verb::Keepalive)
    }

    /// Creates a session `destroy` request.
    #[inline]
    #[must_use]
    pub fn destroy() -> Self {
        Self::new(Verb::Destroy)
    }
}

// ============================================================================
// Request - Stamping
// ============================================================================

impl Request {
    /// Sets the transaction identifier.
    #[inline]
    #[must_use]
    pub fn with_transaction(mut self, transaction: TransactionId) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Stamps the owning session ID if not already set.
    #[inline]
    pub fn stamp_session(&mut self, session_id: SessionId) {
        self.session_id.get_or_insert(session_id);
    }

    /// Stamps the target handle ID if not already set.
    #[inline]
    pub fn stamp_handle(&mut self, handle_id: HandleId) {
        self.handle_id.get_or_insert(handle_id);
    }
}

// ============================================================================
// Tests
// ============================================================================
