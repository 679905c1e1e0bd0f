//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time:
//! a [`HandleId`] cannot be passed where a [`SessionId`] is expected,
//! even though both are integers on the wire.
//!
//! | Type | Wire form | Assigned by |
//! |------|-----------|-------------|
//! | [`TransactionId`] | string | client |
//! | [`SessionId`] | integer | gateway |
//! | [`HandleId`] | integer | gateway |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// TransactionId
// ============================================================================

/// Unique identifier correlating one request with its reply.
///
/// Generated client-side; opaque to the gateway, which echoes it back
/// verbatim in the matching reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generates a new random transaction ID.
    ///
    /// Uniqueness among in-flight transactions is enforced by the
    /// registry at registration time, not here.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps an existing identifier string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Gateway-assigned session identifier.
///
/// Returned in the `create` reply and stamped on every subsequent
/// request belonging to that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a session ID from its wire value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// HandleId
// ============================================================================

/// Gateway-assigned plugin handle identifier.
///
/// Returned in the `attach` reply; asynchronous pushes addressed to the
/// handle carry it in their `sender` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    /// Creates a handle ID from its wire value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_generate_distinct() {
        let a = TransactionId::generate();
        let b = TransactionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_transaction_id_roundtrip() {
        let id = TransactionId::new("abc123");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"abc123\"");

        let back: TransactionId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_session_id_wire_form() {
        let id = SessionId::new(8_589_934_592);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "8589934592");
        assert_eq!(id.as_u64(), 8_589_934_592);
    }

    #[test]
    fn test_handle_id_display() {
        let id = HandleId::new(42);
        assert_eq!(id.to_string(), "42");
    }
}
