//! Asynchronous server event types.
//!
//! Pushes are notifications the gateway sends without a matching pending
//! transaction: plugin events, PeerConnection state changes, media
//! reports. [`ServerEvent`] is the typed view a [`PluginHandler`]
//! receives; unrecognized kinds degrade to [`ServerEvent::Unknown`]
//! instead of failing.
//!
//! [`PluginHandler`]: crate::PluginHandler
//!
//! # Event Kinds
//!
//! | Kind | Payload |
//! |------|---------|
//! | `event` | plugin name, plugin data, optional jsep |
//! | `webrtcup` | none |
//! | `hangup` | reason |
//! | `media` | media type, receiving flag |
//! | `slowlink` | direction, lost packet count |
//! | `trickle` | remote candidate |
//! | `detached` | none |
//! | `timeout` | none |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use super::message::{IncomingMessage, MessageKind};

// ============================================================================
// ServerEvent
// ============================================================================

/// Parsed asynchronous push from the gateway.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Plugin-originated event.
    Plugin {
        /// Originating plugin package name.
        plugin: String,
        /// Plugin-defined payload.
        data: Value,
        /// Session description, if the event carries one.
        jsep: Option<Value>,
    },

    /// The PeerConnection became available.
    WebrtcUp,

    /// The PeerConnection was closed.
    Hangup {
        /// Gateway-provided reason.
        reason: Option<String>,
    },

    /// Media started or stopped flowing.
    Media {
        /// Media type (`audio` or `video`).
        kind: String,
        /// Whether the gateway is receiving this media.
        receiving: bool,
    },

    /// The gateway reports packet loss on the link.
    Slowlink {
        /// `true` for client-to-gateway loss.
        uplink: bool,
        /// Lost packet count in the last window.
        lost: u64,
    },

    /// Trickle candidate from the remote side.
    Trickle {
        /// The candidate payload, verbatim.
        candidate: Value,
    },

    /// The gateway detached the handle.
    Detached,

    /// The gateway expired the session.
    Timeout,

    /// Any push this client does not model.
    Unknown {
        /// The raw message.
        message: IncomingMessage,
    },
}

// ============================================================================
// Parsing
// ============================================================================

impl IncomingMessage {
    /// Parses a push message into its typed event view.
    #[must_use]
    pub fn parse_event(&self) -> ServerEvent {
        match self.janus {
            MessageKind::Event => match &self.plugindata {
                Some(plugindata) => ServerEvent::Plugin {
                    plugin: plugindata.plugin.clone(),
                    data: plugindata.data.clone(),
                    jsep: self.jsep.clone(),
                },
                None => ServerEvent::Unknown {
                    message: self.clone(),
                },
            },

            MessageKind::Webrtcup => ServerEvent::WebrtcUp,

            MessageKind::Hangup => ServerEvent::Hangup {
                reason: self
                    .extra
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string),
            },

            MessageKind::Media => ServerEvent::Media {
                kind: self.get_string("type"),
                receiving: self.get_bool("receiving"),
            },

            MessageKind::Slowlink => ServerEvent::Slowlink {
                uplink: self.get_bool("uplink"),
                lost: self.get_u64("lost"),
            },

            MessageKind::Trickle => ServerEvent::Trickle {
                candidate: self.extra.get("candidate").cloned().unwrap_or(Value::Null),
            },

            MessageKind::Detached => ServerEvent::Detached,

            MessageKind::Timeout => ServerEvent::Timeout,

            _ => ServerEvent::Unknown {
                message: self.clone(),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json_str: &str) -> ServerEvent {
        let message: IncomingMessage = serde_json::from_str(json_str).expect("parse message");
        message.parse_event()
    }

    #[test]
    fn test_plugin_event() {
        let event = parse(
            r#"{
                "janus": "event",
                "sender": 42,
                "plugindata": {
                    "plugin": "janus.plugin.videoroom",
                    "data": { "videoroom": "joined", "room": 1234 }
                }
            }"#,
        );

        match event {
            ServerEvent::Plugin { plugin, data, jsep } => {
                assert_eq!(plugin, "janus.plugin.videoroom");
                assert_eq!(data["room"], 1234);
                assert!(jsep.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_hangup_with_reason() {
        let event = parse(r#"{ "janus": "hangup", "sender": 42, "reason": "DTLS alert" }"#);

        match event {
            ServerEvent::Hangup { reason } => assert_eq!(reason.as_deref(), Some("DTLS alert")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_media_event() {
        let event = parse(
            r#"{ "janus": "media", "sender": 42, "type": "audio", "receiving": true }"#,
        );

        match event {
            ServerEvent::Media { kind, receiving } => {
                assert_eq!(kind, "audio");
                assert!(receiving);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_slowlink_event() {
        let event = parse(r#"{ "janus": "slowlink", "sender": 42, "uplink": false, "lost": 7 }"#);

        match event {
            ServerEvent::Slowlink { uplink, lost } => {
                assert!(!uplink);
                assert_eq!(lost, 7);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_preserves_raw() {
        let event = parse(r#"{ "janus": "announcement", "sender": 42, "text": "maintenance" }"#);

        match event {
            ServerEvent::Unknown { message } => {
                assert_eq!(message.get_string("text"), "maintenance");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_without_plugindata_degrades() {
        let event = parse(r#"{ "janus": "event", "sender": 42 }"#);
        assert!(matches!(event, ServerEvent::Unknown { .. }));
    }
}
