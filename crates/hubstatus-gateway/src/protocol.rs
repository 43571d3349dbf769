//! Gateway protocol types, opcodes, and frame builders.
//!
//! Outbound frames are built by pure functions that never touch client
//! state. Inbound frames are decoded in two steps: the `{op, d, s, t}`
//! envelope first, then [`GatewayPayload::classify`] validates the
//! payload shape for the opcode before anything is dispatched.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Default gateway endpoint (protocol v6, JSON encoding).
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=6&encoding=json";

/// Status string advertised in every presence descriptor.
pub const STATUS_ONLINE: &str = "online";

/// `large_threshold` sent in Identify.
const LARGE_THRESHOLD: u32 = 50;

// ── Opcodes ──────────────────────────────────────────────────

/// Gateway opcodes.
pub mod opcode {
    /// Event dispatch (receive only).
    pub const DISPATCH: u8 = 0;
    /// Heartbeat (bidirectional).
    pub const HEARTBEAT: u8 = 1;
    /// Identify (send only).
    pub const IDENTIFY: u8 = 2;
    /// Presence update (send only).
    pub const PRESENCE_UPDATE: u8 = 3;
    /// Server requests reconnect (receive only).
    pub const RECONNECT: u8 = 7;
    /// Invalid session (receive only).
    pub const INVALID_SESSION: u8 = 9;
    /// Hello, carries the heartbeat interval (receive only).
    pub const HELLO: u8 = 10;
    /// Heartbeat ACK (receive only).
    pub const HEARTBEAT_ACK: u8 = 11;
}

// ── Wire Types ───────────────────────────────────────────────

/// Raw Gateway frame as received/sent over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Opcode for the frame.
    pub op: u8,
    /// Opcode-dependent data. Serialized as `null` when absent.
    #[serde(default)]
    pub d: Option<serde_json::Value>,
    /// Sequence number. Never set on frames the client sends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Event name (dispatch frames only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Hello payload (`op=10`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
}

/// A validated inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// The peer asks for an immediate heartbeat (`op=1`).
    HeartbeatRequest,
    /// Handshake greeting (`op=10`).
    Hello(HelloPayload),
    /// Acknowledgement of one of our heartbeats (`op=11`).
    HeartbeatAck,
    /// Event dispatch (`op=0`); the payload is not interpreted.
    Dispatch {
        /// Event name, if present.
        event: Option<String>,
    },
    /// Server-requested reconnect (`op=7`).
    Reconnect,
    /// Session invalidated (`op=9`).
    InvalidSession {
        /// Whether the peer claims the session could be resumed.
        resumable: bool,
    },
}

/// Parse the frame envelope from socket text.
///
/// # Errors
///
/// Returns [`GatewayError::Json`] if the text is not a JSON object with
/// an integer `op` field.
pub fn decode(text: &str) -> GatewayResult<GatewayPayload> {
    Ok(serde_json::from_str(text)?)
}

impl GatewayPayload {
    /// Validate the payload against its opcode.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownOpcode`] for opcodes this client
    /// does not know and [`GatewayError::Protocol`] when a known opcode
    /// carries a payload of the wrong shape.
    pub fn classify(&self) -> GatewayResult<InboundFrame> {
        match self.op {
            opcode::DISPATCH => Ok(InboundFrame::Dispatch {
                event: self.t.clone(),
            }),
            opcode::HEARTBEAT => Ok(InboundFrame::HeartbeatRequest),
            opcode::HELLO => {
                let data = self
                    .d
                    .clone()
                    .ok_or_else(|| GatewayError::Protocol("Hello missing data".into()))?;
                let hello: HelloPayload = serde_json::from_value(data).map_err(|e| {
                    GatewayError::Protocol(format!("Hello payload malformed: {e}"))
                })?;
                if hello.heartbeat_interval == 0 {
                    return Err(GatewayError::Protocol(
                        "Hello heartbeat_interval must be positive".into(),
                    ));
                }
                Ok(InboundFrame::Hello(hello))
            },
            opcode::HEARTBEAT_ACK => Ok(InboundFrame::HeartbeatAck),
            opcode::RECONNECT => Ok(InboundFrame::Reconnect),
            opcode::INVALID_SESSION => Ok(InboundFrame::InvalidSession {
                resumable: self
                    .d
                    .as_ref()
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false),
            }),
            op => Err(GatewayError::UnknownOpcode(op)),
        }
    }
}

// ── Presence Descriptor ──────────────────────────────────────

/// Fixed application metadata attached to every advertised activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceProfile {
    /// Secondary line shown under the activity name.
    pub details: String,
    /// Application the activity is attributed to.
    pub application_id: String,
    /// Image asset reference for the large activity icon.
    pub large_image: String,
    /// Activity type (0 = playing).
    pub kind: u8,
}

impl Default for PresenceProfile {
    fn default() -> Self {
        Self {
            details: "hubs.mozilla.com".to_string(),
            application_id: "509129921826914304".to_string(),
            large_image: "568373390222688257".to_string(),
            kind: 0,
        }
    }
}

/// Client identification sent with Identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientProperties {
    /// Host operating system.
    #[serde(rename = "$os")]
    pub os: String,
    /// Browser (or library) name.
    #[serde(rename = "$browser")]
    pub browser: String,
    /// Device name.
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "Firefox".to_string(),
            device: "hubs-discord-status".to_string(),
        }
    }
}

/// Activity image assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityAssets {
    /// Large image asset reference.
    pub large_image: String,
}

/// An advertised activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    /// Human-readable activity label.
    pub name: String,
    /// Secondary line.
    pub details: String,
    /// Owning application.
    pub application_id: String,
    /// Image assets.
    pub assets: ActivityAssets,
    /// Activity type.
    #[serde(rename = "type")]
    pub kind: u8,
}

/// Presence descriptor embedded in Identify and Presence-Update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presence {
    /// Current activity; `null` advertises no activity.
    pub game: Option<Activity>,
    /// Always [`STATUS_ONLINE`].
    pub status: String,
    /// Idle-since timestamp; always `null`.
    pub since: Option<u64>,
    /// Away-from-keyboard flag; always `false`.
    pub afk: bool,
}

/// Build the presence descriptor for `status`.
///
/// An absent status still produces an "online" presence, just without
/// an activity.
#[must_use]
pub fn build_presence(profile: &PresenceProfile, status: Option<&str>) -> Presence {
    Presence {
        game: status.map(|name| Activity {
            name: name.to_string(),
            details: profile.details.clone(),
            application_id: profile.application_id.clone(),
            assets: ActivityAssets {
                large_image: profile.large_image.clone(),
            },
            kind: profile.kind,
        }),
        status: STATUS_ONLINE.to_string(),
        since: None,
        afk: false,
    }
}

// ── Outbound Frames ──────────────────────────────────────────

/// Build a Heartbeat frame (`op=1`).
#[must_use]
pub fn build_heartbeat(sequence: Option<u64>) -> GatewayPayload {
    GatewayPayload {
        op: opcode::HEARTBEAT,
        d: sequence.map(serde_json::Value::from),
        s: None,
        t: None,
    }
}

/// Build an Identify frame (`op=2`) carrying the initial presence.
#[must_use]
pub fn build_identify(
    token: &str,
    properties: &ClientProperties,
    profile: &PresenceProfile,
    status: Option<&str>,
) -> GatewayPayload {
    GatewayPayload {
        op: opcode::IDENTIFY,
        d: Some(serde_json::json!({
            "token": token,
            "properties": properties,
            "compress": false,
            "large_threshold": LARGE_THRESHOLD,
            "presence": build_presence(profile, status),
        })),
        s: None,
        t: None,
    }
}

/// Build a Presence-Update frame (`op=3`).
#[must_use]
pub fn build_presence_update(profile: &PresenceProfile, status: Option<&str>) -> GatewayPayload {
    GatewayPayload {
        op: opcode::PRESENCE_UPDATE,
        d: Some(serde_json::json!(build_presence(profile, status))),
        s: None,
        t: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Envelope Tests ──────────────────────────────────────

    #[test]
    fn decode_hello_envelope() {
        let payload = decode(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
            .unwrap();
        assert_eq!(payload.op, opcode::HELLO);
        assert!(payload.s.is_none());
        assert_eq!(
            payload.classify().unwrap(),
            InboundFrame::Hello(HelloPayload {
                heartbeat_interval: 41250
            })
        );
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(decode("not json"), Err(GatewayError::Json(_))));
    }

    #[test]
    fn decode_rejects_missing_op() {
        assert!(decode(r#"{"d":null,"s":3}"#).is_err());
    }

    #[test]
    fn decode_keeps_sequence() {
        let payload = decode(r#"{"op":0,"d":{},"s":17,"t":"READY"}"#).unwrap();
        assert_eq!(payload.s, Some(17));
        assert_eq!(
            payload.classify().unwrap(),
            InboundFrame::Dispatch {
                event: Some("READY".into())
            }
        );
    }

    // ── Classification Tests ────────────────────────────────

    #[test]
    fn classify_heartbeat_request() {
        let payload = decode(r#"{"op":1,"d":null}"#).unwrap();
        assert_eq!(payload.classify().unwrap(), InboundFrame::HeartbeatRequest);
    }

    #[test]
    fn classify_hello_without_data_is_protocol_error() {
        let payload = decode(r#"{"op":10}"#).unwrap();
        assert!(matches!(
            payload.classify(),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn classify_hello_with_wrong_shape_is_protocol_error() {
        let payload = decode(r#"{"op":10,"d":{"heartbeat_interval":"soon"}}"#).unwrap();
        assert!(matches!(
            payload.classify(),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn classify_hello_zero_interval_is_rejected() {
        let payload = decode(r#"{"op":10,"d":{"heartbeat_interval":0}}"#).unwrap();
        assert!(matches!(
            payload.classify(),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn classify_invalid_session_reads_flag() {
        let payload = decode(r#"{"op":9,"d":true}"#).unwrap();
        assert_eq!(
            payload.classify().unwrap(),
            InboundFrame::InvalidSession { resumable: true }
        );

        let payload = decode(r#"{"op":9,"d":null}"#).unwrap();
        assert_eq!(
            payload.classify().unwrap(),
            InboundFrame::InvalidSession { resumable: false }
        );
    }

    #[test]
    fn classify_unknown_opcode() {
        let payload = decode(r#"{"op":42,"d":null}"#).unwrap();
        assert!(matches!(
            payload.classify(),
            Err(GatewayError::UnknownOpcode(42))
        ));
    }

    // ── Builder Tests ───────────────────────────────────────

    #[test]
    fn heartbeat_with_sequence() {
        let payload = build_heartbeat(Some(99));
        assert_eq!(payload.op, opcode::HEARTBEAT);
        assert_eq!(payload.d, Some(serde_json::Value::from(99)));
    }

    #[test]
    fn heartbeat_without_sequence_serializes_null() {
        let json = serde_json::to_string(&build_heartbeat(None)).unwrap();
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn presence_with_activity() {
        let presence = build_presence(&PresenceProfile::default(), Some("Hubs by Mozilla"));
        let value = serde_json::to_value(&presence).unwrap();
        assert_eq!(value["status"], "online");
        assert_eq!(value["afk"], false);
        assert!(value["since"].is_null());
        assert_eq!(value["game"]["name"], "Hubs by Mozilla");
        assert_eq!(value["game"]["details"], "hubs.mozilla.com");
        assert_eq!(value["game"]["application_id"], "509129921826914304");
        assert_eq!(value["game"]["assets"]["large_image"], "568373390222688257");
        assert_eq!(value["game"]["type"], 0);
    }

    #[test]
    fn presence_without_activity_is_still_online() {
        let presence = build_presence(&PresenceProfile::default(), None);
        let value = serde_json::to_value(&presence).unwrap();
        assert!(value["game"].is_null());
        assert_eq!(value["status"], "online");
    }

    #[test]
    fn identify_carries_token_properties_and_presence() {
        let props = ClientProperties {
            os: "linux".into(),
            browser: "Firefox".into(),
            device: "hubs-discord-status".into(),
        };
        let payload = build_identify(
            "tok123",
            &props,
            &PresenceProfile::default(),
            Some("Hubs by Mozilla"),
        );
        assert_eq!(payload.op, opcode::IDENTIFY);
        assert!(payload.s.is_none());
        let d = payload.d.unwrap();
        assert_eq!(d["token"], "tok123");
        assert_eq!(d["properties"]["$os"], "linux");
        assert_eq!(d["properties"]["$browser"], "Firefox");
        assert_eq!(d["properties"]["$device"], "hubs-discord-status");
        assert_eq!(d["compress"], false);
        assert_eq!(d["large_threshold"], 50);
        assert_eq!(d["presence"]["game"]["name"], "Hubs by Mozilla");
    }

    #[test]
    fn presence_update_has_descriptor_only() {
        let payload = build_presence_update(&PresenceProfile::default(), None);
        assert_eq!(payload.op, opcode::PRESENCE_UPDATE);
        let d = payload.d.unwrap();
        assert!(d.get("token").is_none());
        assert_eq!(d["status"], "online");
        assert!(d["game"].is_null());
    }

    #[test]
    fn outbound_frames_omit_sequence_and_event() {
        let json =
            serde_json::to_string(&build_presence_update(&PresenceProfile::default(), None))
                .unwrap();
        assert!(!json.contains("\"s\""));
        assert!(!json.contains("\"t\""));
    }
}
