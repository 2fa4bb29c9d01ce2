//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Only the WebSocket transport is spoken, so every WebSocket text frame
//! carries exactly one Engine.IO packet. Socket.IO packets ride inside
//! Engine.IO `message` packets:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   engine open
//! 2                                                         engine ping
//! 40{"token":"..."}                                         socket connect (root namespace)
//! 42/alerts,["flood_alert",{...}]                           socket event (namespaced)
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::error::WsError;

/// Engine.IO pong reply, sent for every server ping.
pub const PONG: &str = "3";

/// The namespace used when the endpoint URL has no path.
pub const ROOT_NAMESPACE: &str = "/";

/// Session parameters announced by the server in the Engine.IO `open` packet.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id
    pub sid: String,
    /// Interval between server pings, in milliseconds
    pub ping_interval: u64,
    /// Grace period after a missed ping, in milliseconds
    pub ping_timeout: u64,
    /// Largest payload the server accepts, in bytes
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// A decoded inbound packet.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO session opened
    Open(Handshake),
    /// Engine.IO session closed by the server
    Close,
    /// Engine.IO heartbeat from the server
    Ping,
    /// Engine.IO heartbeat reply
    Pong,
    /// Engine.IO transport upgrade (unused over WebSocket)
    Upgrade,
    /// Engine.IO no-op
    Noop,
    /// Socket.IO namespace connected
    Connect {
        namespace: String,
        /// Server-assigned socket session data, e.g. `{"sid": ".."}`
        payload: Option<Value>,
    },
    /// Socket.IO namespace disconnected by the server
    Disconnect { namespace: String },
    /// Socket.IO named event
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    /// Socket.IO acknowledgement
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    /// Socket.IO namespace connection refused
    ConnectError { namespace: String, message: String },
    /// Socket.IO packets with binary attachments, which this client does not reassemble
    Binary,
}

/// Decode one WebSocket text frame.
pub fn decode(text: &str) -> Result<Packet, WsError> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(WsError::InvalidPacket(text.to_owned()));
    };
    let rest = chars.as_str();

    match kind {
        '0' => {
            let handshake = serde_json::from_str(rest).map_err(WsError::MessageParse)?;
            Ok(Packet::Open(handshake))
        }
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket(rest).ok_or_else(|| WsError::InvalidPacket(text.to_owned()))?,
        '5' => Ok(Packet::Upgrade),
        '6' => Ok(Packet::Noop),
        _ => Err(WsError::InvalidPacket(text.to_owned())),
    }
}

/// Returns `None` when the Socket.IO header itself is malformed.
fn decode_socket(text: &str) -> Option<Result<Packet, WsError>> {
    let mut chars = text.chars();
    let kind = chars.next()?;
    let rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Some(Ok(Packet::Binary));
    }

    let (namespace, rest) = split_namespace(rest);
    let (ack_id, body) = split_ack_id(rest);

    let packet = match kind {
        '0' => parse_optional(body).map(|payload| Packet::Connect { namespace, payload }),
        '1' => Ok(Packet::Disconnect { namespace }),
        '2' => parse_args(body).and_then(|mut args| {
            if args.is_empty() {
                return Err(WsError::InvalidPacket(text.to_owned()));
            }
            match args.remove(0) {
                Value::String(name) => Ok(Packet::Event {
                    namespace,
                    ack_id,
                    name,
                    args,
                }),
                _ => Err(WsError::InvalidPacket(text.to_owned())),
            }
        }),
        '3' => {
            let ack_id = ack_id?;
            parse_args(body).map(|args| Packet::Ack {
                namespace,
                ack_id,
                args,
            })
        }
        '4' => parse_optional(body).map(|payload| Packet::ConnectError {
            namespace,
            message: connect_error_message(payload),
        }),
        _ => return None,
    };

    Some(packet)
}

fn split_namespace(text: &str) -> (String, &str) {
    if !text.starts_with('/') {
        return (ROOT_NAMESPACE.to_owned(), text);
    }

    match text.split_once(',') {
        Some((namespace, rest)) => (namespace.to_owned(), rest),
        None => (text.to_owned(), ""),
    }
}

fn split_ack_id(text: &str) -> (Option<u64>, &str) {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, rest) = text.split_at(end);

    (digits.parse().ok(), rest)
}

fn parse_optional(body: &str) -> Result<Option<Value>, WsError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body).map(Some).map_err(WsError::MessageParse)
}

fn parse_args(body: &str) -> Result<Vec<Value>, WsError> {
    serde_json::from_str(body).map_err(WsError::MessageParse)
}

fn connect_error_message(payload: Option<Value>) -> String {
    match payload {
        Some(Value::String(message)) => message,
        Some(Value::Object(mut map)) => match map.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        Some(other) => other.to_string(),
        None => "connection refused".to_owned(),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == ROOT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

/// Encode a Socket.IO `CONNECT` carrying the authentication payload.
#[must_use]
pub fn encode_connect(namespace: &str, auth: &Value) -> String {
    format!("40{}{auth}", namespace_prefix(namespace))
}

/// Encode a Socket.IO `DISCONNECT` for the given namespace.
#[must_use]
pub fn encode_disconnect(namespace: &str) -> String {
    format!("41{}", namespace_prefix(namespace))
}
