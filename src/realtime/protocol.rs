//! JSON hub protocol framing.
//!
//! Every frame is a JSON object terminated by the ASCII record separator
//! (0x1E). A text message from the server may carry several frames.

use serde::Deserialize;
use serde_json::{json, Value};

pub const RECORD_SEPARATOR: char = '\u{1e}';

const TYPE_INVOCATION: u8 = 1;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation { target: String, arguments: Vec<Value> },
    Ping,
    Close { error: Option<String>, allow_reconnect: bool },
    /// Stream items, completions and anything newer; not used by clients
    /// that only listen for invocations.
    Other(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// First frame sent after the socket opens.
pub fn handshake_request() -> String {
    frame(&json!({ "protocol": "json", "version": 1 }))
}

/// `Ok` for `{}`, `Err` with the server's reason otherwise.
pub fn parse_handshake_response(frame: &str) -> Result<(), String> {
    let response: HandshakeResponse =
        serde_json::from_str(frame).map_err(|e| format!("invalid handshake response: {}", e))?;
    match response.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Split a text message into its non-empty frames.
pub fn split_frames(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|f| !f.is_empty())
}

pub fn parse_message(frame: &str) -> Result<HubMessage, serde_json::Error> {
    let raw: RawMessage = serde_json::from_str(frame)?;
    Ok(match raw.kind {
        TYPE_INVOCATION => HubMessage::Invocation {
            target: raw.target.unwrap_or_default(),
            arguments: raw.arguments.unwrap_or_default(),
        },
        TYPE_PING => HubMessage::Ping,
        TYPE_CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect.unwrap_or(false),
        },
        other => HubMessage::Other(other),
    })
}

/// Fire-and-forget invocation: no invocation id, so the server sends no
/// completion.
pub fn encode_invocation(target: &str, arguments: &[Value]) -> String {
    frame(&json!({
        "type": TYPE_INVOCATION,
        "target": target,
        "arguments": arguments,
    }))
}

pub fn encode_ping() -> String {
    frame(&json!({ "type": TYPE_PING }))
}

pub fn encode_close(error: Option<&str>) -> String {
    match error {
        Some(error) => frame(&json!({ "type": TYPE_CLOSE, "error": error })),
        None => frame(&json!({ "type": TYPE_CLOSE })),
    }
}

fn frame(value: &Value) -> String {
    let mut text = value.to_string();
    text.push(RECORD_SEPARATOR);
    text
}
