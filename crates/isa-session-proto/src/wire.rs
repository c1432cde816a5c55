// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON framing for the simulation channel.
//!
//! One frame is one JSON object carried in a WebSocket text message.
//! Commands are tagged by `action`, events by `type`. Inbound decoding is
//! lenient: any frame that is not a well-formed, known event comes back as
//! [`Inbound::Unrecognized`] so a misbehaving server never takes the client
//! down.

use serde_json::Value;
use thiserror::Error;

use crate::{Command, ServerEvent};

/// `type` tags this client understands.
pub const EVENT_TYPES: [&str; 5] = [
    "state",
    "complete",
    "error",
    "breakpoint_set",
    "breakpoint_cleared",
];

/// `action` tags the simulator accepts.
pub const COMMAND_ACTIONS: [&str; 6] = [
    "reset",
    "load",
    "step",
    "run",
    "set_breakpoint",
    "clear_breakpoint",
];

/// Framing failures.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame is not valid JSON (or failed to serialize).
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// Frame is not an object carrying the expected tag field.
    #[error("missing `{0}` tag")]
    MissingTag(&'static str),
    /// Tag value is not one this side knows.
    #[error("unknown tag `{0}`")]
    UnknownTag(String),
    /// Known tag, but the body does not match its schema.
    #[error("malformed `{tag}` frame: {source}")]
    Malformed {
        /// Tag the frame claimed.
        tag: String,
        /// Underlying schema error.
        #[source]
        source: serde_json::Error,
    },
}

impl WireError {
    /// Tag the offending frame carried, when it had one.
    pub fn tag(&self) -> Option<&str> {
        match self {
            WireError::UnknownTag(tag) | WireError::Malformed { tag, .. } => Some(tag),
            WireError::Json(_) | WireError::MissingTag(_) => None,
        }
    }
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A known, well-formed server event.
    Event(ServerEvent),
    /// Anything else; callers log and ignore it.
    Unrecognized {
        /// Tag the frame carried, if any.
        tag: Option<String>,
        /// Why decoding failed.
        reason: String,
    },
}

/// Encode a command as one text frame.
pub fn encode_command(cmd: &Command) -> Result<String, WireError> {
    Ok(serde_json::to_string(cmd)?)
}

/// Decode a command frame (server side and test doubles).
pub fn decode_command(text: &str) -> Result<Command, WireError> {
    decode_tagged(text, "action", &COMMAND_ACTIONS)
}

/// Encode a server event as one text frame.
pub fn encode_event(event: &ServerEvent) -> Result<String, WireError> {
    Ok(serde_json::to_string(event)?)
}

/// Strictly decode a server event frame.
pub fn try_decode_event(text: &str) -> Result<ServerEvent, WireError> {
    decode_tagged(text, "type", &EVENT_TYPES)
}

/// Leniently decode a server event frame.
pub fn decode_event(text: &str) -> Inbound {
    match try_decode_event(text) {
        Ok(event) => Inbound::Event(event),
        Err(err) => Inbound::Unrecognized {
            tag: err.tag().map(str::to_owned),
            reason: err.to_string(),
        },
    }
}

fn decode_tagged<T>(text: &str, field: &'static str, known: &[&str]) -> Result<T, WireError>
where
    T: serde::de::DeserializeOwned,
{
    let value: Value = serde_json::from_str(text)?;
    let tag = value
        .get(field)
        .and_then(Value::as_str)
        .ok_or(WireError::MissingTag(field))?
        .to_owned();
    if !known.contains(&tag.as_str()) {
        return Err(WireError::UnknownTag(tag));
    }
    serde_json::from_value(value).map_err(|source| WireError::Malformed { tag, source })
}

// --- Unit tests -----------------------------------------------------------
