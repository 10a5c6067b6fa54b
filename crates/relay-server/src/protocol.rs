//! JSON frame codec: `{ "event": <name>, "data": <payload> }`.

use relay_core::events::{PrivateMessage, SessionEvent};
use relay_core::Identity;
use serde::Deserialize;

pub const JOIN_CHAT: &str = "joinChat";
pub const LEAVE_CHAT: &str = "leaveChat";
pub const PRIVATE_MESSAGE: &str = "privateMessage";

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Why an inbound frame could not become a [`SessionEvent`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("invalid {event} payload: {reason}")]
    InvalidPayload { event: &'static str, reason: String },
}

impl ProtocolError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::UnknownEvent(_) => "unknown_event",
            Self::InvalidPayload { .. } => "invalid_payload",
        }
    }
}

/// Decode one client text frame.
pub fn decode(text: &str) -> Result<SessionEvent, ProtocolError> {
    let frame: Frame = serde_json::from_str(text)?;
    match frame.event.as_str() {
        JOIN_CHAT => identity_payload(JOIN_CHAT, frame.data).map(SessionEvent::JoinChat),
        LEAVE_CHAT => identity_payload(LEAVE_CHAT, frame.data).map(SessionEvent::LeaveChat),
        PRIVATE_MESSAGE => serde_json::from_value::<PrivateMessage>(frame.data)
            .map(SessionEvent::PrivateMessage)
            .map_err(|e| ProtocolError::InvalidPayload {
                event: PRIVATE_MESSAGE,
                reason: e.to_string(),
            }),
        other => Err(ProtocolError::UnknownEvent(other.to_string())),
    }
}

fn identity_payload(event: &'static str, data: serde_json::Value) -> Result<Identity, ProtocolError> {
    match data {
        serde_json::Value::String(s) => Ok(Identity::from(s)),
        other => Err(ProtocolError::InvalidPayload {
            event,
            reason: format!("expected identity string, got {other}"),
        }),
    }
}
