use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// Payload of an inbound `privateMessage` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub to: Identity,
    pub message: String,
}

/// Everything the coordinator reacts to for a single connection.
///
/// `Connected` and `Disconnected` come from the transport itself; the rest
/// are decoded from client frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    JoinChat(Identity),
    LeaveChat(Identity),
    PrivateMessage(PrivateMessage),
}

impl SessionEvent {
    /// Wire or lifecycle name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connect",
            Self::Disconnected => "disconnect",
            Self::JoinChat(_) => "joinChat",
            Self::LeaveChat(_) => "leaveChat",
            Self::PrivateMessage(_) => "privateMessage",
        }
    }
}

/// Events sent to a resolved connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundEvent {
    PrivateMessage { from: Identity, message: String },
}

impl OutboundEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_private_message_wire_shape() {
        let event = OutboundEvent::PrivateMessage {
            from: Identity::from("bob"),
            message: "hi".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "privateMessage");
        assert_eq!(json["data"]["from"], "bob");
        assert_eq!(json["data"]["message"], "hi");
    }

    #[test]
    fn private_message_requires_both_fields() {
        let ok: Result<PrivateMessage, _> =
            serde_json::from_value(serde_json::json!({"to": "alice", "message": "x"}));
        assert!(ok.is_ok());

        let missing: Result<PrivateMessage, _> =
            serde_json::from_value(serde_json::json!({"to": "alice"}));
        assert!(missing.is_err());
    }

    #[test]
    fn event_names() {
        assert_eq!(SessionEvent::Connected.name(), "connect");
        assert_eq!(SessionEvent::JoinChat(Identity::from("a")).name(), "joinChat");
        assert_eq!(SessionEvent::LeaveChat(Identity::from("a")).name(), "leaveChat");
    }
}
