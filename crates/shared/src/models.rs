//! Wire frames exchanged over the relay socket and the bridge endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event type names understood by the application tier. The relay only
/// cares about [`ws_types::SUBSCRIBE`]; everything else is opaque payload.
pub mod ws_types {
    pub const SUBSCRIBE: &str = "subscribe";
    pub const MESSAGE: &str = "message";
    pub const MESSAGE_EDIT: &str = "message_edit";
    pub const MESSAGE_DELETE: &str = "message_delete";
    pub const MESSAGE_PIN: &str = "message_pin";
    pub const DM: &str = "dm";
    pub const TYPING: &str = "typing";
}

/// Why an inbound frame or bridge body was refused.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("`channel` is missing or empty")]
    MissingChannel,
    #[error("`channel` must be a non-empty string")]
    InvalidChannel,
    #[error("`message` is missing")]
    MissingMessage,
    #[error("`subscribe` cannot be broadcast")]
    SubscribeNotBroadcastable,
}

/// An application event routed by the relay.
///
/// `payload` is the full JSON object as the sender supplied it; `kind` and
/// `channel` are read out of it for routing and logging only.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: String,
    /// `None` means deliver to every connection.
    pub channel: Option<String>,
    pub payload: Value,
}

impl Event {
    /// Validate a bridge body. `type` defaults to `"message"`, `channel` and
    /// `message` are required; every other field is kept as-is.
    pub fn from_broadcast(mut value: Value) -> Result<Self, FrameError> {
        let obj = value.as_object_mut().ok_or(FrameError::NotAnObject)?;
        let channel = match obj.get("channel") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(FrameError::MissingChannel),
        };
        if matches!(obj.get("message"), None | Some(Value::Null)) {
            return Err(FrameError::MissingMessage);
        }
        let kind = match obj.get("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(t)) if t == ws_types::SUBSCRIBE => {
                return Err(FrameError::SubscribeNotBroadcastable)
            }
            Some(Value::String(t)) => Some(t.clone()),
            Some(_) => return Err(FrameError::MissingType),
        };
        let kind = match kind {
            Some(kind) => kind,
            None => {
                obj.insert("type".to_string(), Value::from(ws_types::MESSAGE));
                ws_types::MESSAGE.to_string()
            }
        };
        Ok(Self {
            kind,
            channel: Some(channel),
            payload: value,
        })
    }

    /// Serialized payload exactly as it goes out on the wire.
    pub fn to_json(&self) -> String {
        self.payload.to_string()
    }
}

/// A text frame received from a client socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Subscribe { channel: String },
    Event(Event),
}

impl Frame {
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self::Subscribe {
            channel: channel.into(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let obj = value.as_object().ok_or(FrameError::NotAnObject)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingType)?;

        if kind == ws_types::SUBSCRIBE {
            return match obj.get("channel") {
                Some(Value::String(s)) if !s.is_empty() => Ok(Self::subscribe(s.clone())),
                _ => Err(FrameError::MissingChannel),
            };
        }

        let channel = match obj.get("channel") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(_) => return Err(FrameError::InvalidChannel),
        };
        Ok(Self::Event(Event {
            kind: kind.to_string(),
            channel,
            payload: value,
        }))
    }

    pub fn to_json(&self) -> String {
        match self {
            Self::Subscribe { channel } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::from(ws_types::SUBSCRIBE));
                obj.insert("channel".to_string(), Value::from(channel.as_str()));
                Value::Object(obj).to_string()
            }
            Self::Event(event) => event.to_json(),
        }
    }
}

/// Body of `POST /broadcast`, as sent by the application tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRequest {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub channel: String,
    pub message: Value,
}

/// Response of `POST /broadcast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BroadcastResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_subscribe_frame() {
        let frame = Frame::parse(r#"{"type":"subscribe","channel":"srv1-gen"}"#).unwrap();
        assert_eq!(frame, Frame::subscribe("srv1-gen"));
    }

    #[test]
    fn parse_event_keeps_whole_payload() {
        let text = r#"{"type":"message","channel":"srv1-gen","message":{"id":"m1","content":"hi"}}"#;
        let Frame::Event(event) = Frame::parse(text).unwrap() else {
            panic!("expected event frame");
        };
        assert_eq!(event.kind, "message");
        assert_eq!(event.channel.as_deref(), Some("srv1-gen"));
        assert_eq!(event.to_json(), text);
    }

    #[test]
    fn event_without_channel_is_global() {
        let Frame::Event(event) = Frame::from_value(json!({"type": ws_types::DM, "message": "x"})).unwrap() else {
            panic!("expected event frame");
        };
        assert_eq!(event.kind, ws_types::DM);
        assert_eq!(event.channel, None);
    }

    #[test]
    fn rejects_bad_frames() {
        assert!(matches!(
            Frame::parse("not json"),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(Frame::parse("[1,2]"), Err(FrameError::NotAnObject)));
        assert!(matches!(
            Frame::parse(r#"{"channel":"x"}"#),
            Err(FrameError::MissingType)
        ));
        assert!(matches!(
            Frame::parse(r#"{"type":"subscribe"}"#),
            Err(FrameError::MissingChannel)
        ));
        assert!(matches!(
            Frame::parse(r#"{"type":"subscribe","channel":""}"#),
            Err(FrameError::MissingChannel)
        ));
        assert!(matches!(
            Frame::parse(r#"{"type":"message","channel":7}"#),
            Err(FrameError::InvalidChannel)
        ));
    }

    #[test]
    fn subscribe_echo_shape() {
        let echo: Value = serde_json::from_str(&Frame::subscribe("dm-alice-bob").to_json()).unwrap();
        assert_eq!(echo, json!({"type": "subscribe", "channel": "dm-alice-bob"}));
    }

    #[test]
    fn broadcast_defaults_type_to_message() {
        let event = Event::from_broadcast(json!({"channel": "srv1-gen", "message": {"id": "m1"}}))
            .unwrap();
        assert_eq!(event.kind, ws_types::MESSAGE);
        assert_eq!(event.payload["type"], "message");
        assert_eq!(event.payload["message"], json!({"id": "m1"}));
    }

    #[test]
    fn broadcast_keeps_extra_fields() {
        let event = Event::from_broadcast(json!({
            "type": "typing",
            "channel": "srv1-gen",
            "message": {"userId": "u1"},
            "expiresAt": 1700000000
        }))
        .unwrap();
        assert_eq!(event.kind, ws_types::TYPING);
        assert_eq!(event.payload["expiresAt"], 1700000000);
    }

    #[test]
    fn broadcast_requires_channel_and_message() {
        assert!(matches!(
            Event::from_broadcast(json!({"message": "hi"})),
            Err(FrameError::MissingChannel)
        ));
        assert!(matches!(
            Event::from_broadcast(json!({"channel": "", "message": "hi"})),
            Err(FrameError::MissingChannel)
        ));
        assert!(matches!(
            Event::from_broadcast(json!({"channel": "x"})),
            Err(FrameError::MissingMessage)
        ));
        assert!(matches!(
            Event::from_broadcast(json!({"channel": "x", "message": null})),
            Err(FrameError::MissingMessage)
        ));
        assert!(matches!(
            Event::from_broadcast(json!("x")),
            Err(FrameError::NotAnObject)
        ));
    }

    #[test]
    fn broadcast_cannot_subscribe() {
        assert!(matches!(
            Event::from_broadcast(json!({"type": "subscribe", "channel": "x", "message": 1})),
            Err(FrameError::SubscribeNotBroadcastable)
        ));
    }

    #[test]
    fn broadcast_request_omits_missing_type() {
        let req = BroadcastRequest {
            kind: None,
            channel: "srv1-gen".to_string(),
            message: json!("hi"),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"channel": "srv1-gen", "message": "hi"}));
    }
}
