//! Wire protocol types for the control plane connection
//!
//! Every frame on the wire is a JSON envelope:
//! `{type: string, data: object, session_id: string, timestamp: number}`
//! outbound, and `{type: string, data: object}` inbound. Timestamps are
//! fractional seconds since the UNIX epoch.

use crate::events::EventPayload;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Outbound message type for the initial connection announcement
pub const MSG_CONNECTION: &str = "connection";
/// Outbound message type replying to a control plane ping
pub const MSG_PONG: &str = "pong";

/// Inbound message types recognized by the dispatcher. Anything else is
/// ignored for forward compatibility.
pub const MSG_PING: &str = "ping";
pub const MSG_HUMAN_CONTROL: &str = "human_control";
pub const MSG_TOOL_RESPONSE: &str = "tool_response";
pub const MSG_SESSION_CONTROL: &str = "session_control";

/// A message queued for delivery to the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message category (`connection`, `pong`, `agent_event`, ...)
    #[serde(rename = "type")]
    pub message_type: String,
    /// Message body
    pub data: EventPayload,
    /// Session this connection belongs to
    pub session_id: String,
    /// Seconds since the UNIX epoch at enqueue time
    pub timestamp: f64,
}

impl OutboundMessage {
    /// Build a message stamped with the current time
    pub fn new(message_type: &str, data: EventPayload, session_id: &str) -> Self {
        Self {
            message_type: message_type.to_string(),
            data,
            session_id: session_id.to_string(),
            timestamp: now_secs(),
        }
    }
}

/// Envelope decoded from a received text frame. `data` stays opaque here;
/// the dispatcher deserializes it per message type.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: EventPayload,
}

/// `human_control` message body
#[derive(Debug, Clone, Deserialize)]
pub struct HumanControlData {
    pub control_type: String,
    pub user_id: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<f64>,
}

/// `tool_response` message body
#[derive(Debug, Clone, Deserialize)]
pub struct ToolResponseData {
    pub tool_name: String,
    #[serde(default)]
    pub result: serde_json::Value,
    pub timestamp: Option<f64>,
}

/// `session_control` message body
#[derive(Debug, Clone, Deserialize)]
pub struct SessionControlData {
    pub control_type: String,
    pub reason: Option<String>,
    pub timestamp: Option<f64>,
}

/// Current time as fractional seconds since the UNIX epoch
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_message_serializes_with_type_field() {
        let mut data = EventPayload::new();
        data.insert("k".to_string(), json!(1));
        let msg = OutboundMessage::new("agent_event", data, "s1");

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], json!("agent_event"));
        assert_eq!(value["data"]["k"], json!(1));
        assert_eq!(value["session_id"], json!("s1"));
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_inbound_frame_without_data_defaults_to_empty() {
        let frame: InboundFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(frame.message_type, "ping");
        assert!(frame.data.is_empty());
    }

    #[test]
    fn test_human_control_data_optional_fields() {
        let data: HumanControlData = serde_json::from_value(json!({
            "control_type": "takeover",
            "user_id": "u1",
            "timestamp": 12.5
        }))
        .unwrap();
        assert_eq!(data.control_type, "takeover");
        assert_eq!(data.user_id.as_deref(), Some("u1"));
        assert!(data.message.is_none());
    }
}
