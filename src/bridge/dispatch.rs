//! Inbound control-message dispatch
//!
//! Runs inside the receive loop: each decoded frame either gets an immediate
//! wire reply (`ping` → `pong`) or is republished on the event bus as a
//! domain event for agent-side subscribers. Unknown message types and
//! unknown control sub-kinds are ignored so newer control planes can talk to
//! older agents.

use crate::bridge::connection::ConnectionInner;
use crate::bridge::protocol::{
    now_secs, HumanControlData, InboundFrame, SessionControlData, ToolResponseData,
    MSG_HUMAN_CONTROL, MSG_PING, MSG_PONG, MSG_SESSION_CONTROL, MSG_TOOL_RESPONSE,
};
use crate::events::topics::{HUMAN_INTERACTION, SESSION_PAUSE, SESSION_RESUME, SESSION_TERMINATE};
use crate::events::EventPayload;
use serde_json::json;

impl ConnectionInner {
    /// Dispatch one decoded inbound frame. Synchronous: replies are enqueued,
    /// bus publications run in place.
    pub(crate) fn dispatch_frame(&self, frame: InboundFrame) {
        match frame.message_type.as_str() {
            MSG_PING => {
                let mut data = EventPayload::new();
                data.insert("received_at".to_string(), json!(now_secs()));
                self.send_message(MSG_PONG, data);
            }
            MSG_HUMAN_CONTROL => self.dispatch_human_control(frame.data),
            MSG_TOOL_RESPONSE => self.dispatch_tool_response(frame.data),
            MSG_SESSION_CONTROL => self.dispatch_session_control(frame.data),
            other => {
                tracing::debug!(
                    session_id = %self.session_id(),
                    message_type = other,
                    "Ignoring unknown message type"
                );
            }
        }
    }

    fn dispatch_human_control(&self, data: EventPayload) {
        let control: HumanControlData = match serde_json::from_value(data.into()) {
            Ok(control) => control,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id(), "Malformed human_control data: {}", e);
                return;
            }
        };

        match control.control_type.as_str() {
            "takeover" | "release" | "message" => {
                let mut payload = EventPayload::new();
                payload.insert("type".to_string(), json!(control.control_type));
                payload.insert("user_id".to_string(), json!(control.user_id));
                if let Some(message) = control.message {
                    payload.insert("message".to_string(), json!(message));
                }
                payload.insert("timestamp".to_string(), json!(control.timestamp));
                self.bus().publish(HUMAN_INTERACTION, &payload);
            }
            other => {
                tracing::debug!(
                    session_id = %self.session_id(),
                    control_type = other,
                    "Ignoring unknown human_control type"
                );
            }
        }
    }

    fn dispatch_tool_response(&self, data: EventPayload) {
        let response: ToolResponseData = match serde_json::from_value(data.into()) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id(), "Malformed tool_response data: {}", e);
                return;
            }
        };

        let topic = format!("tool:{}:response", response.tool_name);
        let mut payload = EventPayload::new();
        payload.insert("tool_name".to_string(), json!(response.tool_name));
        payload.insert("result".to_string(), response.result);
        payload.insert("timestamp".to_string(), json!(response.timestamp));
        self.bus().publish(&topic, &payload);
    }

    fn dispatch_session_control(&self, data: EventPayload) {
        let control: SessionControlData = match serde_json::from_value(data.into()) {
            Ok(control) => control,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id(), "Malformed session_control data: {}", e);
                return;
            }
        };

        let mut payload = EventPayload::new();
        payload.insert("timestamp".to_string(), json!(control.timestamp));

        match control.control_type.as_str() {
            "terminate" => {
                payload.insert("reason".to_string(), json!(control.reason));
                self.bus().publish(SESSION_TERMINATE, &payload);
            }
            "pause" => {
                payload.insert("reason".to_string(), json!(control.reason));
                self.bus().publish(SESSION_PAUSE, &payload);
            }
            "resume" => {
                self.bus().publish(SESSION_RESUME, &payload);
            }
            other => {
                tracing::debug!(
                    session_id = %self.session_id(),
                    control_type = other,
                    "Ignoring unknown session_control type"
                );
            }
        }
    }
}
