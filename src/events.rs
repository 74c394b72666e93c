//! Realtime event vocabulary, carried as JSON text frames:
//! `{"event": "<name>", "data": {...}}`.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Events pushed from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Sent once, only to a freshly created web guest, so the client can
    /// persist the assigned id for future reconnects.
    #[serde(rename_all = "camelCase")]
    YourId { guest_id: String },

    #[serde(rename_all = "camelCase")]
    NewMessage {
        message_id: String,
        /// Present when the event targets admins (they track many threads);
        /// omitted toward the conversation owner.
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        media_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
        direction: String,
        created_at: String,
    },

    #[serde(rename_all = "camelCase")]
    Typing {
        /// Carried toward admins; admin-to-owner typing has no payload.
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Seen { conversation_id: String },

    #[serde(rename_all = "camelCase")]
    Notification {
        #[serde(rename = "type")]
        kind: String,
        /// Correlation id for system events (order/request/wish-list id).
        #[serde(skip_serializing_if = "Option::is_none")]
        reference_id: Option<String>,
        /// Per-language text set for admin broadcast notifications.
        #[serde(skip_serializing_if = "Option::is_none")]
        translations: Option<HashMap<String, String>>,
    },
}

impl ServerEvent {
    /// Serialize into a WebSocket text frame. Serialization failure is a
    /// programming error on our own types; it is logged and the event
    /// dropped rather than propagated (delivery is best-effort anyway).
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text.into())),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize realtime event");
                None
            }
        }
    }
}

/// Events received from clients over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Typing {
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        message_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Seen { message_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_omits_absent_fields() {
        let event = ServerEvent::NewMessage {
            message_id: "m1".into(),
            conversation_id: None,
            media_type: "text".into(),
            text: Some("hello".into()),
            file_path: None,
            direction: "answer".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "newMessage");
        assert_eq!(json["data"]["text"], "hello");
        assert!(json["data"].get("conversationId").is_none());
        assert!(json["data"].get("filePath").is_none());
    }

    #[test]
    fn client_event_round_trip() {
        let raw = r#"{"event":"seen","data":{"messageId":"abc"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::Seen { message_id } => assert_eq!(message_id, "abc"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn typing_without_payload_parses() {
        let raw = r#"{"event":"typing","data":{}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            event,
            ClientEvent::Typing {
                conversation_id: None,
                message_type: None
            }
        ));
    }
}
