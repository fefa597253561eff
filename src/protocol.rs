//! The shared WebSocket envelope (SPEC_FULL.md §6) and its message-type
//! constants, plus small typed payload structs for the handshake and chat
//! messages. Every relay endpoint speaks this one envelope shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MSG_AUTH: &str = "auth";
pub const MSG_AUTH_OK: &str = "auth_ok";
pub const MSG_AUTH_ERROR: &str = "auth_error";
pub const MSG_CHAT: &str = "chat";
pub const MSG_CHAT_SEND: &str = "chat.send";
pub const MSG_CHAT_REPLY: &str = "chat_reply";
pub const MSG_HEARTBEAT: &str = "heartbeat";
pub const MSG_HEARTBEAT_ACK: &str = "heartbeat_ack";
pub const MSG_SYSTEM: &str = "system";
pub const MSG_ERROR: &str = "error";
pub const MSG_BOARD_STATE: &str = "board.state";
pub const MSG_TASK_CREATED: &str = "task.created";
pub const MSG_TASK_UPDATED: &str = "task.updated";
pub const MSG_TASK_DELETED: &str = "task.deleted";
pub const MSG_TASK_MOVE: &str = "task.move";
pub const MSG_TASK_CREATE: &str = "task.create";
pub const MSG_SUGGESTION_NEW: &str = "suggestion.new";

pub const CLOSE_UNAUTHENTICATED: u16 = 4001;
pub const CLOSE_ENTITY_ABSENT: u16 = 4004;

/// The one envelope shape every WS endpoint reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            payload: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn auth_ok(payload: Value) -> Self {
        Self::new(MSG_AUTH_OK).with_payload(payload)
    }

    pub fn auth_error(reason: &str) -> Self {
        Self::new(MSG_AUTH_ERROR).with_payload(serde_json::json!({ "reason": reason }))
    }

    pub fn heartbeat_ack(id: Option<String>) -> Self {
        let mut env = Self::new(MSG_HEARTBEAT_ACK);
        env.id = id;
        env
    }

    pub fn error(reason: &str) -> Self {
        Self::new(MSG_ERROR).with_payload(serde_json::json!({ "reason": reason }))
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        // R1: serialize(deserialize(x)) carries the same semantic content.
        let env = Envelope::new(MSG_CHAT)
            .with_id("m1")
            .with_payload(serde_json::json!({"agent_id": "A1", "content": "Hi"}));
        let raw = env.to_json();
        let parsed = Envelope::parse(&raw).unwrap();
        assert_eq!(parsed.kind, MSG_CHAT);
        assert_eq!(parsed.id.as_deref(), Some("m1"));
        assert_eq!(parsed.payload, env.payload);
    }

    #[test]
    fn omits_absent_optional_fields() {
        let env = Envelope::new(MSG_HEARTBEAT);
        let raw = env.to_json();
        assert!(!raw.contains("\"id\""));
        assert!(!raw.contains("\"payload\""));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Envelope::parse("not json").is_err());
    }
}
