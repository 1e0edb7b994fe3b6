//! Outbound event types: the runtime → broker → client stream.
//!
//! `Event` is adjacently tagged (`type` + `payload`) so the wire shape is
//! `{protocolVersion, sessionId, seq, type, payload}` exactly as the
//! external interface describes it, with every payload field in
//! `camelCase` to match a JS-authored client.

use ascript_common::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub seq: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(session_id: impl Into<String>, seq: u64, payload: EventPayload) -> Self {
        Self { protocol_version: PROTOCOL_VERSION, session_id: session_id.into(), seq, payload }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    SessionInit(SessionInitPayload),
    Stdout(StdoutPayload),
    Log(LogPayload),
    ToolCall(ToolCallPayload),
    ToolResultApplied(ToolResultAppliedPayload),
    Final(FinalPayload),
    Heartbeat(HeartbeatPayload),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionInfo {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl EncryptionInfo {
    pub fn disabled() -> Self {
        Self { enabled: false, key_id: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInitPayload {
    pub cancel_url: String,
    pub expires_at: String,
    pub encryption: EncryptionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StdoutPayload {
    pub chunk: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogPayload {
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultAppliedPayload {
    pub call_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Populated for `VALIDATION_ERROR`: the guard's rejected-rule issues,
    /// each serialized from a `ValidationIssue`. Opaque JSON here so this
    /// crate doesn't need to depend on the guard just to shape this field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Value>>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None, stack: None, issues: None }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_issues(mut self, issues: Vec<Value>) -> Self {
        self.issues = Some(issues);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinalStats {
    pub duration_ms: u64,
    pub tool_call_count: u64,
    pub stdout_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalPayload {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FinalStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatPayload {
    pub ts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_init_serializes_with_adjacent_tag_and_camel_case_fields() {
        let event = Event::new(
            "s_abc",
            0,
            EventPayload::SessionInit(SessionInitPayload {
                cancel_url: "https://example/cancel".into(),
                expires_at: "2026-07-26T00:00:00.000Z".into(),
                encryption: EncryptionInfo::disabled(),
                replay_url: None,
            }),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_init");
        assert_eq!(json["protocolVersion"], 1);
        assert_eq!(json["payload"]["cancelUrl"], "https://example/cancel");
        assert!(json["payload"].get("replayUrl").is_none());
    }

    #[test]
    fn final_event_round_trips_through_json() {
        let event = Event::new(
            "s_abc",
            3,
            EventPayload::Final(FinalPayload {
                ok: true,
                result: Some(Value::from(4)),
                error: None,
                stats: Some(FinalStats { duration_ms: 12, tool_call_count: 0, stdout_bytes: 0 }),
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
