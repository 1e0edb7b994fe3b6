//! Inbound control messages: broker → runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::ErrorInfo;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlMessage {
    ToolResultSubmit(ToolResultSubmitPayload),
    Cancel(CancelPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultSubmitPayload {
    pub call_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CancelPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_submit_round_trips() {
        let msg = ControlMessage::ToolResultSubmit(ToolResultSubmitPayload {
            call_id: "c_1".into(),
            ok: true,
            result: Some(Value::from("Alice")),
            error: None,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"tool_result_submit\""));
        let back: ControlMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn cancel_with_no_reason_omits_the_field() {
        let msg = ControlMessage::Cancel(CancelPayload::default());
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"cancel","payload":{}}"#);
    }
}
