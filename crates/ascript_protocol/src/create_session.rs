//! The `create-session` request DTO a client sends the broker.

use ascript_presets::RuntimeLimits;
use serde::{Deserialize, Serialize};

/// Every field is optional; unset fields fall back to the level's stock
/// [`RuntimeLimits`] when the broker builds the session's preset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LimitOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_ttl_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stdout_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_result_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,
}

impl LimitOverrides {
    /// Applies each set field on top of `base`, leaving the rest untouched.
    pub fn apply(&self, base: RuntimeLimits) -> RuntimeLimits {
        RuntimeLimits {
            session_ttl_ms: self.session_ttl_ms.unwrap_or(base.session_ttl_ms),
            max_tool_calls: self.max_tool_calls.unwrap_or(base.max_tool_calls),
            max_stdout_bytes: self.max_stdout_bytes.unwrap_or(base.max_stdout_bytes),
            max_tool_result_bytes: self.max_tool_result_bytes.unwrap_or(base.max_tool_result_bytes),
            tool_timeout_ms: self.tool_timeout_ms.unwrap_or(base.tool_timeout_ms),
            heartbeat_interval_ms: self.heartbeat_interval_ms.unwrap_or(base.heartbeat_interval_ms),
            ..base
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    Disabled,
    Optional,
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionRequest {
    pub mode: EncryptionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_hello: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub protocol_version: u32,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionRequest>,
}

impl CreateSessionRequest {
    pub fn is_protocol_version_supported(&self) -> bool {
        self.protocol_version == ascript_common::PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_presets::{Profile, SecurityLevel, stock_preset};

    #[test]
    fn a_bare_request_deserializes_with_no_optional_fields() {
        let json = r#"{"protocolVersion":1,"code":"callTool('x', {})"}"#;
        let request: CreateSessionRequest = serde_json::from_str(json).unwrap();
        assert!(request.limits.is_none());
        assert!(request.encryption.is_none());
        assert!(request.is_protocol_version_supported());
    }

    #[test]
    fn mismatched_protocol_version_is_reported_as_unsupported() {
        let json = r#"{"protocolVersion":2,"code":"1"}"#;
        let request: CreateSessionRequest = serde_json::from_str(json).unwrap();
        assert!(!request.is_protocol_version_supported());
    }

    #[test]
    fn limit_overrides_apply_only_the_fields_that_were_set() {
        let base = stock_preset(SecurityLevel::Standard, Profile::AgentScript).limits;
        let overrides = LimitOverrides { max_tool_calls: Some(3), ..Default::default() };
        let merged = overrides.apply(base);
        assert_eq!(merged.max_tool_calls, 3);
        assert_eq!(merged.max_iterations, base.max_iterations);
    }
}
