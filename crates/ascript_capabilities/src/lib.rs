//! Tool handler trait and the types that cross the safe-runtime boundary.
//!
//! `__safe_callTool` (see `ascript_runtime`) parks a promise, emits
//! `tool_call`, and resumes it with whatever a [`ToolHandler`] produces.
//! The handler never gets to throw the script's way: a rejection or a
//! thrown error on the host side is itself a [`ToolOutcome::Err`], exactly
//! like an application-level tool failure, per the "rejected handler is
//! `{__error:true, code:'TOOL_ERROR', message}`" resolution.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `callTool(name, args)` invocation, already past `STATIC_CALL_TARGET`
/// / `CALL_ARG_VALIDATION` at script-validation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub args: Value,
}

/// What a tool handler resolves a call with. There is no `Result` here:
/// a handler *returning* `Err` and a handler *panicking/throwing* both
/// collapse to this same shape before the script ever sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Ok(Value),
    Err { code: String, message: String },
}

impl ToolOutcome {
    pub fn ok(value: Value) -> Self {
        Self::Ok(value)
    }

    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Err { code: code.into(), message: message.into() }
    }

    /// The default code for a handler that failed without naming one of
    /// its own — the catch-all from the error-kind table.
    pub fn tool_error(message: impl Into<String>) -> Self {
        Self::err("TOOL_ERROR", message)
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::err("UNKNOWN_TOOL", format!("no handler registered for tool '{name}'"))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The `{__error:true, code, message}` JSON value `__safe_callTool`
    /// resolves with on failure, so the script can branch without a throw.
    pub fn into_script_value(self) -> Value {
        match self {
            Self::Ok(v) => v,
            Self::Err { code, message } => serde_json::json!({
                "__error": true,
                "code": code,
                "message": message,
            }),
        }
    }
}

/// Implemented by hosts to answer `callTool` invocations. One instance is
/// bound to a session at creation time (`ascript_broker::SessionManager::
/// create_session`); it outlives every tool call made during that run.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, call: ToolCall) -> ToolOutcome;

    /// Declared tools, for clients that want to introspect the catalog or
    /// for a preset's `STATIC_CALL_TARGET` allowlist to be built from it.
    /// Default: no declared catalog (handler accepts any name it knows
    /// about and rejects the rest at call time).
    fn catalog(&self) -> Vec<CapabilityDescriptor> {
        Vec::new()
    }
}

/// Advertises one tool's name and human-readable purpose. Not a JSON
/// Schema — the guard validates call *shape* (arity, argument types), not
/// per-tool argument schemas, so there's nothing here to validate against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A [`ToolHandler`] backed by a map of async closures, one per tool name.
/// Handy for tests and for hosts whose tools are simple enough not to
/// warrant their own type.
pub struct MapToolHandler {
    handlers: HashMap<String, Box<dyn Fn(Value) -> BoxFuture<'static, ToolOutcome> + Send + Sync>>,
    descriptors: Vec<CapabilityDescriptor>,
}

impl Default for MapToolHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MapToolHandler {
    pub fn new() -> Self {
        Self { handlers: HashMap::new(), descriptors: Vec::new() }
    }

    /// Registers a tool under `name`. `f` must be `'static` because the
    /// handler is shared across the session's lifetime behind an `Arc`.
    pub fn with_tool<F, Fut>(mut self, name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutcome> + Send + 'static,
    {
        let name = name.into();
        self.descriptors.push(CapabilityDescriptor::new(name.clone(), description));
        self.handlers.insert(name, Box::new(move |args| Box::pin(f(args))));
        self
    }
}

#[async_trait]
impl ToolHandler for MapToolHandler {
    async fn call(&self, call: ToolCall) -> ToolOutcome {
        match self.handlers.get(&call.name) {
            Some(handler) => handler(call.args).await,
            None => ToolOutcome::unknown_tool(&call.name),
        }
    }

    fn catalog(&self) -> Vec<CapabilityDescriptor> {
        self.descriptors.clone()
    }
}

/// Bounded-depth structural copy of a tool result before it crosses back
/// into the script: functions can't appear in a `serde_json::Value` to
/// begin with, but depth still needs bounding so a pathological or
/// cyclical-looking host response can't blow the evaluator's stack when
/// it gets re-walked as a JS value.
pub fn sanitize_result(value: &Value, max_depth: u32) -> Value {
    sanitize_at_depth(value, max_depth)
}

fn sanitize_at_depth(value: &Value, remaining: u32) -> Value {
    if remaining == 0 {
        return match value {
            Value::Array(_) | Value::Object(_) => Value::Null,
            other => other.clone(),
        };
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize_at_depth(v, remaining - 1)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), sanitize_at_depth(v, remaining - 1))).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn map_handler_dispatches_by_name() {
        let handler = MapToolHandler::new().with_tool("echo", "echoes its input", |args| async move { ToolOutcome::ok(args) });
        let outcome = handler.call(ToolCall { call_id: "c_1".into(), name: "echo".into(), args: serde_json::json!({"a": 1}) }).await;
        assert_eq!(outcome, ToolOutcome::Ok(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn unregistered_tool_resolves_as_unknown() {
        let handler = MapToolHandler::new();
        let outcome = handler.call(ToolCall { call_id: "c_1".into(), name: "missing".into(), args: Value::Null }).await;
        assert!(matches!(outcome, ToolOutcome::Err { ref code, .. } if code == "UNKNOWN_TOOL"));
    }

    #[test]
    fn into_script_value_wraps_errors_with_error_flag() {
        let outcome = ToolOutcome::tool_error("boom");
        let value = outcome.into_script_value();
        assert_eq!(value["__error"], serde_json::json!(true));
        assert_eq!(value["code"], serde_json::json!("TOOL_ERROR"));
        assert_eq!(value["message"], serde_json::json!("boom"));
    }

    #[test]
    fn sanitize_truncates_beyond_max_depth() {
        let deep = serde_json::json!({"a": {"b": {"c": 1}}});
        let sanitized = sanitize_result(&deep, 2);
        assert_eq!(sanitized, serde_json::json!({"a": {"b": null}}));
    }

    #[test]
    fn sanitize_leaves_shallow_values_untouched() {
        let value = serde_json::json!({"a": [1, 2, 3]});
        assert_eq!(sanitize_result(&value, 10), value);
    }

    #[test]
    fn catalog_reflects_registered_tools() {
        let handler = MapToolHandler::new().with_tool("a", "desc", |_| async { ToolOutcome::ok(Value::Null) });
        assert_eq!(handler.catalog().len(), 1);
        assert_eq!(handler.catalog()[0].name, "a");
    }
}
