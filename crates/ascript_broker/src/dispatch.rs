//! Bridges a session's `tool_call` events to a bound [`ToolHandler`] and
//! resumes the parked call with `Session::submit_tool_result`.
//!
//! This is the only thing in the crate that actually invokes a tool
//! handler — `ascript_runtime`'s native `__call_tool_native` only ever
//! parks against `Session::begin_tool_call` and waits.

use std::sync::Arc;

use ascript_capabilities::{ToolCall, ToolHandler};
use ascript_events::{Event, EventPayload, EventSink};
use ascript_session::Session;
use tokio::sync::Mutex as AsyncMutex;

pub struct ToolDispatchSink {
    session: Arc<AsyncMutex<Session>>,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDispatchSink {
    pub fn new(session: Arc<AsyncMutex<Session>>, handler: Arc<dyn ToolHandler>) -> Self {
        Self { session, handler }
    }
}

impl EventSink for ToolDispatchSink {
    fn on_event(&self, event: &Event) {
        let EventPayload::ToolCall(payload) = &event.payload else { return };
        let session = self.session.clone();
        let handler = self.handler.clone();
        let call = ToolCall { call_id: payload.call_id.clone(), name: payload.tool_name.clone(), args: payload.args.clone() };
        tokio::spawn(async move {
            let call_id = call.call_id.clone();
            let outcome = handler.call(call).await;
            let mut session = session.lock().await;
            session.submit_tool_result(&call_id, outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_capabilities::{MapToolHandler, ToolOutcome};
    use ascript_presets::{Profile, SecurityLevel, stock_preset};
    use ascript_session::Session;

    #[tokio::test]
    async fn a_tool_call_event_is_answered_and_resumes_the_session() {
        let limits = stock_preset(SecurityLevel::Standard, Profile::AgentScript).limits;
        let mut session = Session::new(limits, Arc::new(()));
        session.start();
        let session = Arc::new(AsyncMutex::new(session));

        let handler: Arc<dyn ToolHandler> =
            Arc::new(MapToolHandler::new().with_tool("echo", "echoes", |args| async move { ToolOutcome::ok(args) }));
        let sink = ToolDispatchSink::new(session.clone(), handler);
        session.lock().await.emitter().subscribe(sink);

        let rx = {
            let mut guard = session.lock().await;
            guard.begin_tool_call("c_1", "echo", serde_json::json!({"a": 1})).unwrap()
        };
        let outcome = rx.await.unwrap();
        assert_eq!(outcome, ToolOutcome::Ok(serde_json::json!({"a": 1})));
    }
}
