//! The `Session` struct: state, pending tool call, stats, and the
//! transition methods that enforce the legal-transition table and run the
//! terminal-state cleanup described in the state machine's effects list.

use std::sync::Arc;

use ascript_capabilities::ToolOutcome;
use ascript_common::ids::new_session_id;
use ascript_common::time::{Tick, iso8601_plus_ms};
use ascript_events::{Emitter, ErrorInfo, FinalStats};
use ascript_presets::RuntimeLimits;
use ascript_resources::ResourceBudget;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::effects::{SessionEffects, TransitionObserver};
use crate::state::SessionState;

/// A `callTool` invocation parked waiting for `tool_result_submit`.
pub struct PendingToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
    pub started_at: Tick,
    resolver: oneshot::Sender<ToolOutcome>,
}

/// Result of applying an inbound `tool_result_submit` — distinguishes
/// "resumed the script" from the ways an invalid message is silently
/// ignored (logged by the caller, never raised into script state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Applied,
    IgnoredTerminalSession,
    IgnoredNoPendingCall,
    IgnoredCallIdMismatch,
}

pub struct Session {
    session_id: String,
    state: SessionState,
    emitter: Arc<Emitter>,
    budget: Arc<ResourceBudget>,
    effects: Arc<dyn SessionEffects>,
    observers: Vec<Box<dyn TransitionObserver>>,
    pending: Option<PendingToolCall>,
    created_at: Tick,
    expires_at: Tick,
    expires_at_iso8601: String,
    end_ms: Option<u64>,
}

impl Session {
    pub fn new(limits: RuntimeLimits, effects: Arc<dyn SessionEffects>) -> Self {
        let session_id = new_session_id();
        let created_at = Tick::now();
        Self {
            emitter: Arc::new(Emitter::new(session_id.clone())),
            budget: Arc::new(ResourceBudget::new(limits)),
            effects,
            observers: Vec::new(),
            pending: None,
            created_at,
            expires_at: created_at.plus_ms(limits.session_ttl_ms),
            expires_at_iso8601: iso8601_plus_ms(limits.session_ttl_ms),
            state: SessionState::Starting,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn emitter(&self) -> &Arc<Emitter> {
        &self.emitter
    }

    pub fn budget(&self) -> &Arc<ResourceBudget> {
        &self.budget
    }

    pub fn expires_at(&self) -> Tick {
        self.expires_at
    }

    pub fn expires_at_iso8601(&self) -> &str {
        &self.expires_at_iso8601
    }

    pub fn pending_tool_call(&self) -> Option<(&str, &str, &Value)> {
        self.pending.as_ref().map(|p| (p.call_id.as_str(), p.tool_name.as_str(), &p.args))
    }

    pub fn add_observer(&mut self, observer: impl TransitionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// `starting -> running`. Arms the heartbeat timer if configured.
    pub fn start(&mut self) {
        self.transition(SessionState::Running);
        let interval = self.budget.limits().heartbeat_interval_ms;
        if interval > 0 {
            self.effects.arm_heartbeat(interval);
        }
    }

    /// `running -> waiting_for_tool`. Records the pending call, checks the
    /// tool-call budget, and arms the per-call timeout. Returns the
    /// `oneshot::Receiver` the evaluator awaits for the resolution.
    ///
    /// Returns `Err` (and transitions straight to `failed`) if the tool-call
    /// budget is already exhausted.
    pub fn begin_tool_call(
        &mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
    ) -> Result<oneshot::Receiver<ToolOutcome>, ascript_resources::LimitError> {
        self.budget.record_tool_call()?;
        let call_id = call_id.into();
        let tool_name = tool_name.into();
        let (tx, rx) = oneshot::channel();
        self.effects.arm_tool_timeout(&call_id, self.budget.limits().tool_timeout_ms);
        self.emitter.emit_tool_call(call_id.clone(), tool_name.clone(), args.clone());
        self.pending = Some(PendingToolCall {
            call_id,
            tool_name,
            args,
            started_at: Tick::now(),
            resolver: tx,
        });
        self.transition(SessionState::WaitingForTool);
        Ok(rx)
    }

    /// `waiting_for_tool -> running`, applying an inbound
    /// `tool_result_submit`. Any mismatch is reported via [`SubmitOutcome`]
    /// rather than panicking — this is untrusted external input, not a
    /// state-machine misuse.
    pub fn submit_tool_result(&mut self, call_id: &str, outcome: ToolOutcome) -> SubmitOutcome {
        if self.is_terminal() {
            return SubmitOutcome::IgnoredTerminalSession;
        }
        let Some(pending) = &self.pending else {
            warn!(call_id, "tool_result_submit with no pending call");
            return SubmitOutcome::IgnoredNoPendingCall;
        };
        if pending.call_id != call_id {
            warn!(call_id, expected = %pending.call_id, "tool_result_submit callId mismatch");
            return SubmitOutcome::IgnoredCallIdMismatch;
        }
        let pending = self.pending.take().expect("checked Some above");
        self.effects.disarm_tool_timeout(&pending.call_id);
        self.emitter.emit_tool_result_applied(pending.call_id);
        let _ = pending.resolver.send(outcome);
        self.transition(SessionState::Running);
        SubmitOutcome::Applied
    }

    /// `running -> completed`. Emits the success `final` event.
    pub fn complete(&mut self, result: Value) {
        if self.is_terminal() {
            return;
        }
        let stats = self.final_stats();
        self.emitter.emit_final_success(result, stats);
        self.terminal_transition(SessionState::Completed, None);
    }

    /// Any non-terminal state `-> failed`. Emits the failure `final` event
    /// with the given error.
    pub fn fail(&mut self, error: ErrorInfo) {
        if self.is_terminal() {
            return;
        }
        let stats = self.final_stats();
        self.emitter.emit_final_error(error, stats);
        self.terminal_transition(SessionState::Failed, Some("SESSION_FAILED"));
    }

    /// Any non-terminal state `-> cancelled`. Idempotent: a second call on
    /// an already-terminal session is a silent no-op, matching "terminal is
    /// absorbing".
    pub fn cancel(&mut self, reason: Option<String>) {
        if self.is_terminal() {
            return;
        }
        self.budget.request_abort();
        let message = reason.unwrap_or_else(|| "session cancelled".to_string());
        let stats = self.final_stats();
        self.emitter.emit_final_error(ErrorInfo::new(message).with_code("SESSION_CANCELLED"), stats);
        self.terminal_transition(SessionState::Cancelled, Some("SESSION_CANCELLED"));
    }

    /// TTL expiry is handled as a cancel with a dedicated error code.
    pub fn expire(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.budget.request_abort();
        let stats = self.final_stats();
        self.emitter.emit_final_error(ErrorInfo::new("session exceeded its TTL").with_code("TTL_EXPIRED"), stats);
        self.terminal_transition(SessionState::Cancelled, Some("TTL_EXPIRED"));
    }

    fn final_stats(&self) -> FinalStats {
        let snapshot = self.budget.snapshot();
        FinalStats {
            duration_ms: snapshot.duration_ms,
            tool_call_count: snapshot.tool_call_count,
            stdout_bytes: snapshot.stdout_bytes,
        }
    }

    /// Shared terminal cleanup: disarm timers, reject any pending call,
    /// record `endMs`, transition state.
    fn terminal_transition(&mut self, to: SessionState, pending_rejection_code: Option<&'static str>) {
        self.effects.disarm_heartbeat();
        if let Some(pending) = self.pending.take() {
            self.effects.disarm_tool_timeout(&pending.call_id);
            let code = pending_rejection_code.unwrap_or("SESSION_FAILED");
            let _ = pending.resolver.send(ToolOutcome::err(code, "session ended before the tool call resolved"));
        }
        self.end_ms = Some(self.created_at.elapsed_ms());
        self.transition(to);
        debug!(session_id = %self.session_id, state = ?to, "session reached a terminal state");
    }

    /// Validates and applies a transition, panicking on anything the
    /// legal-transition table doesn't allow — an illegal transition here
    /// indicates a bug in the code driving the session, not in the script
    /// it's running.
    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        assert!(
            from.can_transition_to(to),
            "illegal session transition: {from:?} -> {to:?}"
        );
        self.state = to;
        for observer in &self.observers {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| observer.on_transition(from, to)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_presets::{Profile, SecurityLevel, stock_preset};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn limits() -> RuntimeLimits {
        stock_preset(SecurityLevel::Standard, Profile::AgentScript).limits
    }

    fn session() -> Session {
        Session::new(limits(), Arc::new(()))
    }

    #[test]
    fn a_fresh_session_starts_in_starting_state() {
        let s = session();
        assert_eq!(s.state(), SessionState::Starting);
    }

    #[test]
    fn happy_path_reaches_completed_via_one_tool_call() {
        let mut s = session();
        s.start();
        assert_eq!(s.state(), SessionState::Running);
        let _rx = s.begin_tool_call("c_1", "search", serde_json::json!({})).unwrap();
        assert_eq!(s.state(), SessionState::WaitingForTool);
        let outcome = s.submit_tool_result("c_1", ToolOutcome::ok(serde_json::json!("ok")));
        assert_eq!(outcome, SubmitOutcome::Applied);
        assert_eq!(s.state(), SessionState::Running);
        s.complete(serde_json::json!(42));
        assert_eq!(s.state(), SessionState::Completed);
    }

    #[test]
    fn mismatched_call_id_is_ignored_not_panicking() {
        let mut s = session();
        s.start();
        let _rx = s.begin_tool_call("c_1", "search", Value::Null).unwrap();
        let outcome = s.submit_tool_result("c_wrong", ToolOutcome::ok(Value::Null));
        assert_eq!(outcome, SubmitOutcome::IgnoredCallIdMismatch);
        assert_eq!(s.state(), SessionState::WaitingForTool);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = session();
        s.start();
        s.cancel(Some("stop".into()));
        assert_eq!(s.state(), SessionState::Cancelled);
        s.cancel(Some("stop again".into()));
        assert_eq!(s.state(), SessionState::Cancelled);
    }

    #[test]
    fn cancel_rejects_a_pending_tool_call() {
        let mut s = session();
        s.start();
        let mut rx = s.begin_tool_call("c_1", "search", Value::Null).unwrap();
        s.cancel(None);
        let outcome = rx.try_recv().unwrap();
        assert!(matches!(outcome, ToolOutcome::Err { code, .. } if code == "SESSION_CANCELLED"));
    }

    #[test]
    #[should_panic(expected = "illegal session transition")]
    fn completing_before_running_panics_as_a_host_bug() {
        let mut s = session();
        s.complete(Value::Null);
    }

    #[test]
    fn observers_are_invoked_in_order_and_survive_a_panicking_one() {
        let mut s = session();
        let calls = Arc::new(AtomicU32::new(0));
        s.add_observer(|_from: SessionState, _to: SessionState| panic!("bad observer"));
        let calls_clone = calls.clone();
        s.add_observer(move |_from: SessionState, _to: SessionState| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        s.start();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
