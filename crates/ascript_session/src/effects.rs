//! Side effects a [`crate::Session`] triggers on its owner (the executor)
//! without knowing how timers or scheduling actually work — keeps the state
//! machine itself free of any particular async runtime's timer API.

use crate::state::SessionState;

/// Implemented by whatever drives a session's timers. All methods are
/// no-ops by default so tests can use `()` as a stand-in.
pub trait SessionEffects: Send + Sync {
    fn arm_heartbeat(&self, _interval_ms: u64) {}
    fn disarm_heartbeat(&self) {}
    fn arm_tool_timeout(&self, _call_id: &str, _timeout_ms: u64) {}
    fn disarm_tool_timeout(&self, _call_id: &str) {}
}

impl SessionEffects for () {}

/// Observer invoked on every transition, in registration order, after the
/// built-in state effects have run. A panicking observer is caught and
/// discarded — one bad subscriber does not corrupt the session.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, from: SessionState, to: SessionState);
}

impl<F: Fn(SessionState, SessionState) + Send + Sync> TransitionObserver for F {
    fn on_transition(&self, from: SessionState, to: SessionState) {
        self(from, to)
    }
}
