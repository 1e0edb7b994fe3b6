//! The concrete [`SessionEffects`] implementation: real `tokio::time`
//! timers for the heartbeat and per-call timeout, backed by a weak handle
//! to the session they're attached to.
//!
//! A session can't hold a strong reference to its own effects and have its
//! effects hold a strong reference back to the session without leaking, so
//! the session owns `Arc<dyn SessionEffects>` and `TokioEffects` is bound
//! to a `Weak<Mutex<Session>>` after the session is itself wrapped in an
//! `Arc` — see `SessionManager::create_session`.

use std::sync::{OnceLock, Weak};
use std::time::Duration;

use ascript_capabilities::ToolOutcome;
use ascript_session::{Session, SessionEffects};
use tokio::sync::Mutex as AsyncMutex;

pub struct TokioEffects {
    session: OnceLock<Weak<AsyncMutex<Session>>>,
}

impl TokioEffects {
    pub fn new() -> Self {
        Self { session: OnceLock::new() }
    }

    /// Must be called exactly once, right after the owning session has been
    /// wrapped in its `Arc`. Timers armed before `bind` is called are
    /// no-ops (there is no session to act on yet, and `start()`/
    /// `begin_tool_call()` are always called after binding in practice).
    pub fn bind(&self, session: Weak<AsyncMutex<Session>>) {
        let _ = self.session.set(session);
    }
}

impl Default for TokioEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEffects for TokioEffects {
    /// Fires every `interval_ms` until the session is terminal, at which
    /// point the ticking task notices on its own next wakeup and exits —
    /// there is no separate disarm signal to send.
    fn arm_heartbeat(&self, interval_ms: u64) {
        let Some(weak) = self.session.get() else { return };
        let weak = weak.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let Some(strong) = weak.upgrade() else { return };
                let session = strong.lock().await;
                if session.is_terminal() {
                    return;
                }
                session.emitter().emit_heartbeat();
            }
        });
    }

    /// No-op: the heartbeat task's own `is_terminal()` check is the disarm.
    fn disarm_heartbeat(&self) {}

    /// Rejects the named call with `TOOL_TIMEOUT` if it is still the
    /// session's pending call once `timeout_ms` has elapsed. If the call
    /// was already resolved (or the session moved on), `submit_tool_result`
    /// observes the call-id mismatch and is a harmless no-op — so there is
    /// nothing to cancel explicitly when the call resolves first.
    fn arm_tool_timeout(&self, call_id: &str, timeout_ms: u64) {
        let Some(weak) = self.session.get() else { return };
        let weak = weak.clone();
        let call_id = call_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            let Some(strong) = weak.upgrade() else { return };
            let mut session = strong.lock().await;
            session.submit_tool_result(&call_id, ToolOutcome::err("TOOL_TIMEOUT", "tool call timed out"));
        });
    }

    /// No-op, see `arm_tool_timeout`.
    fn disarm_tool_timeout(&self, _call_id: &str) {}
}
