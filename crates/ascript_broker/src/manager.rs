//! Session manager and executor (component I): the `create_session`
//! pipeline, the session table, and the background task that drives each
//! session's evaluator to completion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};

use ascript_capabilities::{ToolHandler, ToolOutcome};
use ascript_events::ErrorInfo;
use ascript_presets::Preset;
use ascript_runtime::Evaluator;
use ascript_session::Session;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::dispatch::ToolDispatchSink;
use crate::effects::TokioEffects;

pub type SharedSession = Arc<AsyncMutex<Session>>;

/// Owns every live session behind one exclusive lock, held only for the
/// brief insert/lookup/remove operations; nothing ever awaits while
/// holding it.
pub struct SessionManager {
    sessions: SyncMutex<HashMap<String, SharedSession>>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Arc<Self> {
        Arc::new(Self { sessions: SyncMutex::new(HashMap::new()), max_sessions })
    }

    fn at_capacity(&self) -> bool {
        self.sessions.lock().unwrap().len() >= self.max_sessions
    }

    fn insert(&self, session_id: String, session: SharedSession) {
        self.sessions.lock().unwrap().insert(session_id, session);
    }

    fn remove(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
    }

    pub fn get_session(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().keys().cloned().collect()
    }

    /// Runs the full parse → validate → rewrite pipeline and, on success,
    /// starts the session asynchronously. On any pipeline failure the
    /// returned session is already terminal: it carries exactly the
    /// `session_init` + `final{ok:false, error:...}` pair the failure
    /// produced, and is never added to the session table (there is nothing
    /// left to route inbound messages to).
    pub async fn create_session(
        self: &Arc<Self>,
        code: &str,
        preset: &Preset,
        tool_handler: Arc<dyn ToolHandler>,
    ) -> SharedSession {
        let effects = Arc::new(TokioEffects::new());
        let mut session = Session::new(preset.limits, effects.clone());
        let session_id = session.session_id().to_string();
        let cancel_url = format!("/sessions/{session_id}/cancel");
        let expires_at = session.expires_at_iso8601().to_string();
        session.emitter().emit_session_init(cancel_url, expires_at, ascript_events::EncryptionInfo::disabled(), None);

        if self.at_capacity() {
            warn!(session_id, "rejecting create_session: at max_sessions capacity");
            session.fail(ErrorInfo::new("too many concurrent sessions").with_code("RUNTIME_ERROR"));
            return Arc::new(AsyncMutex::new(session));
        }

        let parsed = match ascript_ast::parse(code) {
            Ok(parsed) => parsed,
            Err(e) => {
                session.fail(ErrorInfo::new(e.to_string()).with_code("PARSE_ERROR"));
                return Arc::new(AsyncMutex::new(session));
            }
        };

        let validation = ascript_guard::validate(&parsed.tree, code, preset);
        if !validation.valid {
            let issues: Vec<Value> = validation.issues.iter().filter_map(|i| serde_json::to_value(i).ok()).collect();
            let message = validation
                .errors()
                .map(|i| format!("{}: {}", i.code, i.message))
                .collect::<Vec<_>>()
                .join("; ");
            session.fail(ErrorInfo::new(message).with_code("VALIDATION_ERROR").with_issues(issues));
            return Arc::new(AsyncMutex::new(session));
        }

        let rewritten = match ascript_rewriter::rewrite(&parsed.tree, preset) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                session.fail(ErrorInfo::new(e.to_string()).with_code("REWRITE_ERROR"));
                return Arc::new(AsyncMutex::new(session));
            }
        };

        let session = Arc::new(AsyncMutex::new(session));
        effects.bind(Arc::downgrade(&session));

        self.replace_existing(&session_id, session.clone());

        {
            let guard = session.lock().await;
            let sink = ToolDispatchSink::new(session.clone(), tool_handler);
            guard.emitter().subscribe(sink);
        }

        info!(session_id, "session created, spawning evaluator");
        let manager = self.clone();
        let run_session = session.clone();
        tokio::spawn(async move {
            manager.run_to_completion(session_id, run_session, rewritten.source).await;
        });

        session
    }

    /// A previous map entry under the same ID (practically unreachable
    /// given the ID generator's entropy, but the state machine's failure
    /// table names it explicitly) is disposed first: its pending tool call
    /// is rejected as `SESSION_REPLACED` before the new entry takes its
    /// place.
    fn replace_existing(&self, session_id: &str, new_session: SharedSession) {
        let previous = {
            let mut sessions = self.sessions.lock().unwrap();
            let previous = sessions.remove(session_id);
            sessions.insert(session_id.to_string(), new_session);
            previous
        };
        if let Some(previous) = previous {
            tokio::spawn(async move {
                previous.lock().await.fail(ErrorInfo::new("session replaced by a new session with the same id").with_code("SESSION_REPLACED"));
            });
        }
    }

    async fn run_to_completion(self: Arc<Self>, session_id: String, session: SharedSession, safe_source: String) {
        let (budget, emitter) = {
            let mut guard = session.lock().await;
            guard.start();
            (guard.budget().clone(), guard.emitter().clone())
        };

        let outcome = match Evaluator::new().await {
            Ok(evaluator) => evaluator.run(&safe_source, session.clone(), budget, emitter).await,
            Err(e) => Err(e),
        };

        {
            let mut guard = session.lock().await;
            match outcome {
                Ok(value) => guard.complete(value),
                Err(e) => guard.fail(ErrorInfo::new(e.to_string()).with_code(e.code())),
            }
        }

        self.remove(&session_id);
    }

    pub async fn terminate_session(&self, session_id: &str, reason: Option<String>) -> bool {
        let Some(session) = self.get_session(session_id) else { return false };
        session.lock().await.cancel(reason);
        true
    }

    pub async fn submit_tool_result(&self, session_id: &str, call_id: &str, outcome: ToolOutcome) -> bool {
        let Some(session) = self.get_session(session_id) else { return false };
        matches!(
            session.lock().await.submit_tool_result(call_id, outcome),
            ascript_session::SubmitOutcome::Applied
        )
    }

    /// Cancels every live session. Intended for host shutdown: after this
    /// returns, every session has emitted its final event, but their
    /// background tasks may still be unwinding the evaluator and removing
    /// themselves from the table a moment later.
    pub async fn dispose(&self) {
        let sessions: Vec<SharedSession> = self.sessions.lock().unwrap().values().cloned().collect();
        for session in sessions {
            session.lock().await.cancel(Some("broker shutting down".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_capabilities::MapToolHandler;
    use ascript_presets::{Profile, SecurityLevel, stock_preset};
    use ascript_session::SessionState;

    fn preset(level: SecurityLevel) -> Preset {
        stock_preset(level, Profile::AgentScript)
    }

    fn handler() -> Arc<dyn ToolHandler> {
        Arc::new(MapToolHandler::new().with_tool("echo", "echoes", |args| async move { ToolOutcome::ok(args) }))
    }

    #[tokio::test]
    async fn a_valid_script_runs_to_completion() {
        let manager = SessionManager::new(10);
        let session = manager.create_session("return 1 + 1;", &preset(SecurityLevel::Standard), handler()).await;
        for _ in 0..50 {
            if session.lock().await.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Completed);
        let history = guard.emitter().history();
        assert!(history.iter().any(|e| matches!(&e.payload, ascript_events::EventPayload::SessionInit(_))));
    }

    #[tokio::test]
    async fn a_script_using_a_tool_call_completes_via_the_dispatch_sink() {
        let manager = SessionManager::new(10);
        let code = "const r = callTool('echo', { a: 1 }); r;";
        let session = manager.create_session(code, &preset(SecurityLevel::Standard), handler()).await;
        for _ in 0..100 {
            if session.lock().await.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn a_script_using_eval_never_starts_and_reports_validation_error() {
        let manager = SessionManager::new(10);
        let session = manager.create_session("eval('1+1');", &preset(SecurityLevel::Standard), handler()).await;
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Failed);
        assert!(manager.get_session(guard.session_id()).is_none());
        let history = guard.emitter().history();
        let final_event = history
            .iter()
            .find_map(|e| if let ascript_events::EventPayload::Final(p) = &e.payload { Some(p) } else { None })
            .unwrap();
        assert!(!final_event.ok);
        assert_eq!(final_event.error.as_ref().unwrap().code.as_deref(), Some("VALIDATION_ERROR"));
        assert!(final_event.error.as_ref().unwrap().issues.is_some());
    }

    #[tokio::test]
    async fn unparseable_source_reports_parse_error() {
        let manager = SessionManager::new(10);
        let session = manager.create_session("const a = 'unterminated", &preset(SecurityLevel::Standard), handler()).await;
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Failed);
        let history = guard.emitter().history();
        let final_event = history
            .iter()
            .find_map(|e| if let ascript_events::EventPayload::Final(p) = &e.payload { Some(p) } else { None })
            .unwrap();
        assert_eq!(final_event.error.as_ref().unwrap().code.as_deref(), Some("PARSE_ERROR"));
    }

    #[tokio::test]
    async fn at_capacity_rejects_new_sessions_without_touching_the_table() {
        let manager = SessionManager::new(0);
        let session = manager.create_session("1;", &preset(SecurityLevel::Standard), handler()).await;
        let guard = session.lock().await;
        assert_eq!(guard.state(), SessionState::Failed);
        assert!(manager.list_sessions().is_empty());
    }

    #[tokio::test]
    async fn terminate_session_cancels_a_running_session() {
        let manager = SessionManager::new(10);
        let code = "const r = callTool('echo', {}); r;";
        let session = manager.create_session(code, &preset(SecurityLevel::Standard), handler()).await;
        let session_id = session.lock().await.session_id().to_string();
        let terminated = manager.terminate_session(&session_id, Some("stop".into())).await;
        assert!(terminated);
        for _ in 0..50 {
            if session.lock().await.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(session.lock().await.is_terminal());
    }
}
