//! Binds one rewritten script to a fresh QuickJS context, installs the
//! `__safe_*` surface, and drives `__ag_main()` to completion.

use std::sync::Arc;

use ascript_events::Emitter;
use ascript_resources::ResourceBudget;
use ascript_session::Session;
use rquickjs::context::EvalOptions;
use rquickjs::{AsyncContext, AsyncRuntime, CatchResultExt, Promise, Value as JsValue, async_with};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::bootstrap::BOOTSTRAP_JS;
use crate::primitives;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to initialize the JS runtime: {0}")]
    Init(String),
    #[error("failed to install native primitives: {0}")]
    PrimitiveInstall(String),
    #[error("script threw: {0}")]
    Threw(String),
}

impl EvalError {
    /// The error-kind code this failure surfaces as on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Init(_) | Self::PrimitiveInstall(_) => "RUNTIME_ERROR",
            Self::Threw(_) => "EXECUTION_ERROR",
        }
    }
}

/// One evaluator instance per session; disposed when the session reaches a
/// terminal state.
pub struct Evaluator {
    #[allow(dead_code)]
    runtime: AsyncRuntime,
    context: AsyncContext,
}

/// 64 MiB: generous for an agent script that only ever holds small
/// tool-call payloads and local variables, but bounds a pathological
/// allocation loop independent of the iteration counter.
const MEMORY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

impl Evaluator {
    pub async fn new() -> Result<Self, EvalError> {
        let runtime = AsyncRuntime::new().map_err(|e| EvalError::Init(e.to_string()))?;
        runtime.set_memory_limit(MEMORY_LIMIT_BYTES).await;
        let context = AsyncContext::full(&runtime).await.map_err(|e| EvalError::Init(e.to_string()))?;
        Ok(Self { runtime, context })
    }

    /// Runs one rewritten script to completion and returns its resolved
    /// value as JSON. `safe_source` must already declare exactly one
    /// top-level `async function __ag_main() { ... }` (the rewriter's
    /// output contract).
    pub async fn run(
        &self,
        safe_source: &str,
        session: Arc<AsyncMutex<Session>>,
        budget: Arc<ResourceBudget>,
        emitter: Arc<Emitter>,
    ) -> Result<Value, EvalError> {
        let program = format!("{safe_source}\n__ag_main();");

        async_with!(self.context => |ctx| {
            primitives::install(&ctx, budget, session, emitter)
                .catch(&ctx)
                .map_err(|e| EvalError::PrimitiveInstall(e.to_string()))?;

            ctx.eval::<(), _>(BOOTSTRAP_JS)
                .catch(&ctx)
                .map_err(|e| EvalError::Init(format!("bootstrap shim failed to install: {e}")))?;

            let mut opts = EvalOptions::default();
            opts.global = true;
            opts.strict = false;
            // __ag_main() already returns a Promise; promise=true would
            // double-wrap it into Promise<Promise<T>>.
            opts.promise = false;

            let promise: Promise = ctx.eval_with_options(program, opts)
                .catch(&ctx)
                .map_err(|e| EvalError::Threw(e.to_string()))?;

            let result: JsValue = promise.into_future::<JsValue>()
                .await
                .catch(&ctx)
                .map_err(|e| EvalError::Threw(e.to_string()))?;

            stringify_result(&ctx, result)
        })
        .await
    }
}

fn stringify_result(ctx: &rquickjs::Ctx<'_>, value: JsValue<'_>) -> Result<Value, EvalError> {
    let json = ctx
        .json_stringify(value)
        .catch(ctx)
        .map_err(|e| EvalError::Threw(format!("failed to stringify result: {e}")))?;
    let text = match json {
        Some(s) => s.to_string().map_err(|e| EvalError::Threw(e.to_string()))?,
        None => "null".to_string(),
    };
    debug!(len = text.len(), "script result stringified");
    serde_json::from_str(&text).map_err(|e| EvalError::Threw(format!("result was not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_presets::{Profile, SecurityLevel, stock_preset};

    fn fresh_session() -> (Arc<AsyncMutex<Session>>, Arc<ResourceBudget>, Arc<Emitter>) {
        let limits = stock_preset(SecurityLevel::Standard, Profile::AgentScript).limits;
        let mut session = Session::new(limits, Arc::new(()));
        session.start();
        let budget = session.budget().clone();
        let emitter = session.emitter().clone();
        (Arc::new(AsyncMutex::new(session)), budget, emitter)
    }

    #[tokio::test]
    async fn a_trivial_script_returns_its_value() {
        let evaluator = Evaluator::new().await.unwrap();
        let (session, budget, emitter) = fresh_session();
        let source = "async function __ag_main() {\n  return 1 + 2;\n}";
        let result = evaluator.run(source, session, budget, emitter).await.unwrap();
        assert_eq!(result, serde_json::json!(3));
    }

    #[tokio::test]
    async fn console_log_emits_a_stdout_event() {
        let evaluator = Evaluator::new().await.unwrap();
        let (session, budget, emitter) = fresh_session();
        let source = "async function __ag_main() {\n  console.log('hi');\n  return null;\n}";
        evaluator.run(source, session, budget, emitter.clone()).await.unwrap();
        let history = emitter.history();
        assert!(history.iter().any(|e| matches!(&e.payload, ascript_events::EventPayload::Stdout(p) if p.chunk == "hi")));
    }

    #[tokio::test]
    async fn a_budget_exhausted_iteration_counter_throws() {
        let evaluator = Evaluator::new().await.unwrap();
        let (session, budget, emitter) = fresh_session();
        let source = r#"
async function __ag_main() {
  let __iter_0 = 0;
  while (true) {
    if (++__iter_0 > 2) throw new Error('unreachable, __check_iteration throws first');
    __check_iteration();
  }
}
"#;
        let err = evaluator.run(source, session, budget, emitter).await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_ERROR");
    }
}
