//! The native half of the `__safe_*` surface: the budget/abort checks and
//! the tool-call bridge, installed as globals before the bootstrap shim and
//! the rewritten script are evaluated.

use std::sync::Arc;

use ascript_common::ids::{has_valid_shape, new_call_id};
use ascript_events::{Emitter, LogLevel};
use ascript_resources::ResourceBudget;
use ascript_session::Session;
use rquickjs::prelude::Async;
use rquickjs::{Ctx, Exception, Function};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

fn throw(ctx: &Ctx<'_>, message: &str) -> rquickjs::Error {
    match Exception::from_message(ctx.clone(), message) {
        Ok(exception) => ctx.throw(exception.into()),
        Err(e) => e,
    }
}

/// Installs every native global the bootstrap shim and the rewritten
/// script depend on: `__check_iteration`, `__check_abort`,
/// `__is_reference_id`, `__call_tool_native`, `__stdout_native`,
/// `__log_native`.
pub fn install<'js>(
    ctx: &Ctx<'js>,
    budget: Arc<ResourceBudget>,
    session: Arc<AsyncMutex<Session>>,
    emitter: Arc<Emitter>,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let stdout_budget = budget.clone();
    let stdout_emitter = emitter.clone();
    let stdout_native = Function::new(ctx.clone(), move |ctx: Ctx<'_>, chunk: String| -> rquickjs::Result<()> {
        match stdout_budget.record_stdout(chunk.len()) {
            Ok(()) => {
                stdout_emitter.emit_stdout(chunk);
                Ok(())
            }
            Err(limit) => Err(throw(&ctx, &limit.to_string())),
        }
    })?;
    globals.set("__stdout_native", stdout_native)?;

    let log_emitter = emitter.clone();
    let log_native = Function::new(ctx.clone(), move |level: String, message: String| {
        let level = match level.as_str() {
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info,
        };
        log_emitter.emit_log(level, message, None);
    })?;
    globals.set("__log_native", log_native)?;

    let iter_budget = budget.clone();
    let check_iteration = Function::new(ctx.clone(), move |ctx: Ctx<'_>| -> rquickjs::Result<()> {
        if iter_budget.is_aborted() {
            return Err(throw(&ctx, "session was cancelled"));
        }
        match iter_budget.record_iteration() {
            Ok(()) => Ok(()),
            Err(limit) => Err(throw(&ctx, &limit.to_string())),
        }
    })?;
    globals.set("__check_iteration", check_iteration)?;

    let abort_budget = budget.clone();
    let check_abort = Function::new(ctx.clone(), move |ctx: Ctx<'_>| -> rquickjs::Result<()> {
        if abort_budget.is_aborted() {
            return Err(throw(&ctx, "session was cancelled"));
        }
        Ok(())
    })?;
    globals.set("__check_abort", check_abort)?;

    let is_reference_id = Function::new(ctx.clone(), |value: String| has_valid_shape(&value, "ref_"))?;
    globals.set("__is_reference_id", is_reference_id)?;

    let call_tool_session = session.clone();
    let call_tool_budget = budget.clone();
    let call_tool_native = Function::new(
        ctx.clone(),
        Async(move |name: String, args_json: String| {
            let session = call_tool_session.clone();
            let budget = call_tool_budget.clone();
            async move { call_tool_native_impl(session, budget, name, args_json).await }
        }),
    )?;
    globals.set("__call_tool_native", call_tool_native)?;

    Ok(())
}

/// Parks the evaluator's tool call against the session's state machine and
/// waits for it to be resolved (either by an in-process tool handler task
/// or by an inbound `tool_result_submit`). Never throws: outcomes are
/// encoded in the returned JSON and the bootstrap shim decides whether to
/// raise them as a JS exception, matching the no-throw-across-the-boundary
/// convention used for every other native call here.
async fn call_tool_native_impl(
    session: Arc<AsyncMutex<Session>>,
    budget: Arc<ResourceBudget>,
    name: String,
    args_json: String,
) -> String {
    if budget.is_aborted() {
        return limit_exceeded_json("SESSION_CANCELLED", "session was cancelled");
    }
    let args: Value = match serde_json::from_str(&args_json) {
        Ok(v) => v,
        Err(e) => return limit_exceeded_json("RUNTIME_ERROR", &format!("invalid call args: {e}")),
    };

    let call_id = new_call_id();
    let rx = {
        let mut session = session.lock().await;
        match session.begin_tool_call(call_id, name, args) {
            Ok(rx) => rx,
            Err(limit) => return limit_exceeded_json(limit.code(), &limit.to_string()),
        }
    };

    match rx.await {
        Ok(outcome) => serde_json::to_string(&outcome.into_script_value()).unwrap_or_else(|_| "null".to_string()),
        Err(_) => limit_exceeded_json("RUNTIME_ERROR", "tool call resolver was dropped before answering"),
    }
}

fn limit_exceeded_json(code: &str, message: &str) -> String {
    serde_json::json!({ "__limitExceeded": true, "code": code, "message": message }).to_string()
}
