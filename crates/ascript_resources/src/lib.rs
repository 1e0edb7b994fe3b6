//! Live per-session counters, checked against a preset's [`RuntimeLimits`].
//!
//! The session owns exactly one [`ResourceBudget`]. Its counters are
//! atomics rather than behind a lock because the abort flag and the
//! counters are the only state the evaluator's primitives touch directly
//! (see the message-passing design note) — everything else about a
//! session flows through its single inbound channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ascript_common::time::Tick;
use ascript_presets::RuntimeLimits;
use thiserror::Error;

/// One of the specific sub-codes under the wire `LIMIT_EXCEEDED` error
/// kind.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LimitError {
    #[error("iteration count exceeded maxIterations")]
    IterationLimit,
    #[error("tool call count exceeded maxToolCalls")]
    ToolCallLimit,
    #[error("stdout byte count exceeded maxStdoutBytes")]
    StdoutLimit,
    #[error("session exceeded its timeout")]
    Timeout,
}

impl LimitError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::IterationLimit => "ITERATION_LIMIT",
            Self::ToolCallLimit => "TOOL_CALL_LIMIT",
            Self::StdoutLimit => "STDOUT_LIMIT",
            Self::Timeout => "TIMEOUT",
        }
    }
}

/// A point-in-time read of a session's counters, shaped for the `final`
/// event's `stats` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub duration_ms: u64,
    pub tool_call_count: u64,
    pub iteration_count: u64,
    pub stdout_bytes: u64,
}

/// Budget enforcement for one session: a snapshot of the limits it was
/// started with, plus the live counters checked against them.
pub struct ResourceBudget {
    limits: RuntimeLimits,
    started_at: Tick,
    tool_call_count: AtomicU64,
    iteration_count: AtomicU64,
    stdout_bytes: AtomicU64,
    abort: AtomicBool,
}

impl ResourceBudget {
    pub fn new(limits: RuntimeLimits) -> Self {
        Self {
            limits,
            started_at: Tick::now(),
            tool_call_count: AtomicU64::new(0),
            iteration_count: AtomicU64::new(0),
            stdout_bytes: AtomicU64::new(0),
            abort: AtomicBool::new(false),
        }
    }

    pub fn limits(&self) -> &RuntimeLimits {
        &self.limits
    }

    /// Cooperative cancellation: checked at every iteration step and on
    /// entry to every safe primitive.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    pub fn check_timeout(&self) -> Result<(), LimitError> {
        if self.started_at.elapsed_ms() > self.limits.timeout_ms {
            Err(LimitError::Timeout)
        } else {
            Ok(())
        }
    }

    /// Increments the iteration counter and checks it. Matches the
    /// rewriter's injected `if (++counter > maxIterations) throw` shape:
    /// the counter is allowed to land one past the limit (the throw
    /// happens on that same increment), never further.
    pub fn record_iteration(&self) -> Result<(), LimitError> {
        let count = self.iteration_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count > self.limits.max_iterations {
            Err(LimitError::IterationLimit)
        } else {
            Ok(())
        }
    }

    /// Checked *before* incrementing: `toolCallCount ≤ maxToolCalls` holds
    /// at all times, with no slack (unlike iterations, a tool call either
    /// happens or it doesn't — there's no "throw mid-call").
    pub fn record_tool_call(&self) -> Result<(), LimitError> {
        let current = self.tool_call_count.load(Ordering::SeqCst);
        if current >= self.limits.max_tool_calls {
            return Err(LimitError::ToolCallLimit);
        }
        self.tool_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn record_stdout(&self, bytes: usize) -> Result<(), LimitError> {
        let total = self.stdout_bytes.fetch_add(bytes as u64, Ordering::SeqCst) + bytes as u64;
        if total > self.limits.max_stdout_bytes {
            Err(LimitError::StdoutLimit)
        } else {
            Ok(())
        }
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            duration_ms: self.started_at.elapsed_ms(),
            tool_call_count: self.tool_call_count.load(Ordering::SeqCst),
            iteration_count: self.iteration_count.load(Ordering::SeqCst),
            stdout_bytes: self.stdout_bytes.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_presets::{Profile, SecurityLevel, stock_preset};

    fn limits(max_iterations: u64, max_tool_calls: u64) -> RuntimeLimits {
        let mut limits = stock_preset(SecurityLevel::Standard, Profile::AgentScript).limits;
        limits.max_iterations = max_iterations;
        limits.max_tool_calls = max_tool_calls;
        limits
    }

    #[test]
    fn iteration_limit_allows_exactly_one_over_before_failing() {
        let budget = ResourceBudget::new(limits(3, 10));
        assert!(budget.record_iteration().is_ok());
        assert!(budget.record_iteration().is_ok());
        assert!(budget.record_iteration().is_ok());
        assert_eq!(budget.record_iteration(), Err(LimitError::IterationLimit));
        assert_eq!(budget.snapshot().iteration_count, 4);
    }

    #[test]
    fn tool_call_limit_rejects_before_incrementing() {
        let budget = ResourceBudget::new(limits(1000, 2));
        assert!(budget.record_tool_call().is_ok());
        assert!(budget.record_tool_call().is_ok());
        assert_eq!(budget.record_tool_call(), Err(LimitError::ToolCallLimit));
        assert_eq!(budget.snapshot().tool_call_count, 2);
    }

    #[test]
    fn stdout_limit_trips_once_total_exceeds_cap() {
        let mut custom = limits(1000, 10);
        custom.max_stdout_bytes = 10;
        let budget = ResourceBudget::new(custom);
        assert!(budget.record_stdout(6).is_ok());
        assert_eq!(budget.record_stdout(6), Err(LimitError::StdoutLimit));
    }

    #[test]
    fn abort_flag_is_cooperative_and_idempotent() {
        let budget = ResourceBudget::new(limits(10, 10));
        assert!(!budget.is_aborted());
        budget.request_abort();
        budget.request_abort();
        assert!(budget.is_aborted());
    }

    #[test]
    fn limit_error_codes_match_wire_sub_codes() {
        assert_eq!(LimitError::IterationLimit.code(), "ITERATION_LIMIT");
        assert_eq!(LimitError::ToolCallLimit.code(), "TOOL_CALL_LIMIT");
        assert_eq!(LimitError::StdoutLimit.code(), "STDOUT_LIMIT");
        assert_eq!(LimitError::Timeout.code(), "TIMEOUT");
    }
}
