//! Default tables backing [`crate::PresetBuilder`]. Kept in one place so the
//! per-level numbers in §6 of the design stay easy to audit against the
//! builder logic that consumes them.

use crate::{LoopKind, ResourceThresholds, RuntimeLimits, SecurityLevel, TransformBudget};

/// Pure builtins available at every level: no I/O, no prototype-chain
/// surprises, nothing that can observe the outside world.
const CORE_BUILTINS: &[&str] = &[
    "Math", "JSON", "Array", "Object", "String", "Number", "Date", "Boolean", "NaN", "Infinity",
    "undefined",
];

/// The tool-call surface plus the loop-counter budget. Always present:
/// without `callTool` a script cannot do anything observable, and without
/// `__maxIterations` the rewriter has nothing to check loops against.
const CORE_API: &[&str] = &["callTool", "__maxIterations"];

pub(crate) fn base_globals(level: SecurityLevel) -> Vec<&'static str> {
    let mut globals: Vec<&'static str> = CORE_API.to_vec();
    match level {
        SecurityLevel::Strict => {
            // STRICT removes everything except the core tool API and a
            // handful of pure builtins.
            globals.extend(CORE_BUILTINS);
        }
        SecurityLevel::Secure | SecurityLevel::Standard => {
            globals.extend(CORE_BUILTINS);
        }
        SecurityLevel::Permissive => {
            globals.extend(CORE_BUILTINS);
            globals.push("console");
        }
    }
    globals
}

pub(crate) fn base_loops(level: SecurityLevel) -> Vec<LoopKind> {
    match level {
        SecurityLevel::Strict | SecurityLevel::Secure => vec![LoopKind::ForOf],
        SecurityLevel::Standard => {
            vec![LoopKind::For, LoopKind::While, LoopKind::DoWhile, LoopKind::ForOf]
        }
        SecurityLevel::Permissive => LoopKind::ALL.to_vec(),
    }
}

pub(crate) fn default_limits(level: SecurityLevel) -> RuntimeLimits {
    let (max_iterations, timeout_ms) = match level {
        SecurityLevel::Strict => (1_000, 5_000),
        SecurityLevel::Secure => (5_000, 15_000),
        SecurityLevel::Standard => (10_000, 30_000),
        SecurityLevel::Permissive => (100_000, 60_000),
    };
    RuntimeLimits {
        timeout_ms,
        max_iterations,
        max_tool_calls: 100,
        max_stdout_bytes: 1_000_000,
        max_tool_result_bytes: 1_000_000,
        tool_timeout_ms: 30_000,
        heartbeat_interval_ms: 10_000,
        session_ttl_ms: timeout_ms.saturating_mul(4).max(60_000),
    }
}

pub(crate) fn default_resource_thresholds() -> ResourceThresholds {
    ResourceThresholds {
        max_bigint_exponent: 100_000,
        max_array_length: 2_000_000,
        max_repeat_count: 200_000,
    }
}

pub(crate) fn default_transform_budget(level: SecurityLevel) -> TransformBudget {
    let max_input_bytes = match level {
        SecurityLevel::Strict => 64 * 1024,
        SecurityLevel::Secure => 256 * 1024,
        SecurityLevel::Standard => 1024 * 1024,
        SecurityLevel::Permissive => 4 * 1024 * 1024,
    };
    TransformBudget {
        max_input_bytes,
        max_output_files: 32,
    }
}
