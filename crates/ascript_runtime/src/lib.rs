//! The QuickJS-backed evaluator and the native `__safe_*` primitives it
//! injects as globals before running a rewritten script.

mod bootstrap;
mod evaluator;
mod primitives;

pub use evaluator::{EvalError, Evaluator};
