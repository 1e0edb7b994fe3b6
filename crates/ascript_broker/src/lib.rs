//! Session manager and executor (component I).
//!
//! Wires the parser, guard, rewriter, and runtime into one
//! `create_session` pipeline, keeps the table of live sessions, and
//! bridges `tool_call` events to a bound tool handler.

mod dispatch;
mod effects;
mod manager;

pub use dispatch::ToolDispatchSink;
pub use effects::TokioEffects;
pub use manager::{SessionManager, SharedSession};
