//! Session state machine: legal transitions, pending tool call bookkeeping,
//! and the terminal-state cleanup every failure path shares.

mod effects;
mod session;
mod state;

pub use effects::{SessionEffects, TransitionObserver};
pub use session::{PendingToolCall, Session, SubmitOutcome};
pub use state::SessionState;
