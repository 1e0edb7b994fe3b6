//! Session event types, the sequencing emitter, and the in-process channel
//! pair a session uses to talk to its host.

mod channel;
mod control;
mod emitter;
mod event;

pub use channel::{HostChannelHandle, SessionChannelHandle, in_process_pair};
pub use control::{CancelPayload, ControlMessage, ToolResultSubmitPayload};
pub use emitter::{Emitter, EventSink};
pub use event::{
    EncryptionInfo, ErrorInfo, ErrorPayload, Event, EventPayload, FinalPayload, FinalStats, HeartbeatPayload,
    LogLevel, LogPayload, SessionInitPayload, StdoutPayload, ToolCallPayload, ToolResultAppliedPayload,
};
