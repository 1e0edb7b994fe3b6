//! Typed event construction with a monotonically increasing `seq`,
//! fanned out to every subscribed [`EventSink`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use ascript_common::time::now_iso8601;
use serde_json::Value;

use crate::event::{
    EncryptionInfo, Event, EventPayload, ErrorInfo, ErrorPayload, FinalPayload, FinalStats, HeartbeatPayload,
    LogLevel, LogPayload, SessionInitPayload, StdoutPayload, ToolCallPayload, ToolResultAppliedPayload,
};

/// A subscriber to a session's outbound event stream. One bad subscriber
/// must not corrupt delivery to the others — the emitter isolates panics
/// per call.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F: Fn(&Event) + Send + Sync> EventSink for F {
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Builds and fans out events for one session. Keeps a history buffer for
/// debugging/tests but never replays it on its own — a late subscriber
/// only sees events emitted after it subscribes.
pub struct Emitter {
    session_id: String,
    seq: AtomicU64,
    subscribers: Mutex<Vec<Box<dyn EventSink>>>,
    history: Mutex<Vec<Event>>,
}

impl Emitter {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            seq: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subscribe(&self, sink: impl EventSink + 'static) {
        self.subscribers.lock().unwrap().push(Box::new(sink));
    }

    pub fn history(&self) -> Vec<Event> {
        self.history.lock().unwrap().clone()
    }

    fn publish(&self, payload: EventPayload) -> Event {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let event = Event::new(self.session_id.clone(), seq, payload);
        self.history.lock().unwrap().push(event.clone());
        for sink in self.subscribers.lock().unwrap().iter() {
            let _ = catch_unwind(AssertUnwindSafe(|| sink.on_event(&event)));
        }
        event
    }

    pub fn emit_session_init(&self, cancel_url: impl Into<String>, expires_at: impl Into<String>, encryption: EncryptionInfo, replay_url: Option<String>) -> Event {
        self.publish(EventPayload::SessionInit(SessionInitPayload {
            cancel_url: cancel_url.into(),
            expires_at: expires_at.into(),
            encryption,
            replay_url,
        }))
    }

    pub fn emit_stdout(&self, chunk: impl Into<String>) -> Event {
        self.publish(EventPayload::Stdout(StdoutPayload { chunk: chunk.into() }))
    }

    pub fn emit_log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) -> Event {
        self.publish(EventPayload::Log(LogPayload { level, message: message.into(), data }))
    }

    pub fn emit_tool_call(&self, call_id: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Event {
        self.publish(EventPayload::ToolCall(ToolCallPayload { call_id: call_id.into(), tool_name: tool_name.into(), args }))
    }

    pub fn emit_tool_result_applied(&self, call_id: impl Into<String>) -> Event {
        self.publish(EventPayload::ToolResultApplied(ToolResultAppliedPayload { call_id: call_id.into() }))
    }

    pub fn emit_final_success(&self, value: Value, stats: FinalStats) -> Event {
        self.publish(EventPayload::Final(FinalPayload { ok: true, result: Some(value), error: None, stats: Some(stats) }))
    }

    pub fn emit_final_error(&self, error: ErrorInfo, stats: FinalStats) -> Event {
        self.publish(EventPayload::Final(FinalPayload { ok: false, result: None, error: Some(error), stats: Some(stats) }))
    }

    pub fn emit_heartbeat(&self) -> Event {
        self.publish(EventPayload::Heartbeat(HeartbeatPayload { ts: now_iso8601() }))
    }

    pub fn emit_error(&self, code: Option<String>, message: impl Into<String>, recoverable: Option<bool>) -> Event {
        self.publish(EventPayload::Error(ErrorPayload { message: message.into(), code, recoverable }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn seq_increases_monotonically_across_emit_kinds() {
        let emitter = Emitter::new("s_1");
        let a = emitter.emit_stdout("hi");
        let b = emitter.emit_heartbeat();
        let c = emitter.emit_final_success(Value::Null, FinalStats::default());
        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
    }

    #[test]
    fn a_panicking_subscriber_does_not_block_the_others() {
        let emitter = Emitter::new("s_1");
        let count = Arc::new(AtomicUsize::new(0));
        emitter.subscribe(|_event: &Event| panic!("misbehaving subscriber"));
        let count_clone = count.clone();
        emitter.subscribe(move |_event: &Event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        emitter.emit_heartbeat();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn history_accumulates_every_emitted_event() {
        let emitter = Emitter::new("s_1");
        emitter.emit_stdout("a");
        emitter.emit_stdout("b");
        assert_eq!(emitter.history().len(), 2);
    }
}
