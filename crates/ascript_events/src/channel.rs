//! The in-process channel pair connecting a running session to its host
//! (the broker's session loop, or a test harness standing in for one).
//!
//! A session only ever talks to the outside world through this pair: the
//! [`EventSink`] side publishes outbound events, the [`Receiver`] side
//! drains inbound control messages. There is no other shared mutable state.

use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::control::ControlMessage;
use crate::emitter::EventSink;
use crate::event::Event;

/// Bound used for both directions of an in-process pair. Generous enough
/// that a slow subscriber never back-pressures the evaluator mid-step;
/// a session that floods past this is already over its stdout/iteration
/// budget and about to be torn down anyway.
const CHANNEL_CAPACITY: usize = 256;

/// Held by the session side. Implements [`EventSink`] so it can be handed
/// straight to [`crate::Emitter::subscribe`], and exposes the inbound
/// control stream for the session loop to poll.
pub struct SessionChannelHandle {
    outbound: Sender<Event>,
    inbound: Receiver<ControlMessage>,
}

impl SessionChannelHandle {
    /// Receives the next control message, or `None` once the host side has
    /// dropped its [`HostChannelHandle`].
    pub async fn recv_control(&mut self) -> Option<ControlMessage> {
        self.inbound.recv().await
    }

    pub fn try_recv_control(&mut self) -> Option<ControlMessage> {
        self.inbound.try_recv().ok()
    }
}

impl EventSink for SessionChannelHandle {
    fn on_event(&self, event: &Event) {
        // A full or closed channel means the host has already stopped
        // listening; dropping the event here is correct, not an error —
        // the session's own history buffer remains the record of truth.
        let _ = self.outbound.try_send(event.clone());
    }
}

/// Held by the host side: the broker's per-session loop, or whatever is
/// forwarding events onward to the NDJSON framer.
pub struct HostChannelHandle {
    pub events: Receiver<Event>,
    pub control: Sender<ControlMessage>,
}

/// Builds a connected [`SessionChannelHandle`] / [`HostChannelHandle`] pair.
pub fn in_process_pair() -> (SessionChannelHandle, HostChannelHandle) {
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (control_tx, control_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        SessionChannelHandle { outbound: event_tx, inbound: control_rx },
        HostChannelHandle { events: event_rx, control: control_tx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CancelPayload;
    use crate::event::EventPayload;

    #[tokio::test]
    async fn events_published_by_the_session_side_arrive_on_the_host_side() {
        let (session, mut host) = in_process_pair();
        session.on_event(&Event::new("s_1", 0, EventPayload::Stdout(crate::event::StdoutPayload { chunk: "hi".into() })));
        let received = host.events.recv().await.unwrap();
        assert_eq!(received.seq, 0);
    }

    #[tokio::test]
    async fn control_messages_sent_by_the_host_arrive_on_the_session_side() {
        let (mut session, host) = in_process_pair();
        host.control.send(ControlMessage::Cancel(CancelPayload { reason: Some("done".into()) })).await.unwrap();
        let received = session.recv_control().await.unwrap();
        assert_eq!(received, ControlMessage::Cancel(CancelPayload { reason: Some("done".into()) }));
    }

    #[tokio::test]
    async fn dropping_the_host_ends_the_session_sides_inbound_stream() {
        let (mut session, host) = in_process_pair();
        drop(host);
        assert_eq!(session.recv_control().await, None);
    }
}
