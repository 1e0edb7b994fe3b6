//! Line-oriented framing over the event/control JSON types: one UTF-8 JSON
//! value per line, no embedded newlines.

use ascript_events::{ControlMessage, Event};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serializes an [`Event`] as a single NDJSON line, including the trailing
/// `\n`. Panics only if `Event`'s own `Serialize` impl is broken (it never
/// contains non-finite floats or non-UTF-8 data), so this is infallible in
/// practice.
pub fn serialize_event(event: &Event) -> String {
    let mut line = serde_json::to_string(event).expect("Event always serializes");
    line.push('\n');
    line
}

pub fn serialize_control(message: &ControlMessage) -> String {
    let mut line = serde_json::to_string(message).expect("ControlMessage always serializes");
    line.push('\n');
    line
}

/// Result of parsing one line, matching the `{ok, value}|{ok:false, error}`
/// shape described for `parseLine`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine<T> {
    Ok(T),
    Err(String),
}

/// Parses one complete line (without its trailing newline) into `T`.
/// Never panics; malformed JSON or a shape mismatch both produce
/// [`ParsedLine::Err`].
pub fn parse_line<T: DeserializeOwned>(text: &str) -> ParsedLine<T> {
    match serde_json::from_str::<T>(text.trim_end_matches(['\r', '\n'])) {
        Ok(value) => ParsedLine::Ok(value),
        Err(e) => ParsedLine::Err(e.to_string()),
    }
}

/// A line-parsing error with the 1-indexed line number it occurred on.
#[derive(Debug, Clone, PartialEq)]
pub struct LineError {
    pub line: u64,
    pub message: String,
}

/// Incremental NDJSON parser: feed it arbitrarily-chunked bytes, it buffers
/// across chunks and yields one parsed value per complete line. Malformed
/// lines are reported but don't stop the stream — a single bad line from a
/// misbehaving peer shouldn't take down the whole connection.
pub struct NdjsonStreamParser<T> {
    buffer: String,
    line_no: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned> Default for NdjsonStreamParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> NdjsonStreamParser<T> {
    pub fn new() -> Self {
        Self { buffer: String::new(), line_no: 0, _marker: std::marker::PhantomData }
    }

    /// Feeds a chunk of UTF-8 text, returning every complete line parsed
    /// out of it (values and errors interleaved in arrival order).
    pub fn feed(&mut self, chunk: &str) -> Vec<Result<T, LineError>> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            out.push(self.parse_one(line.trim_end_matches(['\r', '\n'])));
        }
        out
    }

    /// Parses whatever remains in the buffer as a final, unterminated line
    /// (a peer that closes the stream without a trailing newline). Empty
    /// remainders produce nothing.
    pub fn flush(&mut self) -> Option<Result<T, LineError>> {
        if self.buffer.is_empty() {
            return None;
        }
        let remaining = std::mem::take(&mut self.buffer);
        Some(self.parse_one(&remaining))
    }

    fn parse_one(&mut self, line: &str) -> Result<T, LineError> {
        self.line_no += 1;
        if line.is_empty() {
            return Err(LineError { line: self.line_no, message: "empty line".into() });
        }
        match parse_line::<T>(line) {
            ParsedLine::Ok(value) => Ok(value),
            ParsedLine::Err(message) => Err(LineError { line: self.line_no, message }),
        }
    }
}

pub fn serialize_events<'a>(events: impl IntoIterator<Item = &'a Event>) -> String {
    events.into_iter().map(serialize_event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascript_events::{EncryptionInfo, EventPayload, SessionInitPayload};

    fn sample_event(seq: u64) -> Event {
        Event::new(
            "s_1",
            seq,
            EventPayload::SessionInit(SessionInitPayload {
                cancel_url: "https://x/cancel".into(),
                expires_at: "2026-07-26T00:00:00.000Z".into(),
                encryption: EncryptionInfo::disabled(),
                replay_url: None,
            }),
        )
    }

    #[test]
    fn an_event_round_trips_through_serialize_then_parse() {
        let event = sample_event(0);
        let line = serialize_event(&event);
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        match parse_line::<Event>(&line) {
            ParsedLine::Ok(back) => assert_eq!(back, event),
            ParsedLine::Err(e) => panic!("unexpected parse error: {e}"),
        }
    }

    #[test]
    fn feed_yields_one_result_per_complete_line_across_chunk_boundaries() {
        let mut parser = NdjsonStreamParser::<Event>::new();
        let whole = serialize_event(&sample_event(0)) + &serialize_event(&sample_event(1));
        let (first_half, second_half) = whole.split_at(whole.len() / 2);
        let mut results = parser.feed(first_half);
        results.extend(parser.feed(second_half));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().seq, 0);
        assert_eq!(results[1].as_ref().unwrap().seq, 1);
    }

    #[test]
    fn a_malformed_line_is_reported_but_parsing_continues() {
        let mut parser = NdjsonStreamParser::<Event>::new();
        let chunk = format!("not json\n{}", serialize_event(&sample_event(5)));
        let results = parser.feed(&chunk);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[0].as_ref().unwrap_err().line, 1);
        assert_eq!(results[1].as_ref().unwrap().seq, 5);
    }

    #[test]
    fn flush_emits_a_final_unterminated_line() {
        let mut parser = NdjsonStreamParser::<Event>::new();
        let line = serde_json::to_string(&sample_event(9)).unwrap();
        assert!(parser.feed(&line).is_empty());
        let flushed = parser.flush().unwrap();
        assert_eq!(flushed.unwrap().seq, 9);
        assert!(parser.flush().is_none());
    }

    #[test]
    fn serializing_many_events_round_trips_to_exactly_those_events() {
        let events = vec![sample_event(0), sample_event(1), sample_event(2)];
        let stream = serialize_events(&events);
        let mut parser = NdjsonStreamParser::<Event>::new();
        let results = parser.feed(&stream);
        let parsed: Vec<Event> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(parsed, events);
    }
}
