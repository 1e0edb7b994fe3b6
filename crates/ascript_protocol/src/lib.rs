//! Wire framing: NDJSON serialization of the event/control stream, and the
//! create-session request DTO.

mod create_session;
mod ndjson;

pub use create_session::{CreateSessionRequest, EncryptionMode, EncryptionRequest, LimitOverrides};
pub use ndjson::{LineError, NdjsonStreamParser, ParsedLine, parse_line, serialize_control, serialize_event, serialize_events};
