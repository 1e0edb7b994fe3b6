//! Shared primitives used across the agent-script execution pipeline:
//! ID generation, a monotonic clock, the wire protocol version, and
//! source-position types produced by the parser and consumed by the
//! guard and rewriter.

pub mod ids;
pub mod time;

use serde::{Deserialize, Serialize};

/// The only protocol version understood by this pipeline. Every transported
/// message carries this value; receivers reject mismatches.
pub const PROTOCOL_VERSION: u32 = 1;

/// A position in the original source text, carried on every AST node so
/// validation issues and rewritten output can be traced back to what the
/// model actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl SourceLocation {
    pub const fn new(line: u32, column: u32, offset: u32) -> Self {
        Self { line, column, offset }
    }
}
