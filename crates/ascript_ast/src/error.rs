use thiserror::Error;

/// A parse failure, carrying a 1-based line/column and a 0-based byte
/// offset into the source that was handed to [`crate::parse`].
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}
