//! Error type for unified diff parsing.

use thiserror::Error;

/// Failure to turn diff text into structured patches.
///
/// Parsing is a pure function over text, so this error never implies any
/// filesystem state. It is always recoverable by asking the diff producer
/// for a corrected diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input contains no recognizable unified-diff file sections, or a
    /// hunk header could not be parsed into a line-range tuple.
    #[error("malformed diff: {0}")]
    Malformed(String),
}
