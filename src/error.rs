//! Errors raised while decoding interchange text.

use crate::codec::Format;
use thiserror::Error;

/// A structurally malformed block in BibTeX or RIS input.
///
/// Decoding is all-or-nothing: the first malformed block fails the whole
/// call and nothing is imported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{format} parse error in block {block} (line {line}): {message}")]
pub struct ParseError {
    /// Format being decoded
    pub format: Format,
    /// 1-based index of the offending block
    pub block: usize,
    /// 1-based line on which the offending block starts
    pub line: usize,
    /// Description of the problem
    pub message: String,
}

impl ParseError {
    pub(crate) fn at(format: Format, block: usize, line: usize, message: impl Into<String>) -> Self {
        Self {
            format,
            block,
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::at(Format::Ris, 2, 14, "missing ER terminator");
        assert_eq!(
            error.to_string(),
            "RIS parse error in block 2 (line 14): missing ER terminator"
        );
    }
}
