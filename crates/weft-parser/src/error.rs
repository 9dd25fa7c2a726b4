//! Error types for template parsing.

use thiserror::Error;

/// Errors produced while turning template source into a [`Tree`](crate::Tree).
///
/// Every variant aborts parsing immediately; no partial tree is returned.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A `{%` region was opened but never closed, or end of input was
    /// reached while a conditional, loop or switch was still open.
    #[error("unterminated control structure")]
    UnterminatedCtl,

    /// The content of a control region matched no known construct.
    #[error("bad control structure: {0:?}")]
    BadCtl(String),

    /// A condition used boolean composition (`&&`, `||`, parentheses)
    /// instead of a single comparison or helper call.
    #[error("condition is too complex: {0:?}")]
    CondComplex(String),

    /// A conditional body contained more than one top-level `else`.
    #[error("conditional has more than two branches")]
    CondBranches,

    /// A terminator appeared with no matching open construct.
    #[error("unexpected {0} with no open construct")]
    UnexpectedTerminator(&'static str),

    /// Template file could not be read.
    #[error("failed to read template file")]
    Io(#[from] std::io::Error),
}

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;
