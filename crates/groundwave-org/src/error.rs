//! error types for groundwave-org

use thiserror::Error;

/// errors produced while reading org documents
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrgError {
    /// no `:ID:` property in the document
    #[error("no :ID: property found")]
    MissingId,

    /// id failed validation
    #[error("invalid note id '{0}'")]
    InvalidUuid(String),

    /// a `#+BEGIN_` block was never closed
    #[error("unterminated {kind} block starting at line {line}")]
    UnterminatedBlock {
        /// block kind, lowercased (e.g. "src")
        kind: String,
        /// 1-based line of the `#+BEGIN_` directive
        line: usize,
    },
}
