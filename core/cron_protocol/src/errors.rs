//! Codec-level error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Bit cursor ran past the payload, a required reference was missing, or
    /// the bytes do not describe a well-formed cell tree.
    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    #[error("Unsupported depth: {depth} exceeds the limit of {max}")]
    UnsupportedDepth { depth: u16, max: u16 },

    #[error("Cell overflow: {bits} bits / {refs} refs exceed the per-cell capacity")]
    CellOverflow { bits: usize, refs: usize },

    #[error("Value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: u128, bits: usize },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for the most common decode failure.
pub(crate) fn malformed(msg: impl Into<String>) -> Error {
    Error::MalformedTree(msg.into())
}
