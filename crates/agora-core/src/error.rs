use thiserror::Error;

/// Shared lightweight error type for core primitive operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid caller input or malformed primitive value.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wire bytes do not form a 32-byte digest.
    #[error("invalid hash length: expected 32 bytes, got {0}")]
    InvalidHashLength(usize),
}
