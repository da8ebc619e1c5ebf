//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Request type outside the set the firmware understands
    #[error("Invalid request type {0}: expected {{0,1,2,4,8,16}} optionally plus 32")]
    InvalidRequestType(u32),

    /// Request type argument that is not a number
    #[error("Invalid request type '{0}': expected a number")]
    ParseRequestType(String),

    /// Spectrum size that is neither 512 nor 4096 channels
    #[error("Unsupported spectrum size: {0} channels (expected 512 or 4096)")]
    InvalidSpectrumSize(u32),

    /// Buffer too small for operation
    #[error("Buffer too small: needed {needed}, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Spectrum payload is not a whole number of 32-bit counts
    #[error("Spectrum payload of {0} bytes is not a multiple of 4")]
    MisalignedSpectrum(usize),

    /// Reply length does not match what the request asked for
    #[error("Unexpected reply length: expected {expected} bytes, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
