//! Error types for wire parsing and encoding.
//!
//! Strongly-typed errors for the framing layer. Decoding never panics on
//! malformed input; every structural defect maps to a variant here.

use thiserror::Error;

/// Convenience alias used throughout the wire layer.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while parsing or encoding iLink3 wire structures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer ends before the structure it must contain
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    FrameTruncated {
        /// Bytes required by the structure
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// SOFH encoding type is not SBE little-endian
    #[error("invalid SOFH encoding type: {0:#06x}")]
    InvalidEncodingType(u16),

    /// SOFH message length cannot cover the headers it must include
    #[error("SOFH message length too small: {0}")]
    LengthTooSmall(u32),

    /// Template id has no registered metadata
    #[error("unknown template id: {0}")]
    UnknownTemplate(u16),

    /// Destination buffer is smaller than the message block
    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall {
        /// Bytes the encoder requires
        needed: usize,
        /// Bytes the caller provided
        actual: usize,
    },

    /// Text value does not fit its fixed-length wire field
    #[error("field {field} too long: max {max} bytes")]
    FieldTooLong {
        /// Wire field name
        field: &'static str,
        /// Fixed field width in bytes
        max: usize,
    },
}
