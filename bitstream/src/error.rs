//! Error types for bitstream operations.

use thiserror::Error;

/// Result type for bitstream operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors that can occur during bit-level encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitError {
    /// Attempted to read past the current read limit.
    #[error("attempted to read {requested} bits but only {available} bits available")]
    UnexpectedEof {
        /// Number of bits requested.
        requested: usize,
        /// Number of bits available.
        available: usize,
    },

    /// Invalid bit count for the operation.
    #[error("invalid bit count {bits}, maximum allowed is {max_bits}")]
    InvalidBitCount {
        /// The invalid bit count provided.
        bits: usize,
        /// Maximum allowed bits for this operation.
        max_bits: usize,
    },

    /// Value exceeds the range representable by the specified number of bits.
    #[error("value {value} cannot be represented in {bits} bits")]
    ValueOutOfRange {
        /// The value that was out of range.
        value: u64,
        /// Number of bits available.
        bits: usize,
    },

    /// A packed integer kept its continuation bit set for more than five bytes.
    #[error("packed integer does not terminate within five bytes")]
    InvalidPackedInt,

    /// A length-prefixed string declares more data than the stream holds.
    #[error("string length {length} exceeds the {available} bits remaining")]
    InvalidStringLength {
        /// Declared length (negative for UTF-16 strings).
        length: i64,
        /// Number of bits available.
        available: usize,
    },

    /// A wide string was not valid UTF-16.
    #[error("string is not valid UTF-16")]
    InvalidUtf16,

    /// A scoped window was requested past the current read limit.
    #[error("window of {requested} bits exceeds the {available} bits remaining")]
    WindowOutOfBounds {
        /// Requested window size in bits.
        requested: usize,
        /// Number of bits available.
        available: usize,
    },

    /// A bit length was larger than its backing buffer.
    #[error("bit length {bit_len} exceeds a buffer of {bytes} bytes")]
    BitLengthOutOfRange {
        /// Requested bit length.
        bit_len: usize,
        /// Size of the buffer in bytes.
        bytes: usize,
    },
}
