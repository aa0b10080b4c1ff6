//! Error types for replay decoding.
//!
//! [`ReplayError`] ends a parse. [`BunchError`] and [`FieldError`] are
//! recoverable: they are logged where they occur and decoding continues with
//! the next bunch or field.

use std::fmt;

use bitstream::BitError;
use thiserror::Error;
use wire::WireError;

/// Result type for replay decoding.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Errors that abort a parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReplayError {
    /// Framing, version or stream error outside any bunch.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The decryption collaborator failed.
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// The decompression collaborator failed.
    #[error("decompression failed: {reason}")]
    Decompression { reason: String },

    /// The decompressor produced a different size than the chunk declared.
    #[error("decompressed {actual} bytes, chunk declared {expected}")]
    DecompressedLength { expected: usize, actual: usize },

    /// A length prefix outside any bunch was negative.
    #[error("invalid {field} length {value}")]
    InvalidLength { field: &'static str, value: i64 },

    /// The stream needs a collaborator that was not supplied.
    #[error("replay data is {what} but no {collaborator} was supplied")]
    MissingCollaborator {
        what: &'static str,
        collaborator: &'static str,
    },
}

impl From<BitError> for ReplayError {
    fn from(err: BitError) -> Self {
        Self::Wire(WireError::Bits(err))
    }
}

/// Errors that drop one bunch or one partial merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BunchError {
    /// The bunch payload could not be read.
    #[error("stream error: {0}")]
    Wire(#[from] WireError),

    /// A new initial partial arrived while a reliable partial was unfinished.
    #[error("channel {channel}: new partial bunch while a reliable partial is unfinished")]
    PartialConflict { channel: u32 },

    /// A partial fragment without exports was not a whole number of bytes.
    #[error("channel {channel}: corrupt partial bunch, {bits} bits not byte aligned")]
    UnalignedPartial { channel: u32, bits: usize },

    /// A continuation fragment did not match the partial in progress.
    #[error("channel {channel}: partial merge failed ({reason})")]
    MergeMismatch { channel: u32, reason: MergeReason },

    /// A final partial fragment carried package map exports.
    #[error("channel {channel}: final partial bunch carries package map exports")]
    FinalPartialWithExports { channel: u32 },

    /// The first bunch for an unbound channel was not an open.
    #[error("channel {channel}: bunch for unbound channel is not an open")]
    NotOpen { channel: u32 },
}

impl From<BitError> for BunchError {
    fn from(err: BitError) -> Self {
        Self::Wire(WireError::Bits(err))
    }
}

/// Why a continuation fragment was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeReason {
    /// No partial bunch is in progress.
    NoPartial,
    /// The fragment's reliability differs from the partial's.
    ReliabilityMismatch,
    /// The fragment's sequence does not follow the partial's.
    Sequence { expected: u32, found: u32 },
}

impl fmt::Display for MergeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPartial => write!(f, "no partial in progress"),
            Self::ReliabilityMismatch => write!(f, "reliability mismatch"),
            Self::Sequence { expected, found } => {
                write!(f, "expected sequence {expected}, found {found}")
            }
        }
    }
}

/// Errors that skip one field or one delta element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FieldError {
    /// The field window could not be decoded.
    #[error("{group}.{field}: {source}")]
    Wire {
        group: String,
        field: String,
        source: WireError,
    },

    /// A handler left bits of its window unread.
    #[error("{group}.{field}: {bits} bits left unread")]
    Residual {
        group: String,
        field: String,
        bits: usize,
    },

    /// A property handle pointed past the group's export table.
    #[error("{group}: handle {handle} out of range ({len} exports)")]
    HandleOutOfRange {
        group: String,
        handle: u32,
        len: usize,
    },

    /// An RPC's export group was never declared in the stream.
    #[error("no export group declared for {path}")]
    MissingGroup { path: String },

    /// A delta property failed after its header was decoded.
    #[error("{group}.{field}: delta property failed")]
    Delta { group: String, field: String },
}
