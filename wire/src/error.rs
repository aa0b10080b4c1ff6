//! Error types for wire format operations.

use std::fmt;

use bitstream::BitError;
use thiserror::Error;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, WireError>;

/// Decode errors for framing, versions and bunch headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum WireError {
    /// The underlying bit reader failed.
    #[error("bitstream error: {0}")]
    Bits(#[from] BitError),

    /// The stream declares a protocol version this crate refuses to parse.
    #[error("unsupported {kind} version {found}")]
    UnsupportedVersion {
        /// Which version history was rejected.
        kind: VersionKind,
        /// The raw version found.
        found: u32,
    },

    /// A packet length prefix was negative or above the packet size cap.
    #[error("invalid packet length {length}")]
    InvalidPacketLength {
        /// The raw length prefix.
        length: i32,
    },

    /// A packet had no bytes at all.
    #[error("received zero-size packet")]
    EmptyPacket,

    /// The last byte of a packet was zero, so no terminator bit exists.
    #[error("malformed packet: last byte carries no terminator bit")]
    MissingTerminator,

    /// A hardcoded name index has no entry in the static names table.
    #[error("unknown hardcoded name index {index}")]
    UnknownStaticName {
        /// The raw name index.
        index: u32,
    },

    /// Limits exceeded.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        /// The limit that was hit.
        kind: LimitKind,
        /// The configured limit.
        limit: usize,
        /// The value found in the stream.
        actual: usize,
    },
}

/// The version history a [`WireError::UnsupportedVersion`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    /// Replay (demo) network version.
    Network,
    /// Engine network protocol version.
    Engine,
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    PacketBytes,
    ChannelIndex,
    GuidsPerBunch,
    StringBytes,
    GroupExports,
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Engine => "engine network",
        };
        f.write_str(name)
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PacketBytes => "packet bytes",
            Self::ChannelIndex => "channel index",
            Self::GuidsPerBunch => "guids per bunch",
            Self::StringBytes => "string bytes",
            Self::GroupExports => "exports per group",
        };
        f.write_str(name)
    }
}
