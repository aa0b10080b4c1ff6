//! Protocol framing for recorded network-replication streams.
//!
//! This crate handles the layer between raw bits and replicated state:
//! protocol version histories, demo packet framing, bunch headers, channel
//! types and the engine's static names table. It does not know about actors,
//! properties or export groups, only the structure of packets and bunches.
//!
//! # Design Principles
//!
//! - **Version-gated layouts** - Every version-dependent read is keyed off
//!   [`ReplayVersions`]; unknown newer versions are refused, never guessed.
//! - **Bounded decoding** - Lengths and indices are validated against
//!   [`Limits`] before they drive allocation or table lookups.
//! - **Symmetric layout** - Every reader has a matching writer so streams can
//!   be constructed in tests and fuzz seeds.
//! - **No domain knowledge** - This crate handles framing, not replication.

mod bunch;
mod error;
mod guid;
mod limits;
mod names;
mod packet;
mod versions;

pub use bunch::{BunchHeader, OLD_MAX_ACTOR_CHANNELS};
pub use error::{LimitKind, VersionKind, WireError, WireResult};
pub use guid::{ExportFlags, NetworkGuid};
pub use limits::Limits;
pub use names::{
    read_bounded_fstring, read_static_name, static_name, BoolEncoding, ChannelCloseReason,
    ChannelType, StaticName, NAME_ACTOR, NAME_CONTROL, NAME_VOICE,
};
pub use packet::{packet_bit_length, read_packet_length, terminate_packet, write_packet_length};
pub use versions::{EngineNetworkVersion, NetworkVersion, ReplayHeaderFlags, ReplayVersions};
