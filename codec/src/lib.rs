//! Replay stream decoding for the rewind decoder.
//!
//! This is the main crate that ties together bitstream, wire, and schema to
//! turn a decompressed replay data chunk into observer events.
//!
//! # Features
//!
//! - Demo frame and packet decoding
//! - Reliable sequencing and partial bunch reassembly
//! - Channel lifecycle and actor spawn decoding
//! - Guid path resolution and export group tables
//! - Property, RPC and fast-array delta decoding
//!
//! # Design Principles
//!
//! - **Fail small** - A bad field skips the field and a bad bunch drops the
//!   bunch. Only framing errors end a parse.
//! - **Bounded** - Every count and length read from the stream is checked
//!   against [`wire::Limits`] before it drives allocation or recursion.
//! - **State per parse** - All mutable state lives in a [`ParseSession`];
//!   a [`ReplayReader`] is configuration only.
//! - **Events in stream order** - Observers see actors, properties and
//!   deltas in exactly the order the stream carried them.

mod actor;
mod bunch;
mod channel;
mod config;
mod decoder;
mod delta;
mod error;
mod exports;
mod external;
mod frame;
mod guid_cache;
mod observer;
mod packet;
mod properties;
mod replicator;
mod session;

pub use actor::{
    conditionally_serialize_quantized_vector, read_content_block, read_new_actor,
    receive_actor_bunch, ContentBlock,
};
pub use bunch::{DataBunch, Reassembler};
pub use channel::{Actor, Channel, ChannelTable, IgnoreState, SpawnInfo};
pub use config::DecoderConfig;
pub use decoder::ReplayReader;
pub use delta::{receive_custom_delta_property, DeltaTarget};
pub use error::{BunchError, FieldError, MergeReason, ReplayError, ReplayResult};
pub use exports::{
    read_export_data, read_net_export_guids, read_net_field_exports, receive_net_guid_bunch,
};
pub use external::{prepare_replay_data, ChunkEncoding, Decompressor, Decryptor};
pub use frame::read_external_data;
pub use guid_cache::GuidCache;
pub use observer::{
    ExportRead, ExternalData, FastArrayHeader, NetDeltaUpdate, NullObserver, ReplayObserver,
};
pub use properties::{receive_properties, PropertiesRead};
pub use replicator::receive_replicator_bunch;
pub use session::{ParseSession, ParseStats, ReplaySummary};
pub use wire::Limits as WireLimits;
