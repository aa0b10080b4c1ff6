//! Fast-array delta episodes.
//!
//! A delta property carries a header followed by the indices of deleted
//! elements and the indices plus property streams of changed elements.

use bitstream::BitReader;
use log::{debug, warn};
use schema::{ExportObject, NetFieldExportGroup, ReadPolicy};
use wire::{EngineNetworkVersion, WireResult};

use crate::channel::Channel;
use crate::config::DecoderConfig;
use crate::observer::{FastArrayHeader, NetDeltaUpdate, ReplayObserver};
use crate::properties::{receive_properties, PropertiesRead};

impl FastArrayHeader {
    pub fn read(reader: &mut BitReader<'_>) -> WireResult<Self> {
        Ok(Self {
            array_replication_key: reader.read_i32()?,
            base_replication_key: reader.read_i32()?,
            num_deleted: reader.read_i32()?,
            num_changed: reader.read_i32()?,
        })
    }
}

/// The delta property being decoded.
#[derive(Debug, Clone, Copy)]
pub struct DeltaTarget<'a> {
    /// Class net cache group declaring the property.
    pub owner: &'a NetFieldExportGroup,
    pub handle: u32,
    /// Export group of the array element type.
    pub element: &'a NetFieldExportGroup,
    pub read_checksum_bit: bool,
}

/// Decodes one delta property.
///
/// Returns `false` when the stream cannot carry structured deltas or the
/// episode failed after its header; the caller abandons the rest of the
/// block. On an ignored channel, or for an element type configured as
/// skipped, it succeeds without events.
pub fn receive_custom_delta_property(
    config: &DecoderConfig,
    target: DeltaTarget<'_>,
    channel: &mut Channel,
    reader: &mut BitReader<'_>,
    observer: &mut dyn ReplayObserver,
) -> bool {
    match net_delta_serialize(config, target, channel, reader, observer) {
        Ok(received) => received,
        Err(err) => {
            warn!(
                "channel {}: delta {} of {}: {err}",
                channel.index, target.handle, target.owner.path_name
            );
            false
        }
    }
}

fn net_delta_serialize(
    config: &DecoderConfig,
    target: DeltaTarget<'_>,
    channel: &mut Channel,
    reader: &mut BitReader<'_>,
    observer: &mut dyn ReplayObserver,
) -> WireResult<bool> {
    let supports_delta_struct = config
        .versions
        .engine_at_least(EngineNetworkVersion::FAST_ARRAY_DELTA_STRUCT)
        && reader.read_bit()?;
    if !supports_delta_struct {
        debug!(
            "channel {}: {} uses unstructured delta serialization",
            channel.index, target.element.path_name
        );
        return Ok(false);
    }

    if channel.is_ignored() {
        return Ok(true);
    }
    if let ReadPolicy::Skip { .. } = config.registry.read_policy(target.element.type_id) {
        return Ok(true);
    }

    let header = FastArrayHeader::read(reader)?;
    let channel_index = channel.index;
    let update = |element_index: i32, export: Option<Box<dyn ExportObject>>| NetDeltaUpdate {
        channel: channel_index,
        element_index,
        deleted: export.is_none(),
        owner_group: &target.owner.path_name,
        element_group: &target.element.path_name,
        handle: target.handle,
        header,
        export,
    };

    for _ in 0..header.num_deleted.max(0) {
        let element_index = reader.read_i32()?;
        observer.on_net_delta(update(element_index, None));
    }

    for _ in 0..header.num_changed.max(0) {
        let element_index = reader.read_i32()?;
        match receive_properties(
            config,
            target.element,
            channel,
            reader,
            !target.read_checksum_bit,
            true,
        )? {
            PropertiesRead::Read { export, .. } => {
                observer.on_net_delta(update(element_index, Some(export)));
            }
            PropertiesRead::Failed => return Ok(false),
            PropertiesRead::Skipped => {}
        }
    }
    Ok(true)
}
