//! Actor channel bunches: new-actor descriptors and content blocks.

use bitstream::BitReader;
use log::{trace, warn};
use schema::{read_packed_vector, read_rotation_short, Rotator, Vector3};
use wire::{EngineNetworkVersion, NetworkGuid, ReplayVersions, WireResult};

use crate::bunch::DataBunch;
use crate::channel::{Actor, Channel, SpawnInfo};
use crate::config::DecoderConfig;
use crate::error::BunchError;
use crate::guid_cache::GuidCache;
use crate::observer::ReplayObserver;
use crate::replicator::receive_replicator_bunch;

/// Framing of one content block inside an actor bunch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBlock {
    /// Object whose export group the block's properties use.
    pub object: NetworkGuid,
    pub has_rep_layout: bool,
    /// The sub-object was destroyed; the block carries no payload.
    pub deleted: bool,
    pub payload_bits: usize,
}

/// Handles a logical bunch on a non-control channel.
pub fn receive_actor_bunch(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    channel: &mut Channel,
    bunch: &DataBunch,
    observer: &mut dyn ReplayObserver,
) -> Result<(), BunchError> {
    let mut reader = bunch.payload.reader();
    if bunch.header.has_must_be_mapped_guids {
        let count = reader.read_u16()?;
        for _ in 0..count {
            reader.read_packed_u32()?;
        }
    }
    process_bunch(config, guids, channel, bunch, &mut reader, observer)
}

fn process_bunch(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    channel: &mut Channel,
    bunch: &DataBunch,
    reader: &mut BitReader<'_>,
    observer: &mut dyn ReplayObserver,
) -> Result<(), BunchError> {
    if channel.is_ignored() {
        return Ok(());
    }

    if channel.actor.is_none() {
        if !bunch.header.open {
            return Err(BunchError::NotOpen {
                channel: channel.index,
            });
        }
        let Some(actor) = read_new_actor(config, guids, reader)? else {
            return Ok(());
        };
        observer.on_actor(channel.index, &actor);
        let player_controller = actor
            .archetype
            .and_then(|archetype| guids.path(archetype))
            .is_some_and(|path| config.registry.is_player_controller(path));
        channel.actor = Some(actor);
        if player_controller {
            // net player index
            reader.skip_bytes(1)?;
        }
    }

    while !reader.is_at_end() {
        let block = read_content_block(config, guids, channel, reader)?;
        if block.deleted || block.payload_bits == 0 {
            continue;
        }
        let mut window = reader.window(block.payload_bits)?;
        if !block.object.is_valid() || window.is_at_end() || channel.is_ignored() {
            continue;
        }
        if let Err(err) = receive_replicator_bunch(
            config,
            guids,
            channel,
            block.object,
            block.has_rep_layout,
            &mut window,
            observer,
        ) {
            warn!(
                "channel {}: content block for {:?} unreadable: {err}",
                channel.index, block.object
            );
            break;
        }
    }
    Ok(())
}

/// Reads the spawn descriptor of a newly opened actor channel.
///
/// Returns `None` for a dynamic actor whose payload ends right after its
/// guid.
pub fn read_new_actor(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    reader: &mut BitReader<'_>,
) -> WireResult<Option<Actor>> {
    let limits = &config.limits;
    let guid = guids.load_object(reader, false, limits)?;
    if reader.is_at_end() && guid.is_dynamic() {
        trace!("empty dynamic actor {guid:?}");
        return Ok(None);
    }

    let mut actor = Actor::stable(guid);
    if guid.is_dynamic() {
        actor.archetype = Some(guids.load_object(reader, false, limits)?);
        if config
            .versions
            .engine_at_least(EngineNetworkVersion::NEW_ACTOR_OVERRIDE_LEVEL)
        {
            actor.level = Some(guids.load_object(reader, false, limits)?);
        }

        let versions = &config.versions;
        let location = conditionally_serialize_quantized_vector(reader, versions)?;
        let rotation = if reader.read_bit()? {
            read_rotation_short(reader)?
        } else {
            Rotator::ZERO
        };
        let scale = conditionally_serialize_quantized_vector(reader, versions)?;
        let velocity = conditionally_serialize_quantized_vector(reader, versions)?;
        actor.spawn = Some(SpawnInfo {
            location: location.unwrap_or(Vector3::ZERO),
            rotation,
            scale: scale.unwrap_or(Vector3::ONE),
            velocity: velocity.unwrap_or(Vector3::ZERO),
        });
    }
    Ok(Some(actor))
}

/// Reads an optional spawn vector; quantized unless the stream says
/// otherwise.
pub fn conditionally_serialize_quantized_vector(
    reader: &mut BitReader<'_>,
    versions: &ReplayVersions,
) -> WireResult<Option<Vector3>> {
    if !reader.read_bit()? {
        return Ok(None);
    }
    let quantize = !versions.engine_at_least(EngineNetworkVersion::OPTIONALLY_QUANTIZE_SPAWN_INFO)
        || reader.read_bit()?;
    let value = if quantize {
        read_packed_vector(reader, 10, 24)?
    } else {
        Vector3::read(reader)?
    };
    Ok(Some(value))
}

/// Reads a content block header and, unless the object was deleted, its
/// payload length.
pub fn read_content_block(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    channel: &Channel,
    reader: &mut BitReader<'_>,
) -> WireResult<ContentBlock> {
    let has_rep_layout = reader.read_bit()?;
    let is_actor = reader.read_bit()?;

    let (object, deleted) = if is_actor {
        let object = channel
            .actor
            .as_ref()
            .map_or(NetworkGuid::INVALID, Actor::replicated_object);
        (object, false)
    } else {
        let limits = &config.limits;
        let sub_object = guids.load_object(reader, false, limits)?;
        if reader.read_bit()? {
            // stably named
            (sub_object, false)
        } else {
            let class = guids.load_object(reader, false, limits)?;
            if config
                .versions
                .engine_at_least(EngineNetworkVersion::SUBOBJECT_OUTER_CHAIN)
            {
                let actor_is_outer = reader.is_at_end() || reader.read_bit()?;
                if !actor_is_outer {
                    guids.load_object(reader, false, limits)?;
                }
            }
            (class, !class.is_valid())
        }
    };

    let payload_bits = if deleted {
        0
    } else {
        reader.read_packed_u32()? as usize
    };
    Ok(ContentBlock {
        object,
        has_rep_layout,
        deleted,
        payload_bits,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bitstream::{BitBuffer, BitWriter};
    use schema::{write_packed_vector, write_rotation_short, ExportRegistry, NetFieldExportGroup};
    use wire::{BunchHeader, ChannelType, ExportFlags};

    use crate::observer::ExportRead;

    #[derive(Default)]
    struct Recorder {
        actors: Vec<(u32, Actor)>,
        reads: usize,
    }

    impl ReplayObserver for Recorder {
        fn on_actor(&mut self, channel: u32, actor: &Actor) {
            self.actors.push((channel, actor.clone()));
        }

        fn on_export_read(&mut self, _read: ExportRead<'_>) {
            self.reads += 1;
        }
    }

    fn config(registry: ExportRegistry) -> DecoderConfig {
        DecoderConfig {
            registry: Arc::new(registry),
            ..DecoderConfig::default()
        }
    }

    fn open_bunch(payload: BitWriter) -> DataBunch {
        let header = BunchHeader {
            control: true,
            open: true,
            reliable: true,
            ch_index: 5,
            ch_type: ChannelType::Actor,
            ..BunchHeader::default()
        };
        DataBunch::new(header, 1, payload.into_buffer())
    }

    fn channel() -> Channel {
        Channel::new(5, ChannelType::Actor, Some("Actor".to_owned()))
    }

    #[test]
    fn stably_named_actor_without_properties() {
        let config = config(ExportRegistry::diagnostic());
        let mut writer = BitWriter::new();
        writer.write_packed_u32(7);
        // stably named sub-object block with an empty payload
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_packed_u32(9);
        writer.write_bit(true);
        writer.write_packed_u32(0);

        let mut guids = GuidCache::new();
        let mut channel = channel();
        let mut observer = Recorder::default();
        receive_actor_bunch(
            &config,
            &mut guids,
            &mut channel,
            &open_bunch(writer),
            &mut observer,
        )
        .unwrap();

        assert_eq!(observer.actors.len(), 1);
        assert_eq!(observer.actors[0].1, Actor::stable(NetworkGuid::new(7)));
        assert_eq!(observer.reads, 0);
        assert_eq!(channel.actor, Some(Actor::stable(NetworkGuid::new(7))));
    }

    #[test]
    fn dynamic_actor_spawn_info() {
        let config = config(ExportRegistry::diagnostic());
        let mut writer = BitWriter::new();
        writer.write_packed_u32(8);
        // archetype with an inline path
        writer.write_packed_u32(NetworkGuid::DEFAULT.raw());
        writer.write_u8(ExportFlags::HAS_PATH);
        writer.write_packed_u32(0);
        writer.write_fstring("/Game/Player.Player_C");
        // level
        writer.write_packed_u32(0);
        // location, quantized
        writer.write_bit(true);
        writer.write_bit(true);
        write_packed_vector(&mut writer, Vector3::new(10.0, -4.0, 2.0), 10, 24).unwrap();
        writer.write_bit(true);
        write_rotation_short(&mut writer, Rotator::new(0.0, 90.0, 0.0));
        // scale absent, velocity raw
        writer.write_bit(false);
        writer.write_bit(true);
        writer.write_bit(false);
        Vector3::new(1.5, 0.0, 0.0).write(&mut writer);

        let buffer = writer.into_buffer();
        let mut reader = buffer.reader();
        let mut guids = GuidCache::new();
        let actor = read_new_actor(&config, &mut guids, &mut reader)
            .unwrap()
            .unwrap();
        assert!(reader.is_at_end());

        assert_eq!(actor.guid, NetworkGuid::new(8));
        assert_eq!(actor.archetype, Some(NetworkGuid::DEFAULT));
        assert_eq!(actor.level, Some(NetworkGuid::INVALID));
        let spawn = actor.spawn.unwrap();
        assert_eq!(spawn.location, Vector3::new(10.0, -4.0, 2.0));
        assert!((spawn.rotation.yaw - 90.0).abs() < 0.01);
        assert_eq!(spawn.scale, Vector3::ONE);
        assert_eq!(spawn.velocity, Vector3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn player_controller_skips_player_index() {
        let config = config(
            ExportRegistry::builder()
                .player_controller("/Game/Player.Player_C")
                .build()
                .unwrap(),
        );
        let mut guids = GuidCache::new();
        guids.record_path(NetworkGuid::new(3), "/Game/Player.Player_C".to_owned());

        let mut writer = BitWriter::new();
        writer.write_packed_u32(8);
        writer.write_packed_u32(3);
        writer.write_packed_u32(0);
        for _ in 0..4 {
            writer.write_bit(false);
        }
        writer.write_u8(0xAA);

        let mut channel = channel();
        let mut observer = Recorder::default();
        receive_actor_bunch(
            &config,
            &mut guids,
            &mut channel,
            &open_bunch(writer),
            &mut observer,
        )
        .unwrap();
        let actor = channel.actor.unwrap();
        assert_eq!(actor.archetype, Some(NetworkGuid::new(3)));
        assert_eq!(actor.spawn, Some(SpawnInfo::default()));
        assert_eq!(observer.actors.len(), 1);
    }

    #[test]
    fn empty_dynamic_actor_is_not_bound() {
        let config = config(ExportRegistry::diagnostic());
        let mut writer = BitWriter::new();
        writer.write_packed_u32(6);
        let mut guids = GuidCache::new();
        let mut channel = channel();
        let mut observer = Recorder::default();
        receive_actor_bunch(
            &config,
            &mut guids,
            &mut channel,
            &open_bunch(writer),
            &mut observer,
        )
        .unwrap();
        assert!(channel.actor.is_none());
        assert!(observer.actors.is_empty());
    }

    #[test]
    fn unbound_channel_requires_open() {
        let config = config(ExportRegistry::diagnostic());
        let mut bunch = open_bunch(BitWriter::new());
        bunch.header.open = false;
        bunch.payload = BitBuffer::from_bytes(vec![0x0E]);
        let result = receive_actor_bunch(
            &config,
            &mut GuidCache::new(),
            &mut channel(),
            &bunch,
            &mut Recorder::default(),
        );
        assert!(matches!(result, Err(BunchError::NotOpen { channel: 5 })));
    }

    #[test]
    fn must_be_mapped_guids_skipped() {
        let config = config(ExportRegistry::diagnostic());
        let mut writer = BitWriter::new();
        writer.write_u16(2);
        writer.write_packed_u32(300);
        writer.write_packed_u32(301);
        writer.write_packed_u32(5);
        let mut bunch = open_bunch(writer);
        bunch.header.has_must_be_mapped_guids = true;

        let mut channel = channel();
        let mut observer = Recorder::default();
        receive_actor_bunch(&config, &mut GuidCache::new(), &mut channel, &bunch, &mut observer)
            .unwrap();
        assert_eq!(channel.actor, Some(Actor::stable(NetworkGuid::new(5))));
    }

    #[test]
    fn deleted_sub_object_has_no_payload() {
        let config = config(ExportRegistry::diagnostic());
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        writer.write_bit(false);
        writer.write_packed_u32(12);
        writer.write_bit(false);
        writer.write_packed_u32(0);
        // actor is outer
        writer.write_bit(true);
        let buffer = writer.into_buffer();
        let mut reader = buffer.reader();

        let block =
            read_content_block(&config, &mut GuidCache::new(), &channel(), &mut reader).unwrap();
        assert!(block.deleted);
        assert_eq!(block.payload_bits, 0);
        assert!(reader.is_at_end());
    }

    #[test]
    fn ignored_channel_reads_nothing() {
        let config = config(ExportRegistry::diagnostic());
        let mut guids = GuidCache::new();
        let mut group = NetFieldExportGroup::new("/Game/Thing.Thing_C", 1, 1);
        group.set_export(schema::NetFieldExport::new(0, "Value"));
        guids.insert_group(group, &config.registry);
        guids.record_path(NetworkGuid::new(7), "/Game/Thing.Thing_C".to_owned());

        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bit(true);
        let mut properties = BitWriter::new();
        properties.write_bit(false);
        properties.write_packed_u32(1);
        properties.write_packed_u32(8);
        properties.write_u8(3);
        properties.write_packed_u32(0);
        let properties = properties.into_buffer();
        writer.write_packed_u32(properties.bit_len() as u32);
        writer.append_buffer(&properties).unwrap();
        let payload = writer.into_buffer();

        let mut channel = channel();
        channel.actor = Some(Actor::stable(NetworkGuid::new(7)));
        let bunch = DataBunch::new(open_bunch(BitWriter::new()).header, 2, payload);

        let mut observer = Recorder::default();
        receive_actor_bunch(&config, &mut guids, &mut channel, &bunch, &mut observer).unwrap();
        assert_eq!(observer.reads, 1);

        channel.ignore();
        receive_actor_bunch(&config, &mut guids, &mut channel, &bunch, &mut observer).unwrap();
        assert_eq!(observer.reads, 1);
    }
}
