//! Handle-tagged property streams.
//!
//! A property stream is a run of `(handle + 1, bit length, bits)` records
//! terminated by a zero handle. Each record is decoded inside a window of
//! exactly its declared length.

use bitstream::{BitBuffer, BitReader};
use log::{trace, warn};
use schema::{
    DebugExport, ExportObject, ExportTypeId, FieldRead, NetFieldExport, NetFieldExportGroup,
    ReadPolicy,
};
use wire::WireResult;

use crate::channel::Channel;
use crate::config::DecoderConfig;
use crate::error::FieldError;
use crate::observer::{ExportRead, ReplayObserver};

/// Outcome of one property stream.
#[derive(Debug)]
pub enum PropertiesRead {
    /// The group's type is configured not to be read; nothing was consumed.
    Skipped,
    /// A handle pointed past the export table; the rest of the stream is
    /// unusable.
    Failed,
    Read {
        export: Box<dyn ExportObject>,
        /// At least one field was applied.
        has_data: bool,
    },
}

enum Sink {
    Typed {
        id: ExportTypeId,
        object: Box<dyn ExportObject>,
    },
    Debug(DebugExport),
}

impl Sink {
    fn for_group(config: &DecoderConfig, group: &NetFieldExportGroup) -> Self {
        let typed = group
            .type_id
            .and_then(|id| config.registry.create(id).map(|object| (id, object)));
        match typed {
            Some((id, object)) => Self::Typed { id, object },
            None => Self::Debug(DebugExport::new(group.path_name.as_str())),
        }
    }

    fn read_field(
        &mut self,
        config: &DecoderConfig,
        group: &NetFieldExportGroup,
        export: &NetFieldExport,
        reader: &mut BitReader<'_>,
    ) -> Result<bool, FieldError> {
        let wire_error = |source| FieldError::Wire {
            group: group.path_name.clone(),
            field: export.name.clone(),
            source,
        };
        match self {
            Self::Typed { id, object } => {
                let read = config
                    .registry
                    .read_field(
                        *id,
                        object.as_mut(),
                        &export.name,
                        reader,
                        &config.versions,
                        &config.limits,
                    )
                    .map_err(wire_error)?;
                match read {
                    FieldRead::Applied => Ok(true),
                    FieldRead::Ignored => Ok(false),
                    FieldRead::Undeclared => {
                        trace!("{}: no handler for {}", group.path_name, export.name);
                        Ok(false)
                    }
                    FieldRead::Residual { bits } => Err(FieldError::Residual {
                        group: group.path_name.clone(),
                        field: export.name.clone(),
                        bits,
                    }),
                }
            }
            Self::Debug(debug) => {
                let bits = reader.bits_remaining();
                let captured = BitBuffer::read_from(reader, bits)
                    .map_err(|err| wire_error(err.into()))?;
                debug.insert(export.handle, Some(export.name.clone()), captured);
                Ok(true)
            }
        }
    }

    fn into_export(self) -> Box<dyn ExportObject> {
        match self {
            Self::Typed { object, .. } => object,
            Self::Debug(debug) => Box::new(debug),
        }
    }
}

/// Reads one property stream for `group`.
///
/// Nothing is read on an ignored channel. Outside delta episodes a group
/// whose type is configured as skipped is not read at all, and may mark the
/// channel ignored. Field-level failures are
/// logged and the field skipped; only stream errors outside a field window
/// are returned.
pub fn receive_properties(
    config: &DecoderConfig,
    group: &NetFieldExportGroup,
    channel: &mut Channel,
    reader: &mut BitReader<'_>,
    read_checksum_bit: bool,
    is_delta: bool,
) -> WireResult<PropertiesRead> {
    if channel.is_ignored() {
        return Ok(PropertiesRead::Skipped);
    }
    if !is_delta {
        if let ReadPolicy::Skip { ignore_channel } = config.registry.read_policy(group.type_id) {
            if ignore_channel {
                channel.ignore();
            }
            return Ok(PropertiesRead::Skipped);
        }
    }

    if read_checksum_bit {
        reader.read_bit()?;
    }

    let mut sink = Sink::for_group(config, group);
    let mut has_data = false;

    loop {
        let handle = reader.read_packed_u32()?;
        if handle == 0 {
            break;
        }
        let handle = handle - 1;
        if !group.is_valid_index(handle) {
            warn!(
                "{}",
                FieldError::HandleOutOfRange {
                    group: group.path_name.clone(),
                    handle,
                    len: group.len(),
                }
            );
            return Ok(PropertiesRead::Failed);
        }

        let bits = reader.read_packed_u32()? as usize;
        if bits == 0 {
            continue;
        }
        let Some(export) = group.export(handle).filter(|export| !export.incompatible) else {
            reader.skip_bits(bits)?;
            continue;
        };

        let mut window = reader.window(bits)?;
        match sink.read_field(config, group, export, &mut window) {
            Ok(applied) => has_data |= applied,
            Err(err) => warn!("channel {}: {err}", channel.index),
        }
    }

    channel.mark_read();
    Ok(PropertiesRead::Read {
        export: sink.into_export(),
        has_data,
    })
}

/// Hands a completed export to the observer, tagged with the channel's actor.
pub(crate) fn notify_export(
    observer: &mut dyn ReplayObserver,
    channel: &Channel,
    group_path: &str,
    export: Box<dyn ExportObject>,
) {
    observer.on_export_read(ExportRead {
        channel: channel.index,
        group_path,
        actor: channel.actor.as_ref().map(|actor| actor.guid),
        export,
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bitstream::BitWriter;
    use schema::{ExportRegistry, ExportType, FallbackPolicy, RepLayoutCmd};
    use wire::ChannelType;

    const PAWN: &str = "/Game/Pawn.Pawn_C";

    #[derive(Debug, Default)]
    struct Pawn {
        health: Option<i32>,
        armor: Option<i32>,
    }

    fn config(registry: ExportRegistry) -> DecoderConfig {
        DecoderConfig {
            registry: Arc::new(registry),
            ..DecoderConfig::default()
        }
    }

    fn pawn_registry() -> ExportRegistry {
        ExportRegistry::builder()
            .export(
                ExportType::<Pawn>::new(PAWN)
                    .field("Health", RepLayoutCmd::Int, |pawn, value| {
                        pawn.health = value.as_i32();
                    })
                    .field("Armor", RepLayoutCmd::Int, |pawn, value| {
                        pawn.armor = value.as_i32();
                    }),
            )
            .build()
            .unwrap()
    }

    fn pawn_group(config: &DecoderConfig) -> NetFieldExportGroup {
        let mut group = NetFieldExportGroup::new(PAWN, 1, 3);
        group.set_export(NetFieldExport::new(0, "Health"));
        group.set_export(NetFieldExport::new(1, "Armor"));
        group.type_id = config.registry.resolve(PAWN);
        group
    }

    fn channel() -> Channel {
        Channel::new(2, ChannelType::Actor, None)
    }

    fn write_field(writer: &mut BitWriter, handle: u32, build: impl FnOnce(&mut BitWriter)) {
        let mut field = BitWriter::new();
        build(&mut field);
        let field = field.into_buffer();
        writer.write_packed_u32(handle + 1);
        writer.write_packed_u32(field.bit_len() as u32);
        writer.append_buffer(&field).unwrap();
    }

    fn read(
        config: &DecoderConfig,
        group: &NetFieldExportGroup,
        channel: &mut Channel,
        bytes: &[u8],
    ) -> PropertiesRead {
        let mut reader = BitReader::new(bytes);
        receive_properties(config, group, channel, &mut reader, true, false).unwrap()
    }

    #[test]
    fn typed_fields_applied() {
        let config = config(pawn_registry());
        let group = pawn_group(&config);
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        write_field(&mut writer, 0, |w| w.write_i32(100));
        write_field(&mut writer, 1, |w| w.write_i32(25));
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        let mut channel = channel();
        let PropertiesRead::Read { export, has_data } =
            read(&config, &group, &mut channel, &bytes)
        else {
            panic!("expected a read");
        };
        assert!(has_data);
        let pawn = export.downcast_ref::<Pawn>().unwrap();
        assert_eq!(pawn.health, Some(100));
        assert_eq!(pawn.armor, Some(25));
        assert_eq!(channel.ignore, crate::channel::IgnoreState::Read);
    }

    #[test]
    fn residual_field_skipped_siblings_kept() {
        let config = config(pawn_registry());
        let group = pawn_group(&config);
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        write_field(&mut writer, 0, |w| {
            w.write_i32(100);
            w.write_u8(1);
        });
        write_field(&mut writer, 1, |w| w.write_i32(7));
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        let PropertiesRead::Read { export, .. } = read(&config, &group, &mut channel(), &bytes)
        else {
            panic!("expected a read");
        };
        let pawn = export.downcast_ref::<Pawn>().unwrap();
        assert_eq!(pawn.health, None);
        assert_eq!(pawn.armor, Some(7));
    }

    #[test]
    fn handle_out_of_range_fails() {
        let config = config(pawn_registry());
        let group = pawn_group(&config);
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        write_field(&mut writer, 0, |w| w.write_i32(1));
        write_field(&mut writer, 3, |w| w.write_i32(1));
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        assert!(matches!(
            read(&config, &group, &mut channel(), &bytes),
            PropertiesRead::Failed
        ));
    }

    #[test]
    fn missing_and_incompatible_exports_skipped() {
        let config = config(pawn_registry());
        let mut group = pawn_group(&config);
        group.exports[1].as_mut().unwrap().incompatible = true;
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        write_field(&mut writer, 1, |w| w.write_i32(3));
        write_field(&mut writer, 2, |w| w.write_u8(9));
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let result =
            receive_properties(&config, &group, &mut channel(), &mut reader, true, false).unwrap();
        let PropertiesRead::Read { export, has_data } = result else {
            panic!("expected a read");
        };
        assert!(!has_data);
        assert_eq!(export.downcast_ref::<Pawn>().unwrap().armor, None);
        assert!(reader.bits_remaining() < 8);
    }

    #[test]
    fn unregistered_group_captured_for_diagnosis() {
        let config = config(ExportRegistry::diagnostic());
        let mut group = NetFieldExportGroup::new("/Game/Door.Door_C", 2, 1);
        group.set_export(NetFieldExport::new(0, "bOpen"));
        let mut writer = BitWriter::new();
        write_field(&mut writer, 0, |w| w.write_bit(true));
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let result =
            receive_properties(&config, &group, &mut channel(), &mut reader, false, false)
                .unwrap();
        let PropertiesRead::Read { export, has_data } = result else {
            panic!("expected a read");
        };
        assert!(has_data);
        let debug = export.downcast_ref::<DebugExport>().unwrap();
        assert_eq!(debug.group_path, "/Game/Door.Door_C");
        assert_eq!(debug.field("bOpen").unwrap().bits.bit_len(), 1);
    }

    #[test]
    fn skip_policy_ignores_channel() {
        let registry = ExportRegistry::builder()
            .fallback(FallbackPolicy::Skip {
                ignore_channel: true,
            })
            .build()
            .unwrap();
        let config = config(registry);
        let group = NetFieldExportGroup::new("/Game/Tree.Tree_C", 5, 1);
        let mut channel = channel();

        let bytes = [0xFF];
        assert!(matches!(
            read(&config, &group, &mut channel, &bytes),
            PropertiesRead::Skipped
        ));
        assert!(channel.is_ignored());

        // not even a delta read gets through once the channel is ignored
        let mut reader = BitReader::new(&[0]);
        let result =
            receive_properties(&config, &group, &mut channel, &mut reader, false, true).unwrap();
        assert!(matches!(result, PropertiesRead::Skipped));
        assert!(channel.is_ignored());
    }

    #[test]
    fn delta_reads_bypass_skip_policy() {
        let registry = ExportRegistry::builder()
            .fallback(FallbackPolicy::Skip {
                ignore_channel: false,
            })
            .build()
            .unwrap();
        let config = config(registry);
        let group = NetFieldExportGroup::new("/Game/Tree.Tree_C", 5, 1);
        let mut channel = channel();

        let mut reader = BitReader::new(&[0]);
        let result =
            receive_properties(&config, &group, &mut channel, &mut reader, false, true).unwrap();
        assert!(matches!(result, PropertiesRead::Read { has_data: false, .. }));
        assert!(!channel.is_ignored());
    }

    #[test]
    fn ignored_channel_applies_nothing() {
        let config = config(pawn_registry());
        let group = pawn_group(&config);
        let mut channel = channel();
        channel.ignore();
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        write_field(&mut writer, 0, |w| w.write_i32(100));
        writer.write_packed_u32(0);
        let bytes = writer.finish();
        assert!(matches!(
            read(&config, &group, &mut channel, &bytes),
            PropertiesRead::Skipped
        ));

        let mut reader = BitReader::new(&bytes);
        let result =
            receive_properties(&config, &group, &mut channel, &mut reader, true, true).unwrap();
        assert!(matches!(result, PropertiesRead::Skipped));
    }

    #[test]
    fn failed_only_field_reports_no_data() {
        let config = config(pawn_registry());
        let group = pawn_group(&config);
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        write_field(&mut writer, 0, |w| {
            w.write_i32(100);
            w.write_u8(0);
        });
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        let PropertiesRead::Read { export, has_data } =
            read(&config, &group, &mut channel(), &bytes)
        else {
            panic!("expected a read");
        };
        assert!(!has_data);
        assert_eq!(export.downcast_ref::<Pawn>().unwrap().health, None);
    }

    #[test]
    fn undeclared_only_field_reports_no_data() {
        let config = config(pawn_registry());
        let mut group = pawn_group(&config);
        group.set_export(NetFieldExport::new(2, "Stamina"));
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        write_field(&mut writer, 2, |w| w.write_i32(5));
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        assert!(matches!(
            read(&config, &group, &mut channel(), &bytes),
            PropertiesRead::Read { has_data: false, .. }
        ));
    }
}
