//! Bunch header layout.

use bitstream::{BitReader, BitWriter};

use crate::error::{LimitKind, WireError, WireResult};
use crate::limits::Limits;
use crate::names::{static_name, BoolEncoding, ChannelCloseReason, ChannelType, StaticName};
use crate::versions::{EngineNetworkVersion, ReplayVersions};

/// Channel count used by engines that serialize the channel index bounded.
pub const OLD_MAX_ACTOR_CHANNELS: u32 = 10_240;

/// Header of one bunch inside a packet.
///
/// The reliable sequence number is not carried on the wire; receivers derive
/// it from their own counters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BunchHeader {
    pub control: bool,
    pub open: bool,
    pub close: bool,
    pub dormant: bool,
    pub close_reason: ChannelCloseReason,
    pub replication_paused: bool,
    pub reliable: bool,
    pub ch_index: u32,
    pub has_package_map_exports: bool,
    pub has_must_be_mapped_guids: bool,
    pub partial: bool,
    pub partial_initial: bool,
    pub partial_final: bool,
    pub ch_type: ChannelType,
    pub ch_name: Option<String>,
    /// Payload size in bits, including any package-map exports.
    pub bunch_data_bits: u32,
}

impl BunchHeader {
    /// Reads a bunch header.
    pub fn read(
        reader: &mut BitReader<'_>,
        versions: &ReplayVersions,
        limits: &Limits,
    ) -> WireResult<Self> {
        if versions.engine < EngineNetworkVersion::ACKS_INCLUDED_IN_HEADER {
            // ack dummy
            reader.read_bit()?;
        }

        let control = reader.read_bit()?;
        let open = control && reader.read_bit()?;
        let close = control && reader.read_bit()?;

        let (dormant, close_reason) =
            if versions.engine < EngineNetworkVersion::CHANNEL_CLOSE_REASON {
                let dormant = close && reader.read_bit()?;
                let reason = if dormant {
                    ChannelCloseReason::Dormancy
                } else {
                    ChannelCloseReason::Destroyed
                };
                (dormant, reason)
            } else {
                let reason = if close {
                    ChannelCloseReason::from_raw(
                        reader.read_serialized_int(ChannelCloseReason::MAX)?,
                    )
                } else {
                    ChannelCloseReason::Destroyed
                };
                (reason == ChannelCloseReason::Dormancy, reason)
            };

        let replication_paused = reader.read_bit()?;
        let reliable = reader.read_bit()?;

        let ch_index = if versions.engine < EngineNetworkVersion::MAX_ACTOR_CHANNELS_CUSTOMIZATION {
            reader.read_serialized_int(OLD_MAX_ACTOR_CHANNELS)?
        } else {
            reader.read_packed_u32()?
        };
        if ch_index as usize >= limits.max_channels {
            return Err(WireError::LimitsExceeded {
                kind: LimitKind::ChannelIndex,
                limit: limits.max_channels,
                actual: ch_index as usize,
            });
        }

        let has_package_map_exports = reader.read_bit()?;
        let has_must_be_mapped_guids = reader.read_bit()?;
        let partial = reader.read_bit()?;
        let partial_initial = partial && reader.read_bit()?;
        let partial_final = partial && reader.read_bit()?;

        let (ch_type, ch_name) = if !(reliable || open) {
            (ChannelType::None, None)
        } else if versions.engine < EngineNetworkVersion::CHANNEL_NAMES {
            let ch_type = ChannelType::from_raw(reader.read_serialized_int(ChannelType::MAX)?);
            (ch_type, ch_type.name().map(str::to_owned))
        } else {
            let name = match StaticName::read(reader, versions, limits, BoolEncoding::Bit)? {
                StaticName::Hardcoded(index) => static_name(index).map(str::to_owned),
                StaticName::Inline { name, .. } => Some(name),
            };
            let ch_type = name
                .as_deref()
                .map_or(ChannelType::None, ChannelType::from_name);
            (ch_type, name)
        };

        let bunch_data_bits = reader.read_serialized_int(limits.max_bunch_bits())?;

        Ok(Self {
            control,
            open,
            close,
            dormant,
            close_reason,
            replication_paused,
            reliable,
            ch_index,
            has_package_map_exports,
            has_must_be_mapped_guids,
            partial,
            partial_initial,
            partial_final,
            ch_type,
            ch_name,
            bunch_data_bits,
        })
    }

    /// Writes a bunch header in the layout [`BunchHeader::read`] expects.
    ///
    /// Flags that are only meaningful under another flag (`open`/`close`
    /// under `control`, `partial_initial`/`partial_final` under `partial`)
    /// are written only when their parent is set.
    pub fn write(
        &self,
        writer: &mut BitWriter,
        versions: &ReplayVersions,
        limits: &Limits,
    ) -> WireResult<()> {
        if versions.engine < EngineNetworkVersion::ACKS_INCLUDED_IN_HEADER {
            writer.write_bit(false);
        }

        writer.write_bit(self.control);
        if self.control {
            writer.write_bit(self.open);
            writer.write_bit(self.close);
        }
        let close = self.control && self.close;
        if versions.engine < EngineNetworkVersion::CHANNEL_CLOSE_REASON {
            if close {
                writer.write_bit(self.dormant);
            }
        } else if close {
            writer.write_serialized_int(self.close_reason.raw(), ChannelCloseReason::MAX)?;
        }

        writer.write_bit(self.replication_paused);
        writer.write_bit(self.reliable);

        if versions.engine < EngineNetworkVersion::MAX_ACTOR_CHANNELS_CUSTOMIZATION {
            writer.write_serialized_int(self.ch_index, OLD_MAX_ACTOR_CHANNELS)?;
        } else {
            writer.write_packed_u32(self.ch_index);
        }

        writer.write_bit(self.has_package_map_exports);
        writer.write_bit(self.has_must_be_mapped_guids);
        writer.write_bit(self.partial);
        if self.partial {
            writer.write_bit(self.partial_initial);
            writer.write_bit(self.partial_final);
        }

        if self.reliable || (self.control && self.open) {
            if versions.engine < EngineNetworkVersion::CHANNEL_NAMES {
                writer.write_serialized_int(self.ch_type.raw(), ChannelType::MAX)?;
            } else {
                let name = match (self.ch_type.hardcoded_index(), &self.ch_name) {
                    (Some(index), _) => StaticName::Hardcoded(index),
                    (None, Some(name)) => StaticName::Inline {
                        name: name.clone(),
                        number: 0,
                    },
                    (None, None) => StaticName::Hardcoded(0),
                };
                name.write(writer, versions, BoolEncoding::Bit);
            }
        }

        writer.write_serialized_int(self.bunch_data_bits, limits.max_bunch_bits())?;
        Ok(())
    }
}
