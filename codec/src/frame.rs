//! Demo frames: the records a replay data chunk is made of.

use bitstream::BitReader;
use log::{debug, trace};
use wire::{read_bounded_fstring, read_packet_length, NetworkGuid, NetworkVersion};

use crate::error::{ReplayError, ReplayResult};
use crate::exports::read_export_data;
use crate::observer::{ExternalData, ReplayObserver};
use crate::session::ParseSession;

/// Serialized size of a level transform: rotation quaternion, translation
/// and scale, all single precision.
const TRANSFORM_BYTES: usize = (4 + 3 + 3) * 4;

/// Opaque bytes between the streaming levels and the external data.
const STREAMING_FIXES_SKIP_BYTES: usize = 8;

impl ParseSession<'_> {
    /// Reads one demo frame and decodes every packet it carries.
    pub fn read_demo_frame(
        &mut self,
        reader: &mut BitReader<'_>,
        observer: &mut dyn ReplayObserver,
    ) -> ReplayResult<()> {
        let config = self.config;
        let versions = &config.versions;
        let limits = &config.limits;

        let level_index = if versions.network_at_least(NetworkVersion::MULTIPLE_LEVELS) {
            reader.read_i32()?
        } else {
            0
        };
        let time = reader.read_f32()?;
        trace!("frame {} at {time}s, level {level_index}", self.stats.frames);

        if versions.network_at_least(NetworkVersion::LEVEL_STREAMING_FIXES) {
            read_export_data(config, &mut self.guids, reader)?;
        }

        let streaming_fixes = versions.has_streaming_fixes();
        let streaming_levels = reader.read_packed_u32()?;
        for _ in 0..streaming_levels {
            if streaming_fixes {
                let name = read_bounded_fstring(reader, limits)?;
                observer.on_streaming_level(level_index, time, &name);
            } else {
                let package = read_bounded_fstring(reader, limits)?;
                let package_to_load = read_bounded_fstring(reader, limits)?;
                reader.skip_bytes(TRANSFORM_BYTES)?;
                debug!("streaming level {package} (loads {package_to_load})");
            }
        }
        if streaming_fixes {
            reader.skip_bytes(STREAMING_FIXES_SKIP_BYTES)?;
        }

        read_external_data(reader, time, observer)?;

        if versions.flags.has_game_specific_frame_data() {
            let skip = reader.read_u64()?;
            let skip = usize::try_from(skip).map_err(|_| ReplayError::InvalidLength {
                field: "game specific frame data",
                value: i64::try_from(skip).unwrap_or(i64::MAX),
            })?;
            reader.skip_bytes(skip)?;
        }

        loop {
            let seen_level = if streaming_fixes {
                reader.read_packed_u32()?
            } else {
                0
            };
            let Some(length) = read_packet_length(reader, limits)? else {
                break;
            };
            let packet = reader.read_bytes(length)?;
            if streaming_fixes && seen_level == 0 {
                trace!("skipping packet for unseen level");
                continue;
            }
            self.receive_raw_packet(&packet, observer)?;
        }

        self.stats.frames += 1;
        Ok(())
    }
}

/// Reads the external data records of a frame, up to the zero-length
/// terminator.
pub fn read_external_data(
    reader: &mut BitReader<'_>,
    time_seconds: f32,
    observer: &mut dyn ReplayObserver,
) -> ReplayResult<()> {
    loop {
        let bits = reader.read_packed_u32()?;
        if bits == 0 {
            return Ok(());
        }
        let guid = NetworkGuid::new(reader.read_packed_u32()?);
        let data = reader.read_bytes((bits as usize).div_ceil(8))?;
        observer.on_external_data(ExternalData {
            guid,
            time_seconds,
            data,
        });
    }
}
