//! Export declarations: field layouts and guid paths announced by the stream.
//!
//! Declarations arrive in two places. Demo frames carry `NetFieldExports`
//! and `NetExportGuids` ahead of their packets, and any bunch may carry
//! package map exports ahead of its payload.

use bitstream::BitReader;
use log::{error, trace};
use schema::{NetFieldExport, NetFieldExportGroup};
use wire::{read_bounded_fstring, BoolEncoding, LimitKind, WireError, WireResult};

use crate::config::DecoderConfig;
use crate::error::{ReplayError, ReplayResult};
use crate::guid_cache::{GroupId, GuidCache};

/// Reads the export declarations at the head of a demo frame.
pub fn read_export_data(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    reader: &mut BitReader<'_>,
) -> ReplayResult<()> {
    read_net_field_exports(config, guids, reader)?;
    read_net_export_guids(config, guids, reader)
}

/// Reads a frame-level `NetFieldExports` block.
pub fn read_net_field_exports(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    reader: &mut BitReader<'_>,
) -> WireResult<()> {
    let count = reader.read_packed_u32()?;
    for _ in 0..count {
        let path_index = reader.read_packed_u32()?;
        let exported = reader.read_packed_u32()? == 1;
        let mut group = guids.group_by_index(path_index);
        if exported {
            let path = read_bounded_fstring(reader, &config.limits)?;
            let export_count = reader.read_packed_u32()?;
            group = Some(declare_group(config, guids, path_index, path, export_count)?);
        }

        let export = NetFieldExport::read(reader, &config.versions, &config.limits, BoolEncoding::Byte)?;
        store_export(guids, group, path_index, export);
    }
    Ok(())
}

/// Reads a frame-level `NetExportGuids` block.
///
/// Each guid is a length-prefixed blob resolved in export context. A blob
/// that fails to resolve is logged and skipped.
pub fn read_net_export_guids(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    reader: &mut BitReader<'_>,
) -> ReplayResult<()> {
    let count = reader.read_packed_u32()?;
    for _ in 0..count {
        let size = reader.read_i32()?;
        let size = usize::try_from(size).map_err(|_| ReplayError::InvalidLength {
            field: "export guid",
            value: i64::from(size),
        })?;
        let mut blob = reader.window(size * 8)?;
        if let Err(err) = guids.load_object(&mut blob, true, &config.limits) {
            error!("export guid blob of {size} bytes unreadable: {err}");
        }
    }
    Ok(())
}

/// Reads the package map exports carried at the head of a bunch.
pub fn receive_net_guid_bunch(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    reader: &mut BitReader<'_>,
) -> WireResult<()> {
    let has_rep_layout_export = reader.read_bit()?;
    if has_rep_layout_export {
        return receive_net_field_exports_compat(config, guids, reader);
    }

    let count = reader.read_i32()?;
    let limit = config.limits.max_guids_per_bunch;
    if usize::try_from(count).is_ok_and(|count| count > limit) {
        error!("bunch exports {count} guids, limit is {limit}");
        return Ok(());
    }
    for _ in 0..count.max(0) {
        guids.load_object(reader, true, &config.limits)?;
    }
    Ok(())
}

/// Field layouts announced inside a bunch rather than a demo frame.
fn receive_net_field_exports_compat(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    reader: &mut BitReader<'_>,
) -> WireResult<()> {
    let count = reader.read_u32()?;
    for _ in 0..count {
        let path_index = reader.read_packed_u32()?;
        let mut group = guids.group_by_index(path_index);
        if reader.read_bit()? {
            let path = read_bounded_fstring(reader, &config.limits)?;
            let export_count = reader.read_u32()?;
            group = Some(declare_group(config, guids, path_index, path, export_count)?);
        }

        let export = NetFieldExport::read(reader, &config.versions, &config.limits, BoolEncoding::Bit)?;
        store_export(guids, group, path_index, export);
    }
    Ok(())
}

/// Returns the group bound to `path_index`, creating it on first
/// declaration.
fn declare_group(
    config: &DecoderConfig,
    guids: &mut GuidCache,
    path_index: u32,
    path: String,
    export_count: u32,
) -> WireResult<GroupId> {
    if let Some(id) = guids.group_by_index(path_index) {
        return Ok(id);
    }
    let export_count = export_count as usize;
    let limit = config.limits.max_group_exports;
    if export_count > limit {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::GroupExports,
            limit,
            actual: export_count,
        });
    }

    trace!("export group {path} (index {path_index}, {export_count} exports)");
    let group = NetFieldExportGroup::new(path, path_index, export_count);
    let id = guids.insert_group(group, &config.registry);
    guids.bind_path_index(path_index, id);
    Ok(id)
}

fn store_export(
    guids: &mut GuidCache,
    group: Option<GroupId>,
    path_index: u32,
    export: Option<NetFieldExport>,
) {
    let Some(export) = export else {
        return;
    };
    let Some(group) = group else {
        error!(
            "field export {} for undeclared group index {path_index}",
            export.name
        );
        return;
    };
    let group = guids.group_mut(group);
    let handle = export.handle;
    if !group.set_export(export) {
        error!(
            "field export handle {handle} out of range for {} ({} exports)",
            group.path_name,
            group.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitstream::BitWriter;
    use wire::{ExportFlags, Limits, NetworkGuid};

    fn config() -> DecoderConfig {
        DecoderConfig::default().with_limits(Limits::for_testing())
    }

    fn write_field_export(writer: &mut BitWriter, handle: u32, name: &str, encoding: BoolEncoding) {
        NetFieldExport::new(handle, name).write(writer, &config().versions, encoding);
    }

    #[test]
    fn frame_exports_declare_groups() {
        let mut writer = BitWriter::new();
        writer.write_packed_u32(3);
        // declaring entry
        writer.write_packed_u32(4);
        writer.write_packed_u32(1);
        writer.write_fstring("/Game/Pawn.Pawn_C");
        writer.write_packed_u32(2);
        write_field_export(&mut writer, 0, "Health", BoolEncoding::Byte);
        // follow-up entry by index only
        writer.write_packed_u32(4);
        writer.write_packed_u32(0);
        write_field_export(&mut writer, 1, "Shield", BoolEncoding::Byte);
        // unknown index
        writer.write_packed_u32(9);
        writer.write_packed_u32(0);
        write_field_export(&mut writer, 0, "Lost", BoolEncoding::Byte);
        // no export guids
        writer.write_packed_u32(0);
        let bytes = writer.finish();

        let config = config();
        let mut guids = GuidCache::new();
        let mut reader = BitReader::new(&bytes);
        read_export_data(&config, &mut guids, &mut reader).unwrap();
        assert!(reader.is_at_end());

        assert_eq!(guids.group_count(), 1);
        let group = guids.group_by_path("/Game/Pawn.Pawn_C").unwrap();
        assert_eq!(group.path_name_index, 4);
        assert_eq!(group.field_names().collect::<Vec<_>>(), ["Health", "Shield"]);
    }

    #[test]
    fn redeclared_index_keeps_group() {
        let mut writer = BitWriter::new();
        writer.write_packed_u32(2);
        for handle in 0..2 {
            writer.write_packed_u32(4);
            writer.write_packed_u32(1);
            writer.write_fstring("/Game/Pawn.Pawn_C");
            writer.write_packed_u32(2);
            write_field_export(&mut writer, handle, &format!("Field{handle}"), BoolEncoding::Byte);
        }
        let bytes = writer.finish();

        let config = config();
        let mut guids = GuidCache::new();
        read_net_field_exports(&config, &mut guids, &mut BitReader::new(&bytes)).unwrap();
        assert_eq!(guids.group_count(), 1);
        let group = guids.group_by_path("/Game/Pawn.Pawn_C").unwrap();
        assert_eq!(group.field_names().count(), 2);
    }

    #[test]
    fn oversized_group_refused() {
        let mut writer = BitWriter::new();
        writer.write_packed_u32(1);
        writer.write_packed_u32(4);
        writer.write_packed_u32(1);
        writer.write_fstring("/Game/Pawn.Pawn_C");
        writer.write_packed_u32(10_000);
        let bytes = writer.finish();

        let config = config();
        let mut guids = GuidCache::new();
        let err = read_net_field_exports(&config, &mut guids, &mut BitReader::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            WireError::LimitsExceeded {
                kind: LimitKind::GroupExports,
                ..
            }
        ));
        assert_eq!(guids.group_count(), 0);
    }

    #[test]
    fn export_guid_blobs_resolved_independently() {
        let mut blob = BitWriter::new();
        blob.write_packed_u32(6);
        blob.write_u8(ExportFlags::HAS_PATH);
        blob.write_packed_u32(0);
        blob.write_fstring("/Game/Items/Sword");
        let blob = blob.finish();

        let mut writer = BitWriter::new();
        writer.write_packed_u32(2);
        // truncated blob: flags byte promised but missing
        writer.write_i32(1);
        writer.write_packed_u32(8);
        writer.write_i32(blob.len() as i32);
        writer.write_bytes(&blob);
        let bytes = writer.finish();

        let config = config();
        let mut guids = GuidCache::new();
        let mut reader = BitReader::new(&bytes);
        read_net_export_guids(&config, &mut guids, &mut reader).unwrap();
        assert!(reader.is_at_end());
        assert_eq!(guids.path(NetworkGuid::new(6)), Some("/Game/Items/Sword"));
        assert_eq!(guids.path(NetworkGuid::new(8)), None);
    }

    #[test]
    fn negative_export_guid_size_is_fatal() {
        let mut writer = BitWriter::new();
        writer.write_packed_u32(1);
        writer.write_i32(-4);
        let bytes = writer.finish();

        let err = read_net_export_guids(&config(), &mut GuidCache::new(), &mut BitReader::new(&bytes))
            .unwrap_err();
        assert_eq!(
            err,
            ReplayError::InvalidLength {
                field: "export guid",
                value: -4
            }
        );
    }

    #[test]
    fn bunch_guid_exports() {
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        writer.write_i32(1);
        writer.write_packed_u32(10);
        writer.write_u8(ExportFlags::HAS_PATH);
        writer.write_packed_u32(0);
        writer.write_fstring("/Game/Pawn.Pawn_C");
        let bytes = writer.finish();

        let mut guids = GuidCache::new();
        receive_net_guid_bunch(&config(), &mut guids, &mut BitReader::new(&bytes)).unwrap();
        assert_eq!(guids.path(NetworkGuid::new(10)), Some("/Game/Pawn.Pawn_C"));
    }

    #[test]
    fn bunch_guid_count_over_limit_ignored() {
        let mut writer = BitWriter::new();
        writer.write_bit(false);
        writer.write_i32(1000);
        writer.write_packed_u32(10);
        let bytes = writer.finish();

        let mut guids = GuidCache::new();
        let mut reader = BitReader::new(&bytes);
        receive_net_guid_bunch(&config(), &mut guids, &mut reader).unwrap();
        assert_eq!(guids.paths().count(), 0);
    }

    #[test]
    fn bunch_compat_field_exports() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_u32(2);
        writer.write_packed_u32(7);
        writer.write_bit(true);
        writer.write_fstring("/Script/Game.Inventory");
        writer.write_u32(1);
        write_field_export(&mut writer, 0, "Items", BoolEncoding::Bit);
        // handle outside the declared group is dropped
        writer.write_packed_u32(7);
        writer.write_bit(false);
        write_field_export(&mut writer, 3, "Extra", BoolEncoding::Bit);
        let buffer = writer.into_buffer();

        let mut guids = GuidCache::new();
        let mut reader = buffer.reader();
        receive_net_guid_bunch(&config(), &mut guids, &mut reader).unwrap();
        assert!(reader.is_at_end());
        let group = guids.group_by_path("/Script/Game.Inventory").unwrap();
        assert_eq!(group.field_names().collect::<Vec<_>>(), ["Items"]);
    }
}
