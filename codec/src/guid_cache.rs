//! Network guid resolution and the per-parse export group tables.

use std::collections::HashMap;

use bitstream::BitReader;
use log::warn;
use schema::{clean_path_name, ExportRegistry, NetFieldExportGroup, CLASS_NET_CACHE_SUFFIX};
use wire::{read_bounded_fstring, ExportFlags, Limits, NetworkGuid, WireResult};

/// Index of an export group within one parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GroupId(usize);

/// Guid → path map plus the export groups declared so far.
///
/// Everything here lives for exactly one parse.
#[derive(Debug, Default)]
pub struct GuidCache {
    paths: HashMap<NetworkGuid, String>,
    groups: Vec<NetFieldExportGroup>,
    by_path: HashMap<String, GroupId>,
    by_clean: HashMap<String, GroupId>,
    by_index: HashMap<u32, GroupId>,
}

impl GuidCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an object reference, resolving its outer chain.
    ///
    /// In export context every reference carries a flags byte and every path
    /// read is recorded. An outer chain deeper than `max_guid_depth` stops
    /// descending; the paths of the references already read are still
    /// consumed. The first reference read is returned, never one of its
    /// outers.
    pub fn load_object(
        &mut self,
        reader: &mut BitReader<'_>,
        is_export: bool,
        limits: &Limits,
    ) -> WireResult<NetworkGuid> {
        let mut frames: Vec<(NetworkGuid, ExportFlags, bool)> = Vec::new();
        let mut export = is_export;

        let last = loop {
            if frames.len() > limits.max_guid_depth {
                warn!(
                    "guid outer chain exceeds {} levels, reference left unresolved",
                    limits.max_guid_depth
                );
                break NetworkGuid::INVALID;
            }
            let guid = NetworkGuid::new(reader.read_packed_u32()?);
            if !guid.is_valid() {
                break guid;
            }
            let flags = if guid.is_default() || export {
                ExportFlags::from_raw(reader.read_u8()?)
            } else {
                ExportFlags::default()
            };
            if !flags.has_path() {
                break guid;
            }
            frames.push((guid, flags, export));
            // outers are always read in export context
            export = true;
        };

        let Some(&(root, ..)) = frames.first() else {
            return Ok(last);
        };
        while let Some((guid, flags, export)) = frames.pop() {
            let path = read_bounded_fstring(reader, limits)?;
            if flags.has_network_checksum() {
                reader.skip_bytes(4)?;
            }
            if export {
                self.record_path(guid, path);
            }
        }
        Ok(root)
    }

    pub(crate) fn record_path(&mut self, guid: NetworkGuid, path: String) {
        self.paths.insert(guid, path);
    }

    /// Path recorded for `guid`.
    #[must_use]
    pub fn path(&self, guid: NetworkGuid) -> Option<&str> {
        self.paths.get(&guid).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = (NetworkGuid, &str)> + '_ {
        self.paths.iter().map(|(guid, path)| (*guid, path.as_str()))
    }

    pub fn groups(&self) -> impl Iterator<Item = &NetFieldExportGroup> + '_ {
        self.groups.iter()
    }

    /// Number of export groups declared.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Looks up an export group by path: exact, then by clean name.
    #[must_use]
    pub fn group_by_path(&self, path: &str) -> Option<&NetFieldExportGroup> {
        self.find_by_path(path).map(|id| self.group(id))
    }

    pub(crate) fn group(&self, id: GroupId) -> &NetFieldExportGroup {
        &self.groups[id.0]
    }

    pub(crate) fn group_mut(&mut self, id: GroupId) -> &mut NetFieldExportGroup {
        &mut self.groups[id.0]
    }

    /// Adds a newly declared group and resolves its registered type.
    pub(crate) fn insert_group(
        &mut self,
        mut group: NetFieldExportGroup,
        registry: &ExportRegistry,
    ) -> GroupId {
        group.type_id = registry.resolve(&group.path_name);
        let id = GroupId(self.groups.len());
        self.by_path.insert(group.path_name.clone(), id);
        self.by_clean
            .entry(clean_path_name(&group.path_name).to_owned())
            .or_insert(id);
        self.groups.push(group);
        id
    }

    pub(crate) fn bind_path_index(&mut self, index: u32, id: GroupId) {
        self.by_index.insert(index, id);
    }

    pub(crate) fn group_by_index(&self, index: u32) -> Option<GroupId> {
        self.by_index.get(&index).copied()
    }

    pub(crate) fn find_by_path(&self, path: &str) -> Option<GroupId> {
        self.by_path
            .get(path)
            .or_else(|| self.by_clean.get(clean_path_name(path)))
            .copied()
    }

    /// Export group of the object `guid` refers to.
    pub(crate) fn group_for_guid(&self, guid: NetworkGuid) -> Option<GroupId> {
        self.find_by_path(self.path(guid)?)
    }

    /// RPC table group belonging to the class at `path`.
    pub(crate) fn class_net_cache_for(&self, path: &str) -> Option<GroupId> {
        let exact = format!("{path}{CLASS_NET_CACHE_SUFFIX}");
        if let Some(id) = self.by_path.get(&exact) {
            return Some(*id);
        }
        let clean = format!("{}{CLASS_NET_CACHE_SUFFIX}", clean_path_name(path));
        self.by_clean.get(&clean).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitstream::BitWriter;

    #[test]
    fn invalid_guid_reads_nothing_more() {
        let mut writer = BitWriter::new();
        writer.write_packed_u32(0);
        writer.write_u8(0xFF);
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let mut cache = GuidCache::new();
        let guid = cache
            .load_object(&mut reader, true, &Limits::for_testing())
            .unwrap();
        assert_eq!(guid, NetworkGuid::INVALID);
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn plain_reference_outside_export() {
        let mut writer = BitWriter::new();
        writer.write_packed_u32(12);
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let mut cache = GuidCache::new();
        let guid = cache
            .load_object(&mut reader, false, &Limits::for_testing())
            .unwrap();
        assert_eq!(guid, NetworkGuid::new(12));
        assert!(reader.is_at_end());
    }

    #[test]
    fn export_chain_records_every_path() {
        let mut writer = BitWriter::new();
        // object 8 with outer 5, outer 5 has no outer
        writer.write_packed_u32(8);
        writer.write_u8(ExportFlags::HAS_PATH | ExportFlags::HAS_NETWORK_CHECKSUM);
        writer.write_packed_u32(5);
        writer.write_u8(ExportFlags::HAS_PATH);
        writer.write_packed_u32(0);
        writer.write_fstring("/Game/Maps/Athena");
        writer.write_fstring("PersistentLevel.Actor_1");
        writer.write_u32(0xAABB_CCDD);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let mut cache = GuidCache::new();
        let guid = cache
            .load_object(&mut reader, true, &Limits::for_testing())
            .unwrap();
        assert_eq!(guid, NetworkGuid::new(8));
        assert_eq!(cache.path(NetworkGuid::new(5)), Some("/Game/Maps/Athena"));
        assert_eq!(
            cache.path(NetworkGuid::new(8)),
            Some("PersistentLevel.Actor_1")
        );
        assert!(reader.is_at_end());
    }

    #[test]
    fn default_guid_outside_export_records_outers_only() {
        let mut writer = BitWriter::new();
        writer.write_packed_u32(NetworkGuid::DEFAULT.raw());
        writer.write_u8(ExportFlags::HAS_PATH);
        // outer without a path of its own
        writer.write_packed_u32(7);
        writer.write_u8(0);
        writer.write_fstring("/Script/Engine.Default__Pawn");
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let mut cache = GuidCache::new();
        let guid = cache
            .load_object(&mut reader, false, &Limits::for_testing())
            .unwrap();
        assert_eq!(guid, NetworkGuid::DEFAULT);
        assert!(cache.path(NetworkGuid::DEFAULT).is_none());
        assert!(reader.is_at_end());
    }

    #[test]
    fn deep_chain_stops_at_limit() {
        let limits = Limits::for_testing();
        let mut writer = BitWriter::new();
        for guid in 0..=limits.max_guid_depth as u32 {
            writer.write_packed_u32(guid * 2 + 3);
            writer.write_u8(ExportFlags::HAS_PATH);
        }
        for _ in 0..=limits.max_guid_depth {
            writer.write_fstring("Outer");
        }
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        let mut cache = GuidCache::new();
        let guid = cache.load_object(&mut reader, true, &limits).unwrap();
        assert_eq!(guid, NetworkGuid::new(3));
        assert!(reader.is_at_end());
        assert_eq!(cache.paths().count(), limits.max_guid_depth + 1);
    }

    #[test]
    fn group_lookup() {
        let registry = ExportRegistry::diagnostic();
        let mut cache = GuidCache::new();
        let state = cache.insert_group(
            NetFieldExportGroup::new("/Game/Athena/Athena_GameState.Athena_GameState_C", 4, 2),
            &registry,
        );
        cache.bind_path_index(4, state);
        let rpc = cache.insert_group(
            NetFieldExportGroup::new(
                "/Game/Athena/Athena_GameState.Athena_GameState_C_ClassNetCache",
                9,
                1,
            ),
            &registry,
        );

        assert_eq!(cache.group_by_index(4), Some(state));
        assert_eq!(cache.group_by_index(9), None);
        assert_eq!(
            cache.find_by_path("/Other/Place.Athena_GameState_C"),
            Some(state)
        );
        assert_eq!(
            cache.class_net_cache_for("/Game/Athena/Athena_GameState.Athena_GameState_C"),
            Some(rpc)
        );
        assert_eq!(
            cache.class_net_cache_for("/Moved/Athena_GameState.Athena_GameState_C"),
            Some(rpc)
        );
        assert_eq!(cache.group_count(), 2);

        cache.record_path(
            NetworkGuid::new(6),
            "/Game/Athena/Athena_GameState.Default__Athena_GameState_C".to_owned(),
        );
        assert_eq!(cache.group_for_guid(NetworkGuid::new(6)), Some(state));
        assert_eq!(cache.group_for_guid(NetworkGuid::new(10)), None);
    }
}
