//! Export groups: the per-path field layouts declared inside a replay.

use bitstream::{BitReader, BitWriter};
use wire::{
    read_bounded_fstring, BoolEncoding, EngineNetworkVersion, Limits, ReplayVersions, StaticName,
    WireResult,
};

use crate::registry::ExportTypeId;

/// One declared field of an export group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetFieldExport {
    /// Zero-based handle; the wire carries `handle + 1`.
    pub handle: u32,
    pub name: String,
    pub compatible_checksum: u32,
    /// Declared type text, only present on old engine versions.
    pub type_name: Option<String>,
    /// Reads for an incompatible export are skipped, not failed.
    pub incompatible: bool,
}

impl NetFieldExport {
    /// Creates a compatible export.
    #[must_use]
    pub fn new(handle: u32, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Reads one field export record.
    ///
    /// Returns `None` when the record's leading flag says nothing is exported.
    pub fn read(
        reader: &mut BitReader<'_>,
        versions: &ReplayVersions,
        limits: &Limits,
        encoding: BoolEncoding,
    ) -> WireResult<Option<Self>> {
        if !encoding.read(reader)? {
            return Ok(None);
        }
        let handle = reader.read_packed_u32()?;
        let compatible_checksum = reader.read_u32()?;

        let (name, type_name) = if versions.engine < EngineNetworkVersion::NETEXPORT_SERIALIZATION {
            let name = read_bounded_fstring(reader, limits)?;
            let type_name = read_bounded_fstring(reader, limits)?;
            (name, Some(type_name))
        } else if versions.engine < EngineNetworkVersion::NETEXPORT_SERIALIZE_FIX {
            (read_bounded_fstring(reader, limits)?, None)
        } else {
            let name = StaticName::read(reader, versions, limits, encoding)?.resolve()?;
            (name, None)
        };

        Ok(Some(Self {
            handle,
            name,
            compatible_checksum,
            type_name,
            incompatible: false,
        }))
    }

    /// Writes a field export record in the layout [`NetFieldExport::read`]
    /// expects.
    pub fn write(&self, writer: &mut BitWriter, versions: &ReplayVersions, encoding: BoolEncoding) {
        encoding.write(writer, true);
        writer.write_packed_u32(self.handle);
        writer.write_u32(self.compatible_checksum);
        if versions.engine < EngineNetworkVersion::NETEXPORT_SERIALIZATION {
            writer.write_fstring(&self.name);
            writer.write_fstring(self.type_name.as_deref().unwrap_or_default());
        } else if versions.engine < EngineNetworkVersion::NETEXPORT_SERIALIZE_FIX {
            writer.write_fstring(&self.name);
        } else {
            StaticName::Inline {
                name: self.name.clone(),
                number: 0,
            }
            .write(writer, versions, encoding);
        }
    }
}

/// The declared field layout for one replicated class path, indexed by
/// handle.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetFieldExportGroup {
    pub path_name: String,
    pub path_name_index: u32,
    pub exports: Vec<Option<NetFieldExport>>,
    /// Registered type this group decodes into, resolved once at creation.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub type_id: Option<ExportTypeId>,
}

impl NetFieldExportGroup {
    /// Creates a group with `export_count` empty slots.
    #[must_use]
    pub fn new(path_name: impl Into<String>, path_name_index: u32, export_count: usize) -> Self {
        Self {
            path_name: path_name.into(),
            path_name_index,
            exports: vec![None; export_count],
            type_id: None,
        }
    }

    /// Number of handle slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Returns `true` if `handle` addresses a slot of this group.
    #[must_use]
    pub fn is_valid_index(&self, handle: u32) -> bool {
        (handle as usize) < self.exports.len()
    }

    /// Returns the export declared at `handle`, if any.
    #[must_use]
    pub fn export(&self, handle: u32) -> Option<&NetFieldExport> {
        self.exports.get(handle as usize).and_then(Option::as_ref)
    }

    /// Stores `export` at its handle. Returns `false` if the handle is out of
    /// range.
    pub fn set_export(&mut self, export: NetFieldExport) -> bool {
        match self.exports.get_mut(export.handle as usize) {
            Some(slot) => {
                *slot = Some(export);
                true
            }
            None => false,
        }
    }

    /// Names of every declared export.
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.exports.iter().flatten().map(|export| export.name.as_str())
    }

    /// Returns `true` if this is a class net cache (RPC table) group.
    #[must_use]
    pub fn is_class_net_cache(&self) -> bool {
        self.path_name.ends_with(CLASS_NET_CACHE_SUFFIX)
    }
}

/// Suffix the engine appends to a class path for its RPC table group.
pub const CLASS_NET_CACHE_SUFFIX: &str = "_ClassNetCache";
