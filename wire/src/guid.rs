//! Network object references.

/// A transient identifier standing in for a replicated object reference.
///
/// `0` is invalid, `1` is the default guid that always carries inline
/// export flags, odd values are static (resolvable to a stable path) and
/// even non-zero values are dynamic (spawned at runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkGuid(u32);

impl NetworkGuid {
    /// The invalid guid.
    pub const INVALID: Self = Self(0);

    /// The default guid.
    pub const DEFAULT: Self = Self(1);

    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_static(self) -> bool {
        self.0 & 1 == 1
    }

    #[must_use]
    pub const fn is_dynamic(self) -> bool {
        self.0 > 0 && self.0 & 1 == 0
    }

    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == 1
    }
}

impl From<u32> for NetworkGuid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<NetworkGuid> for u32 {
    fn from(value: NetworkGuid) -> Self {
        value.0
    }
}

/// Flags byte that follows a guid in export context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExportFlags(u8);

impl ExportFlags {
    pub const HAS_PATH: u8 = 1 << 0;
    pub const NO_LOAD: u8 = 1 << 1;
    pub const HAS_NETWORK_CHECKSUM: u8 = 1 << 2;

    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn has_path(self) -> bool {
        self.0 & Self::HAS_PATH != 0
    }

    #[must_use]
    pub const fn no_load(self) -> bool {
        self.0 & Self::NO_LOAD != 0
    }

    #[must_use]
    pub const fn has_network_checksum(self) -> bool {
        self.0 & Self::HAS_NETWORK_CHECKSUM != 0
    }
}
