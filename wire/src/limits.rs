//! Configurable limits for bounded decoding.

/// Wire-level limits for replay decoding.
///
/// These limits are enforced during decoding so a corrupt capture cannot
/// drive unbounded allocation or table growth.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum packet size in bytes. Also bounds the bunch payload bit count.
    pub max_packet_bytes: usize,

    /// Number of channel slots; channel indices must be below this.
    pub max_channels: usize,

    /// Maximum number of guid exports in one bunch.
    pub max_guids_per_bunch: usize,

    /// Maximum outer-chain depth when resolving a guid reference.
    pub max_guid_depth: usize,

    /// Maximum length in bytes of a path or name string.
    pub max_string_bytes: usize,

    /// Maximum number of field exports declared for one export group.
    pub max_group_exports: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // Engine demo driver cap
            max_packet_bytes: 2048,
            max_channels: 32_767,
            max_guids_per_bunch: 2048,
            max_guid_depth: 16,
            max_string_bytes: 64 * 1024,
            max_group_exports: 16 * 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_packet_bytes: 2048,
            max_channels: 64,
            max_guids_per_bunch: 32,
            max_guid_depth: 4,
            max_string_bytes: 256,
            max_group_exports: 64,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_packet_bytes: usize::MAX,
            max_channels: usize::MAX,
            max_guids_per_bunch: usize::MAX,
            max_guid_depth: usize::MAX,
            max_string_bytes: usize::MAX,
            max_group_exports: usize::MAX,
        }
    }

    /// Exclusive upper bound for a bunch payload bit count.
    #[must_use]
    pub const fn max_bunch_bits(&self) -> u32 {
        let bits = self.max_packet_bytes.saturating_mul(8);
        if bits > u32::MAX as usize {
            u32::MAX
        } else {
            bits as u32
        }
    }
}
