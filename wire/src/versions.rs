//! Protocol version histories and replay header flags.

use crate::error::{VersionKind, WireError, WireResult};

/// Engine network protocol version.
///
/// Ordered so that feature gates read as `version >= EngineNetworkVersion::X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineNetworkVersion(u32);

impl EngineNetworkVersion {
    pub const INITIAL: Self = Self(1);
    pub const REPLAY_BACKWARDS_COMPAT: Self = Self(2);
    pub const MAX_ACTOR_CHANNELS_CUSTOMIZATION: Self = Self(3);
    pub const REPCMD_CHECKSUM_REMOVE_PRINTF: Self = Self(4);
    pub const NEW_ACTOR_OVERRIDE_LEVEL: Self = Self(5);
    pub const CHANNEL_NAMES: Self = Self(6);
    pub const CHANNEL_CLOSE_REASON: Self = Self(7);
    pub const ACKS_INCLUDED_IN_HEADER: Self = Self(8);
    pub const NETEXPORT_SERIALIZATION: Self = Self(9);
    pub const NETEXPORT_SERIALIZE_FIX: Self = Self(10);
    pub const FAST_ARRAY_DELTA_STRUCT: Self = Self(11);
    pub const FIX_ENUM_SERIALIZATION: Self = Self(12);
    pub const OPTIONALLY_QUANTIZE_SPAWN_INFO: Self = Self(13);
    pub const JITTER_IN_HEADER: Self = Self(14);
    pub const CLASSNETCACHE_FULLNAME: Self = Self(15);
    pub const REPLAY_DORMANCY: Self = Self(16);
    pub const ENUM_SERIALIZATION_COMPAT: Self = Self(17);
    pub const SUBOBJECT_OUTER_CHAIN: Self = Self(18);

    /// Newest version this crate understands.
    pub const LATEST: Self = Self::SUBOBJECT_OUTER_CHAIN;

    /// Creates a version from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Replay (demo) network version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkVersion(u32);

impl NetworkVersion {
    pub const REPLAY_INITIAL: Self = Self(1);
    pub const SAVE_ABS_TIME_MS: Self = Self(2);
    pub const INCREASE_BUFFER: Self = Self(3);
    pub const SAVE_ENGINE_VERSION: Self = Self(4);
    pub const EXTRA_VERSION: Self = Self(5);
    pub const MULTIPLE_LEVELS: Self = Self(6);
    pub const MULTIPLE_LEVELS_TIME_CHANGES: Self = Self(7);
    pub const DELETED_STARTUP_ACTORS: Self = Self(8);
    pub const HEADER_FLAGS: Self = Self(9);
    pub const LEVEL_STREAMING_FIXES: Self = Self(10);
    pub const SAVE_FULL_ENGINE_VERSION: Self = Self(11);
    pub const HEADER_GUID: Self = Self(12);
    pub const CHARACTER_MOVEMENT: Self = Self(13);
    pub const CHARACTER_MOVEMENT_NOINTERP: Self = Self(14);
    pub const GUID_NAMETABLE: Self = Self(15);
    pub const GUIDCACHE_CHECKSUMS: Self = Self(16);
    pub const SAVE_PACKAGE_VERSION_UE: Self = Self(17);
    pub const RECORDING_METADATA: Self = Self(18);

    /// Newest version this crate understands.
    pub const LATEST: Self = Self::RECORDING_METADATA;

    /// Creates a version from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Replay header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplayHeaderFlags(u32);

impl ReplayHeaderFlags {
    pub const CLIENT_RECORDED: u32 = 1 << 0;
    pub const HAS_STREAMING_FIXES: u32 = 1 << 1;
    pub const DELTA_CHECKPOINTS: u32 = 1 << 2;
    pub const GAME_SPECIFIC_FRAME_DATA: u32 = 1 << 3;
    pub const REPLAY_CONNECTION: u32 = 1 << 4;

    /// Creates flags from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `flag` is set.
    #[must_use]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// Returns these flags with `flag` added.
    #[must_use]
    pub const fn with(self, flag: u32) -> Self {
        Self(self.0 | flag)
    }

    #[must_use]
    pub const fn has_streaming_fixes(self) -> bool {
        self.contains(Self::HAS_STREAMING_FIXES)
    }

    #[must_use]
    pub const fn has_game_specific_frame_data(self) -> bool {
        self.contains(Self::GAME_SPECIFIC_FRAME_DATA)
    }

    #[must_use]
    pub const fn has_delta_checkpoints(self) -> bool {
        self.contains(Self::DELTA_CHECKPOINTS)
    }
}

/// The versions and flags that gate every version-dependent read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplayVersions {
    pub network: NetworkVersion,
    pub engine: EngineNetworkVersion,
    pub flags: ReplayHeaderFlags,
}

impl Default for ReplayVersions {
    fn default() -> Self {
        Self::latest()
    }
}

impl ReplayVersions {
    /// Creates a version bundle.
    #[must_use]
    pub const fn new(
        network: NetworkVersion,
        engine: EngineNetworkVersion,
        flags: ReplayHeaderFlags,
    ) -> Self {
        Self {
            network,
            engine,
            flags,
        }
    }

    /// Newest known versions with level streaming fixes enabled.
    #[must_use]
    pub const fn latest() -> Self {
        Self::new(
            NetworkVersion::LATEST,
            EngineNetworkVersion::LATEST,
            ReplayHeaderFlags::from_raw(ReplayHeaderFlags::HAS_STREAMING_FIXES),
        )
    }

    /// Refuses streams this crate cannot parse.
    ///
    /// Network versions up to and including `EXTRA_VERSION` predate the frame
    /// layout decoded here; versions newer than the latest known history are
    /// never guessed at.
    pub fn validate(&self) -> WireResult<()> {
        if self.network <= NetworkVersion::EXTRA_VERSION || self.network > NetworkVersion::LATEST
        {
            return Err(WireError::UnsupportedVersion {
                kind: VersionKind::Network,
                found: self.network.raw(),
            });
        }
        if self.engine < EngineNetworkVersion::INITIAL || self.engine > EngineNetworkVersion::LATEST
        {
            return Err(WireError::UnsupportedVersion {
                kind: VersionKind::Engine,
                found: self.engine.raw(),
            });
        }
        Ok(())
    }

    /// Returns `true` if the engine version is at least `version`.
    #[must_use]
    pub fn engine_at_least(&self, version: EngineNetworkVersion) -> bool {
        self.engine >= version
    }

    /// Returns `true` if the network version is at least `version`.
    #[must_use]
    pub fn network_at_least(&self, version: NetworkVersion) -> bool {
        self.network >= version
    }

    #[must_use]
    pub const fn has_streaming_fixes(&self) -> bool {
        self.flags.has_streaming_fixes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ordered() {
        assert!(EngineNetworkVersion::CHANNEL_NAMES < EngineNetworkVersion::CHANNEL_CLOSE_REASON);
        assert!(NetworkVersion::MULTIPLE_LEVELS > NetworkVersion::EXTRA_VERSION);
        assert_eq!(EngineNetworkVersion::LATEST.raw(), 18);
        assert_eq!(NetworkVersion::LATEST.raw(), 18);
    }

    #[test]
    fn latest_validates() {
        assert!(ReplayVersions::latest().validate().is_ok());
    }

    #[test]
    fn old_network_version_refused() {
        let versions = ReplayVersions::new(
            NetworkVersion::EXTRA_VERSION,
            EngineNetworkVersion::LATEST,
            ReplayHeaderFlags::default(),
        );
        assert!(matches!(
            versions.validate(),
            Err(WireError::UnsupportedVersion {
                kind: VersionKind::Network,
                found: 5
            })
        ));
    }

    #[test]
    fn newer_engine_version_refused() {
        let versions = ReplayVersions::new(
            NetworkVersion::LATEST,
            EngineNetworkVersion::new(19),
            ReplayHeaderFlags::default(),
        );
        assert!(matches!(
            versions.validate(),
            Err(WireError::UnsupportedVersion {
                kind: VersionKind::Engine,
                found: 19
            })
        ));
    }

    #[test]
    fn header_flags() {
        let flags = ReplayHeaderFlags::default()
            .with(ReplayHeaderFlags::HAS_STREAMING_FIXES)
            .with(ReplayHeaderFlags::GAME_SPECIFIC_FRAME_DATA);
        assert!(flags.has_streaming_fixes());
        assert!(flags.has_game_specific_frame_data());
        assert!(!flags.has_delta_checkpoints());
        assert_eq!(flags.raw(), 0b1010);
    }

    #[test]
    fn engine_gates() {
        let versions = ReplayVersions::latest();
        assert!(versions.engine_at_least(EngineNetworkVersion::SUBOBJECT_OUTER_CHAIN));
        assert!(versions.network_at_least(NetworkVersion::LEVEL_STREAMING_FIXES));
        assert!(versions.has_streaming_fixes());
    }
}
