//! Engine static names and channel identity.

use bitstream::{BitReader, BitWriter};

use crate::error::{LimitKind, WireError, WireResult};
use crate::limits::Limits;
use crate::versions::{EngineNetworkVersion, ReplayVersions};

/// How a boolean flag is stored by the archive being read.
///
/// Bunch payloads store flags as single bits; frame-level byte archives
/// spend a whole byte on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolEncoding {
    Bit,
    Byte,
}

impl BoolEncoding {
    /// Reads one flag.
    pub fn read(self, reader: &mut BitReader<'_>) -> WireResult<bool> {
        Ok(match self {
            Self::Bit => reader.read_bit()?,
            Self::Byte => reader.read_u8()? != 0,
        })
    }

    /// Writes one flag.
    pub fn write(self, writer: &mut BitWriter, value: bool) {
        match self {
            Self::Bit => writer.write_bit(value),
            Self::Byte => writer.write_u8(u8::from(value)),
        }
    }
}

/// Kind of traffic a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelType {
    #[default]
    None,
    Control,
    Actor,
    File,
    Voice,
}

impl ChannelType {
    /// Exclusive bound of the serialized channel type on old engine versions.
    pub const MAX: u32 = 8;

    /// Maps a raw serialized value; unknown values become `None`.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Control,
            2 => Self::Actor,
            3 => Self::File,
            4 => Self::Voice,
            _ => Self::None,
        }
    }

    /// Returns the raw serialized value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Control => 1,
            Self::Actor => 2,
            Self::File => 3,
            Self::Voice => 4,
        }
    }

    /// Maps a channel name to its type.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            CONTROL_NAME => Self::Control,
            VOICE_NAME => Self::Voice,
            ACTOR_NAME => Self::Actor,
            _ => Self::None,
        }
    }

    /// Returns the engine name used for this channel type, if it has one.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::Control => Some(CONTROL_NAME),
            Self::Voice => Some(VOICE_NAME),
            Self::Actor => Some(ACTOR_NAME),
            Self::None | Self::File => None,
        }
    }

    /// Hardcoded name index for this channel type, if it has one.
    #[must_use]
    pub const fn hardcoded_index(self) -> Option<u32> {
        match self {
            Self::Control => Some(NAME_CONTROL),
            Self::Voice => Some(NAME_VOICE),
            Self::Actor => Some(NAME_ACTOR),
            Self::None | Self::File => None,
        }
    }
}

/// Why a channel was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelCloseReason {
    #[default]
    Destroyed,
    Dormancy,
    LevelUnloaded,
    Relevancy,
    TearOff,
    /// A reason value newer than this crate knows about.
    Other(u32),
}

impl ChannelCloseReason {
    /// Exclusive bound of the serialized close reason.
    pub const MAX: u32 = 15;

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Destroyed,
            1 => Self::Dormancy,
            2 => Self::LevelUnloaded,
            3 => Self::Relevancy,
            4 => Self::TearOff,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Destroyed => 0,
            Self::Dormancy => 1,
            Self::LevelUnloaded => 2,
            Self::Relevancy => 3,
            Self::TearOff => 4,
            Self::Other(raw) => raw,
        }
    }
}

const CONTROL_NAME: &str = "Control";
const VOICE_NAME: &str = "Voice";
const ACTOR_NAME: &str = "Actor";

pub const NAME_ACTOR: u32 = 102;
pub const NAME_CONTROL: u32 = 255;
pub const NAME_VOICE: u32 = 256;

/// Looks up an engine hardcoded name by index.
#[must_use]
pub const fn static_name(index: u32) -> Option<&'static str> {
    let name = match index {
        0 => "None",
        1 => "ByteProperty",
        2 => "IntProperty",
        3 => "BoolProperty",
        4 => "FloatProperty",
        5 => "ObjectProperty",
        6 => "NameProperty",
        7 => "DelegateProperty",
        8 => "DoubleProperty",
        9 => "ArrayProperty",
        10 => "StructProperty",
        11 => "VectorProperty",
        12 => "RotatorProperty",
        13 => "StrProperty",
        14 => "TextProperty",
        15 => "InterfaceProperty",
        16 => "MulticastDelegateProperty",
        18 => "LazyObjectProperty",
        19 => "SoftObjectProperty",
        20 => "UInt64Property",
        21 => "UInt32Property",
        22 => "UInt16Property",
        23 => "Int64Property",
        25 => "Int16Property",
        26 => "Int8Property",
        27 => "MapProperty",
        28 => "SetProperty",
        30 => "Core",
        31 => "Engine",
        32 => "Editor",
        33 => "CoreUObject",
        34 => "EnumProperty",
        50 => "Cylinder",
        51 => "BoxSphereBounds",
        52 => "Sphere",
        53 => "Box",
        54 => "Vector2D",
        55 => "IntRect",
        56 => "IntPoint",
        57 => "Vector4",
        58 => "Name",
        59 => "Vector",
        60 => "Rotator",
        61 => "SHVector",
        62 => "Color",
        63 => "Plane",
        64 => "Matrix",
        65 => "LinearColor",
        66 => "AdvanceFrame",
        67 => "Pointer",
        68 => "Double",
        69 => "Quat",
        70 => "Self",
        71 => "Transform",
        100 => "Object",
        101 => "Camera",
        NAME_ACTOR => ACTOR_NAME,
        103 => "ObjectRedirector",
        104 => "ObjectArchetype",
        105 => "Class",
        106 => "ScriptStruct",
        107 => "Function",
        200 => "State",
        201 => "TRUE",
        202 => "FALSE",
        203 => "Enum",
        204 => "Default",
        205 => "Skip",
        206 => "Input",
        207 => "Package",
        208 => "Groups",
        209 => "Interface",
        210 => "Components",
        211 => "Global",
        212 => "Super",
        213 => "Outer",
        214 => "Map",
        215 => "Role",
        216 => "RemoteRole",
        217 => "PersistentLevel",
        218 => "TheWorld",
        219 => "PackageMetaData",
        220 => "InitialState",
        221 => "Game",
        222 => "SelectionColor",
        223 => "UI",
        224 => "ExecuteUbergraph",
        225 => "DeviceID",
        226 => "RootStat",
        227 => "MoveActor",
        230 => "All",
        231 => "MeshEmitterVertexColor",
        232 => "TextureOffsetParameter",
        233 => "TextureScaleParameter",
        234 => "ImpactVel",
        235 => "SlideVel",
        236 => "TextureOffset1Parameter",
        237 => "MeshEmitterDynamicParameter",
        238 => "ExpressionInput",
        239 => "Untitled",
        240 => "Timer",
        241 => "Team",
        242 => "Low",
        243 => "High",
        244 => "NetworkGUID",
        245 => "GameThread",
        246 => "RenderThread",
        247 => "OtherChildren",
        248 => "Location",
        249 => "Rotation",
        250 => "BSP",
        251 => "EditorSettings",
        252 => "AudioThread",
        253 => "ID",
        254 => "UserDefinedEnum",
        NAME_CONTROL => CONTROL_NAME,
        NAME_VOICE => VOICE_NAME,
        257 => "Zlib",
        258 => "Gzip",
        259 => "LZ4",
        260 => "Mobile",
        261 => "Oodle",
        280 => "DGram",
        281 => "Stream",
        282 => "GameNetDriver",
        283 => "PendingNetDriver",
        284 => "BeaconNetDriver",
        285 => "FlushNetDormancy",
        286 => "DemoNetDriver",
        287 => "GameSession",
        288 => "PartySession",
        289 => "GamePort",
        290 => "BeaconPort",
        291 => "MeshPort",
        292 => "MeshNetDriver",
        293 => "LiveStreamAnimation",
        300 => "Linear",
        301 => "Point",
        302 => "Aniso",
        303 => "LightMapResolution",
        311 => "UnGrouped",
        312 => "VoiceChat",
        320 => "Playing",
        322 => "Spectating",
        325 => "Inactive",
        350 => "PerfWarning",
        351 => "Info",
        352 => "Init",
        353 => "Exit",
        354 => "Cmd",
        355 => "Warning",
        356 => "Error",
        _ => return None,
    };
    Some(name)
}

/// A name as it appears on the wire: a hardcoded index or an inline string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticName {
    Hardcoded(u32),
    Inline { name: String, number: i32 },
}

impl StaticName {
    /// Reads a name.
    ///
    /// The hardcoded index is a raw `u32` before channel names were
    /// introduced and packed afterwards. An inline name is followed by a
    /// 4-byte instance number.
    pub fn read(
        reader: &mut BitReader<'_>,
        versions: &ReplayVersions,
        limits: &Limits,
        encoding: BoolEncoding,
    ) -> WireResult<Self> {
        if encoding.read(reader)? {
            let index = if versions.engine < EngineNetworkVersion::CHANNEL_NAMES {
                reader.read_u32()?
            } else {
                reader.read_packed_u32()?
            };
            return Ok(Self::Hardcoded(index));
        }
        let name = read_bounded_fstring(reader, limits)?;
        let number = reader.read_i32()?;
        Ok(Self::Inline { name, number })
    }

    /// Writes a name in the layout [`StaticName::read`] expects.
    pub fn write(&self, writer: &mut BitWriter, versions: &ReplayVersions, encoding: BoolEncoding) {
        match self {
            Self::Hardcoded(index) => {
                encoding.write(writer, true);
                if versions.engine < EngineNetworkVersion::CHANNEL_NAMES {
                    writer.write_u32(*index);
                } else {
                    writer.write_packed_u32(*index);
                }
            }
            Self::Inline { name, number } => {
                encoding.write(writer, false);
                writer.write_fstring(name);
                writer.write_i32(*number);
            }
        }
    }

    /// Resolves the name to text.
    pub fn resolve(self) -> WireResult<String> {
        match self {
            Self::Hardcoded(index) => static_name(index)
                .map(str::to_owned)
                .ok_or(WireError::UnknownStaticName { index }),
            Self::Inline { name, .. } => Ok(name),
        }
    }
}

/// Reads a static name and resolves it to text.
pub fn read_static_name(
    reader: &mut BitReader<'_>,
    versions: &ReplayVersions,
    limits: &Limits,
    encoding: BoolEncoding,
) -> WireResult<String> {
    StaticName::read(reader, versions, limits, encoding)?.resolve()
}

/// Reads an engine string and enforces `max_string_bytes`.
pub fn read_bounded_fstring(reader: &mut BitReader<'_>, limits: &Limits) -> WireResult<String> {
    let value = reader.read_fstring()?;
    if value.len() > limits.max_string_bytes {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::StringBytes,
            limit: limits.max_string_bytes,
            actual: value.len(),
        });
    }
    Ok(value)
}
