//! Declared field wire types and their decoded values.

use bitstream::{BitBuffer, BitReader, BitWriter};
use wire::{
    read_bounded_fstring, read_static_name, BoolEncoding, Limits, NetworkGuid, ReplayVersions,
    WireResult,
};

/// The declared wire type of one replicated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepLayoutCmd {
    /// Single bit.
    Bool,
    /// Up to eight bits; narrower windows hold bitfield enums.
    Byte,
    Int,
    UInt32,
    UInt64,
    Float,
    String,
    /// Static or inline engine name.
    Name,
    /// Packed object reference.
    Object,
    /// Unique player id.
    NetId,
    /// Three raw floats.
    Vector,
    /// Packed vector, scale 10, 24 bits per component.
    Vector10,
    /// Packed vector, scale 100, 30 bits per component.
    Vector100,
    /// Packed vector, scale 1, 20 bits per component.
    VectorQ,
    /// Three fixed-compressed floats in `[-1, 1]`.
    VectorNormal,
    /// Compressed short rotator.
    Rotator,
    /// Every bit of the window as an unsigned integer.
    Enum,
    /// The raw window, kept for inspection.
    Debug,
    /// Skipped without interpretation.
    Ignore,
}

/// A plain 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Reads three raw floats.
    pub fn read(reader: &mut BitReader<'_>) -> WireResult<Self> {
        Ok(Self::new(reader.read_f32()?, reader.read_f32()?, reader.read_f32()?))
    }

    pub fn write(&self, writer: &mut BitWriter) {
        writer.write_f32(self.x);
        writer.write_f32(self.y);
        writer.write_f32(self.z);
    }
}

/// Rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// Reads a quantized vector: a component bit count bounded by `max_bits`,
/// then three biased serialized ints divided by `scale`.
pub fn read_packed_vector(
    reader: &mut BitReader<'_>,
    scale: u32,
    max_bits: u32,
) -> WireResult<Vector3> {
    let bits = reader.read_serialized_int(max_bits)?;
    let bias = 1i64 << (bits + 1);
    let max = 1u32 << (bits + 2);
    let mut component = || -> WireResult<f32> {
        let delta = i64::from(reader.read_serialized_int(max)?);
        Ok((delta - bias) as f32 / scale as f32)
    };
    Ok(Vector3::new(component()?, component()?, component()?))
}

/// Writes a vector in the layout [`read_packed_vector`] expects.
pub fn write_packed_vector(
    writer: &mut BitWriter,
    value: Vector3,
    scale: u32,
    max_bits: u32,
) -> WireResult<()> {
    let scaled = [value.x, value.y, value.z].map(|c| (c * scale as f32).round() as i64);
    let largest = scaled.iter().map(|c| c.unsigned_abs()).max().unwrap_or(0);
    let needed = u64::BITS - largest.leading_zeros();
    let bits = needed.clamp(1, max_bits) - 1;
    writer.write_serialized_int(bits, max_bits)?;
    let bias = 1i64 << (bits + 1);
    let max = 1u32 << (bits + 2);
    for component in scaled {
        let biased = u32::try_from(component + bias).unwrap_or(u32::MAX);
        writer.write_serialized_int(biased, max)?;
    }
    Ok(())
}

/// Reads a rotator whose components are each an optional `u16` fraction of a
/// full turn, absent components being zero.
pub fn read_rotation_short(reader: &mut BitReader<'_>) -> WireResult<Rotator> {
    let mut component = || -> WireResult<f32> {
        if reader.read_bit()? {
            Ok(f32::from(reader.read_u16()?) * 360.0 / 65536.0)
        } else {
            Ok(0.0)
        }
    };
    Ok(Rotator::new(component()?, component()?, component()?))
}

/// Writes a rotator in the layout [`read_rotation_short`] expects.
pub fn write_rotation_short(writer: &mut BitWriter, value: Rotator) {
    for degrees in [value.pitch, value.yaw, value.roll] {
        let short = (degrees.rem_euclid(360.0) * 65536.0 / 360.0).round() as u32 & 0xFFFF;
        writer.write_bit(short != 0);
        if short != 0 {
            writer.write_u16(short as u16);
        }
    }
}

/// Reads a float quantized to `num_bits` over `[-max_value, max_value]`.
pub fn read_fixed_compressed_float(
    reader: &mut BitReader<'_>,
    max_value: i32,
    num_bits: u32,
) -> WireResult<f32> {
    let max_bit_value = (1i64 << (num_bits - 1)) - 1;
    let bias = 1i64 << (num_bits - 1);
    let ser_int_max = 1u32 << num_bits;
    let delta = i64::from(reader.read_serialized_int(ser_int_max)?);
    let unscaled = (delta - bias) as f32;
    let max_value = i64::from(max_value);
    if max_value > max_bit_value {
        Ok(unscaled * (max_value as f32 / max_bit_value as f32))
    } else {
        Ok(unscaled / (max_bit_value as f32 / max_value as f32))
    }
}

/// Reads a unique player id.
///
/// The flags byte either marks an encoded id (hex of a size-prefixed byte
/// run, or empty) or carries a type hash; hash 31 is followed by the type
/// name before the id text.
fn read_net_id(reader: &mut BitReader<'_>, limits: &Limits) -> WireResult<String> {
    const IS_ENCODED: u8 = 1 << 0;
    const IS_EMPTY: u8 = 1 << 1;
    const OTHER_TYPE: u8 = 31;

    let flags = reader.read_u8()?;
    if flags & IS_ENCODED != 0 {
        if flags & IS_EMPTY != 0 {
            return Ok(String::new());
        }
        let size = reader.read_u8()?;
        let bytes = reader.read_bytes(usize::from(size))?;
        return Ok(bytes.iter().map(|b| format!("{b:02x}")).collect());
    }
    let type_hash = flags >> 3;
    if type_hash == 0 {
        return Ok(String::new());
    }
    if type_hash == OTHER_TYPE {
        read_bounded_fstring(reader, limits)?;
    }
    read_bounded_fstring(reader, limits)
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyValue {
    Bool(bool),
    Byte(u8),
    Int(i32),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    String(String),
    Name(String),
    Object(NetworkGuid),
    NetId(String),
    Vector(Vector3),
    Rotator(Rotator),
    Enum(u32),
    #[cfg_attr(feature = "serde", serde(skip))]
    Debug(BitBuffer),
}

impl PropertyValue {
    /// Decodes one field window as `cmd`.
    ///
    /// Returns `None` for [`RepLayoutCmd::Ignore`], leaving the window
    /// untouched. The caller decides what to do with unconsumed bits.
    pub fn read(
        cmd: RepLayoutCmd,
        reader: &mut BitReader<'_>,
        versions: &ReplayVersions,
        limits: &Limits,
    ) -> WireResult<Option<Self>> {
        let value = match cmd {
            RepLayoutCmd::Ignore => return Ok(None),
            RepLayoutCmd::Bool => Self::Bool(reader.read_bit()?),
            RepLayoutCmd::Byte => {
                let bits = reader.bits_remaining().min(8) as u8;
                Self::Byte(reader.read_bits(bits)? as u8)
            }
            RepLayoutCmd::Int => Self::Int(reader.read_i32()?),
            RepLayoutCmd::UInt32 => Self::UInt32(reader.read_u32()?),
            RepLayoutCmd::UInt64 => Self::UInt64(reader.read_u64()?),
            RepLayoutCmd::Float => Self::Float(reader.read_f32()?),
            RepLayoutCmd::String => Self::String(read_bounded_fstring(reader, limits)?),
            RepLayoutCmd::Name => {
                Self::Name(read_static_name(reader, versions, limits, BoolEncoding::Bit)?)
            }
            RepLayoutCmd::Object => Self::Object(NetworkGuid::new(reader.read_packed_u32()?)),
            RepLayoutCmd::NetId => Self::NetId(read_net_id(reader, limits)?),
            RepLayoutCmd::Vector => Self::Vector(Vector3::read(reader)?),
            RepLayoutCmd::Vector10 => Self::Vector(read_packed_vector(reader, 10, 24)?),
            RepLayoutCmd::Vector100 => Self::Vector(read_packed_vector(reader, 100, 30)?),
            RepLayoutCmd::VectorQ => Self::Vector(read_packed_vector(reader, 1, 20)?),
            RepLayoutCmd::VectorNormal => Self::Vector(Vector3::new(
                read_fixed_compressed_float(reader, 1, 16)?,
                read_fixed_compressed_float(reader, 1, 16)?,
                read_fixed_compressed_float(reader, 1, 16)?,
            )),
            RepLayoutCmd::Rotator => Self::Rotator(read_rotation_short(reader)?),
            RepLayoutCmd::Enum => {
                let bits = reader.bits_remaining().min(32) as u8;
                Self::Enum(reader.read_bits(bits)? as u32)
            }
            RepLayoutCmd::Debug => {
                let bits = reader.bits_remaining();
                Self::Debug(BitBuffer::read_from(reader, bits)?)
            }
        };
        Ok(Some(value))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Unsigned view of any unsigned integral value.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Byte(value) => Some(u64::from(*value)),
            Self::UInt32(value) | Self::Enum(value) => Some(u64::from(*value)),
            Self::UInt64(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Text of a string, name or net id value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::Name(value) | Self::NetId(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_guid(&self) -> Option<NetworkGuid> {
        match self {
            Self::Object(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vector(&self) -> Option<Vector3> {
        match self {
            Self::Vector(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_rotator(&self) -> Option<Rotator> {
        match self {
            Self::Rotator(value) => Some(*value),
            _ => None,
        }
    }
}
