//! Bit-level writer for encoding engine-packed binary data.

use crate::error::{BitError, BitResult};
use crate::reader::BitReader;

/// A bit-level writer producing the layout [`BitReader`] consumes.
///
/// Bits are appended least-significant first within each byte. The writer is
/// used to accumulate partial bunches and to build streams in tests.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub const fn bits_written(&self) -> usize {
        self.bit_len
    }

    /// Returns `true` if the next write starts on a byte boundary.
    #[must_use]
    pub const fn is_byte_aligned(&self) -> bool {
        self.bit_len % 8 == 0
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, value: bool) {
        let shift = self.bit_len & 7;
        if shift == 0 {
            self.bytes.push(0);
        }
        if value {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 1 << shift;
            }
        }
        self.bit_len += 1;
    }

    /// Writes the low `bits` bits of `value`, least-significant first.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 64`.
    /// Returns [`BitError::ValueOutOfRange`] if `value` doesn't fit in `bits`.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 64,
            });
        }
        if bits < 64 && value >> bits != 0 {
            return Err(BitError::ValueOutOfRange {
                value,
                bits: bits as usize,
            });
        }
        for shift in 0..bits {
            self.write_bit((value >> shift) & 1 == 1);
        }
        Ok(())
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, value: u8) {
        let shift = self.bit_len & 7;
        if shift == 0 {
            self.bytes.push(value);
        } else if let Some(last) = self.bytes.last_mut() {
            *last |= value << shift;
            self.bytes.push(value >> (8 - shift));
        }
        self.bit_len += 8;
    }

    /// Writes a byte slice.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.is_byte_aligned() {
            self.bytes.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for &byte in bytes {
                self.write_u8(byte);
            }
        }
    }

    /// Writes a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a little-endian `i16`.
    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a little-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a little-endian `i64`.
    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a little-endian IEEE-754 `f32`.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes a packed unsigned integer (see [`BitReader::read_packed_u32`]).
    pub fn write_packed_u32(&mut self, mut value: u32) {
        loop {
            let low = (value & 0x7F) as u8;
            value >>= 7;
            let more = value != 0;
            self.write_u8((low << 1) | u8::from(more));
            if !more {
                break;
            }
        }
    }

    /// Writes `value` bounded by the exclusive `max`
    /// (see [`BitReader::read_serialized_int`]).
    ///
    /// # Errors
    ///
    /// Returns [`BitError::ValueOutOfRange`] if `value` is not representable
    /// below `max`.
    pub fn write_serialized_int(&mut self, value: u32, max: u32) -> BitResult<()> {
        if value >= max.max(1) {
            return Err(BitError::ValueOutOfRange {
                value: u64::from(value),
                bits: (u32::BITS - max.leading_zeros()) as usize,
            });
        }
        let max = u64::from(max);
        let value = u64::from(value);
        let mut written = 0u64;
        let mut mask = 1u64;
        while written + mask < max {
            let bit = value & mask != 0;
            self.write_bit(bit);
            if bit {
                written |= mask;
            }
            mask <<= 1;
        }
        Ok(())
    }

    /// Writes a length-prefixed engine string.
    ///
    /// Strings made only of 8-bit characters use the narrow form, anything
    /// else the UTF-16 form. A trailing NUL is appended in both cases.
    pub fn write_fstring(&mut self, value: &str) {
        if value.is_empty() {
            self.write_i32(0);
            return;
        }
        let narrow: Option<Vec<u8>> = value.chars().map(|c| u8::try_from(c).ok()).collect();
        match narrow {
            Some(bytes) => {
                self.write_i32(i32::try_from(bytes.len() + 1).unwrap_or(i32::MAX));
                self.write_bytes(&bytes);
                self.write_u8(0);
            }
            None => {
                let units: Vec<u16> = value.encode_utf16().collect();
                self.write_i32(-i32::try_from(units.len() + 1).unwrap_or(i32::MAX));
                for unit in units {
                    self.write_u16(unit);
                }
                self.write_u16(0);
            }
        }
    }

    /// Copies the next `bits` bits of `reader` onto the end of this writer.
    pub fn append_from(&mut self, reader: &mut BitReader<'_>, bits: usize) -> BitResult<()> {
        if bits > reader.bits_remaining() {
            return Err(BitError::UnexpectedEof {
                requested: bits,
                available: reader.bits_remaining(),
            });
        }
        let mut left = bits;
        while left >= 8 {
            self.write_u8(reader.read_u8()?);
            left -= 8;
        }
        while left > 0 {
            self.write_bit(reader.read_bit()?);
            left -= 1;
        }
        Ok(())
    }

    /// Appends every bit of `buffer`.
    pub fn append_buffer(&mut self, buffer: &BitBuffer) -> BitResult<()> {
        let mut reader = buffer.reader();
        self.append_from(&mut reader, buffer.bit_len())
    }

    /// Finishes writing and returns the byte buffer, zero-padded to a byte.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    /// Finishes writing and keeps the exact bit length.
    #[must_use]
    pub fn into_buffer(self) -> BitBuffer {
        BitBuffer {
            bytes: self.bytes,
            bit_len: self.bit_len,
        }
    }
}

/// An owned run of bits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitBuffer {
    /// Wraps whole bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bit_len = bytes.len() * 8;
        Self { bytes, bit_len }
    }

    /// Wraps the first `bit_len` bits of `bytes`.
    pub fn from_bits(bytes: Vec<u8>, bit_len: usize) -> BitResult<Self> {
        if bit_len > bytes.len() * 8 {
            return Err(BitError::BitLengthOutOfRange {
                bit_len,
                bytes: bytes.len(),
            });
        }
        Ok(Self { bytes, bit_len })
    }

    /// Copies the next `bits` bits out of `reader`.
    pub fn read_from(reader: &mut BitReader<'_>, bits: usize) -> BitResult<Self> {
        let mut writer = BitWriter::with_capacity(bits.div_ceil(8));
        writer.append_from(reader, bits)?;
        Ok(writer.into_buffer())
    }

    /// Returns the number of meaningful bits.
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns `true` if the buffer holds no bits.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Returns the backing bytes; bits past `bit_len` are zero.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a reader over exactly `bit_len` bits.
    #[must_use]
    pub fn reader(&self) -> BitReader<'_> {
        BitReader::new(&self.bytes).truncated(self.bit_len)
    }
}
