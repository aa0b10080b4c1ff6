//! Bit-level reader with bounded operations.

use std::ops::{Deref, DerefMut};

use crate::error::{BitError, BitResult};

/// Largest number of bytes a packed `u32` may occupy.
const MAX_PACKED_BYTES: u32 = 5;

/// A bit-level reader for decoding engine-packed binary data.
///
/// Bits are consumed least-significant first within each byte and multi-byte
/// integers are little-endian. The readable range is `[position, limit)`;
/// [`BitReader::window`] narrows the limit for the lifetime of a guard.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
    bit_end: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` over every bit of a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_pos: 0,
            bit_end: data.len() * 8,
        }
    }

    /// Creates a reader over the first `bit_len` bits of `data`.
    pub const fn with_bit_len(data: &'a [u8], bit_len: usize) -> BitResult<Self> {
        if bit_len > data.len() * 8 {
            return Err(BitError::BitLengthOutOfRange {
                bit_len,
                bytes: data.len(),
            });
        }
        Ok(Self {
            data,
            bit_pos: 0,
            bit_end: bit_len,
        })
    }

    /// Caps the limit at `bit_len`; callers guarantee it fits in `data`.
    pub(crate) const fn truncated(mut self, bit_len: usize) -> Self {
        if bit_len < self.bit_end {
            self.bit_end = bit_len;
        }
        self
    }

    /// Returns the number of bits remaining before the current limit.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.bit_end.saturating_sub(self.bit_pos)
    }

    /// Returns `true` if the reader has reached its current limit.
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.bit_pos >= self.bit_end
    }

    /// Returns the current bit position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.bit_pos
    }

    /// Returns the current read limit in bits.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.bit_end
    }

    /// Returns `true` if the position sits on a byte boundary.
    #[must_use]
    pub const fn is_byte_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    fn ensure_bits(&self, requested: usize) -> BitResult<()> {
        let available = self.bits_remaining();
        if requested > available {
            return Err(BitError::UnexpectedEof {
                requested,
                available,
            });
        }
        Ok(())
    }

    #[inline]
    fn bit_at(&self, pos: usize) -> bool {
        (self.data[pos >> 3] >> (pos & 7)) & 1 == 1
    }

    /// Reads a single bit.
    pub fn read_bit(&mut self) -> BitResult<bool> {
        self.ensure_bits(1)?;
        let bit = self.bit_at(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Returns the next bit without consuming it.
    pub fn peek_bit(&self) -> BitResult<bool> {
        self.ensure_bits(1)?;
        Ok(self.bit_at(self.bit_pos))
    }

    /// Reads up to 64 bits as an unsigned integer, least-significant bit first.
    pub fn read_bits(&mut self, bits: u8) -> BitResult<u64> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 64,
            });
        }
        self.ensure_bits(bits as usize)?;

        let mut value = 0u64;
        for shift in 0..bits {
            if self.bit_at(self.bit_pos) {
                value |= 1 << shift;
            }
            self.bit_pos += 1;
        }
        Ok(value)
    }

    /// Reads one byte, taking the aligned fast path where possible.
    pub fn read_u8(&mut self) -> BitResult<u8> {
        self.ensure_bits(8)?;
        let shift = self.bit_pos & 7;
        let idx = self.bit_pos >> 3;
        let byte = if shift == 0 {
            self.data[idx]
        } else {
            (self.data[idx] >> shift) | (self.data[idx + 1] << (8 - shift))
        };
        self.bit_pos += 8;
        Ok(byte)
    }

    fn read_array<const N: usize>(&mut self) -> BitResult<[u8; N]> {
        self.ensure_bits(N * 8)?;
        let mut out = [0u8; N];
        for byte in &mut out {
            *byte = self.read_u8()?;
        }
        Ok(out)
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self) -> BitResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> BitResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> BitResult<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a little-endian `i16`.
    pub fn read_i16(&mut self) -> BitResult<i16> {
        self.read_array().map(i16::from_le_bytes)
    }

    /// Reads a little-endian `i32`.
    pub fn read_i32(&mut self) -> BitResult<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Reads a little-endian `i64`.
    pub fn read_i64(&mut self) -> BitResult<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Reads a little-endian IEEE-754 `f32`.
    pub fn read_f32(&mut self) -> BitResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads `len` bytes into a new vector.
    pub fn read_bytes(&mut self, len: usize) -> BitResult<Vec<u8>> {
        self.ensure_bits(len.saturating_mul(8))?;
        if self.is_byte_aligned() {
            let start = self.bit_pos >> 3;
            let bytes = self.data[start..start + len].to_vec();
            self.bit_pos += len * 8;
            return Ok(bytes);
        }
        (0..len).map(|_| self.read_u8()).collect()
    }

    /// Reads a 16-byte GUID.
    pub fn read_guid(&mut self) -> BitResult<[u8; 16]> {
        self.read_array()
    }

    /// Reads a packed unsigned integer.
    ///
    /// Each byte carries a continuation flag in bit 0 and seven value bits
    /// above it; groups are little-endian. At most five bytes are consumed.
    pub fn read_packed_u32(&mut self) -> BitResult<u32> {
        let mut value = 0u32;
        for index in 0..MAX_PACKED_BYTES {
            let byte = self.read_u8()?;
            value |= u32::from(byte >> 1) << (7 * index);
            if byte & 1 == 0 {
                return Ok(value);
            }
        }
        Err(BitError::InvalidPackedInt)
    }

    /// Reads an integer serialized against an exclusive upper bound.
    ///
    /// Bits are read one at a time, lowest first, only while setting the next
    /// bit could still keep the value below `max`. A `max` of 0 or 1 consumes
    /// nothing and yields 0.
    pub fn read_serialized_int(&mut self, max: u32) -> BitResult<u32> {
        let max = u64::from(max);
        let mut value = 0u64;
        let mut mask = 1u64;
        while value + mask < max {
            if self.read_bit()? {
                value |= mask;
            }
            mask <<= 1;
        }
        // value < max <= u32::MAX
        Ok(value as u32)
    }

    /// Reads a length-prefixed engine string.
    ///
    /// A positive length counts 8-bit characters, a negative one counts
    /// UTF-16 code units. Both forms carry a trailing NUL which is stripped.
    pub fn read_fstring(&mut self) -> BitResult<String> {
        let length = self.read_i32()?;
        if length == 0 {
            return Ok(String::new());
        }

        let available = self.bits_remaining();
        let units = length.unsigned_abs() as usize;
        let unit_bits = if length > 0 { 8 } else { 16 };
        if units.saturating_mul(unit_bits) > available {
            return Err(BitError::InvalidStringLength {
                length: i64::from(length),
                available,
            });
        }

        if length > 0 {
            let mut bytes = self.read_bytes(units)?;
            while bytes.last() == Some(&0) {
                bytes.pop();
            }
            Ok(bytes.into_iter().map(char::from).collect())
        } else {
            let mut code_units = Vec::with_capacity(units);
            for _ in 0..units {
                code_units.push(self.read_u16()?);
            }
            while code_units.last() == Some(&0) {
                code_units.pop();
            }
            String::from_utf16(&code_units).map_err(|_| BitError::InvalidUtf16)
        }
    }

    /// Skips `bits` bits.
    pub fn skip_bits(&mut self, bits: usize) -> BitResult<()> {
        self.ensure_bits(bits)?;
        self.bit_pos += bits;
        Ok(())
    }

    /// Skips `len` bytes.
    pub fn skip_bytes(&mut self, len: usize) -> BitResult<()> {
        self.skip_bits(len.saturating_mul(8))
    }

    /// Advances to the current limit.
    pub fn skip_to_end(&mut self) {
        self.bit_pos = self.bit_end;
    }

    /// Narrows the readable range to the next `bits` bits.
    ///
    /// While the returned guard is alive every read is bounded by the window
    /// end. Dropping the guard moves the position to the window end, whether
    /// or not the window was fully consumed, and restores the outer limit.
    pub fn window(&mut self, bits: usize) -> BitResult<BitWindow<'_, 'a>> {
        let available = self.bits_remaining();
        if bits > available {
            return Err(BitError::WindowOutOfBounds {
                requested: bits,
                available,
            });
        }
        let saved_end = self.bit_end;
        self.bit_end = self.bit_pos + bits;
        Ok(BitWindow {
            reader: self,
            saved_end,
        })
    }
}

/// Scoped sub-range of a [`BitReader`], released on drop.
#[derive(Debug)]
pub struct BitWindow<'r, 'a> {
    reader: &'r mut BitReader<'a>,
    saved_end: usize,
}

impl<'a> Deref for BitWindow<'_, 'a> {
    type Target = BitReader<'a>;

    fn deref(&self) -> &Self::Target {
        self.reader
    }
}

impl DerefMut for BitWindow<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader
    }
}

impl Drop for BitWindow<'_, '_> {
    fn drop(&mut self) {
        self.reader.bit_pos = self.reader.bit_end;
        self.reader.bit_end = self.saved_end;
    }
}
