//! Low-level bit packing primitives for engine replay streams.
//!
//! This crate provides [`BitReader`] and [`BitWriter`] for the bit layout used
//! by recorded network-replication streams: least-significant bit first within
//! each byte, little-endian integers, packed variable-length integers, integers
//! serialized against an exclusive maximum, and length-prefixed strings.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads/writes are bounds-checked.
//! - **Scoped windows** - Sub-ranges are opened through a guard
//!   ([`BitWindow`]) that restores the outer read limit when dropped.
//! - **No domain knowledge** - This crate knows nothing about channels, bunches,
//!   or replicated objects.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bit(true);
//! writer.write_packed_u32(300);
//! writer.write_bits(42, 7).unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert!(reader.read_bit().unwrap());
//! assert_eq!(reader.read_packed_u32().unwrap(), 300);
//! {
//!     let mut window = reader.window(7).unwrap();
//!     assert_eq!(window.read_bits(7).unwrap(), 42);
//! }
//! ```

mod error;
mod reader;
mod writer;

pub use error::{BitError, BitResult};
pub use reader::{BitReader, BitWindow};
pub use writer::{BitBuffer, BitWriter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roundtrip() {
        let writer = BitWriter::new();
        let bytes = writer.finish();
        assert!(bytes.is_empty());

        let reader = BitReader::new(&bytes);
        assert!(reader.is_at_end());
    }

    #[test]
    fn multiple_bits_roundtrip() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bit(true);
        writer.write_bit(true);
        writer.write_bit(false);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
    }

    #[test]
    fn bits_roundtrip_various_sizes() {
        let test_cases = [
            (0b1010u64, 4),
            (0xFFu64, 8),
            (0xABCDu64, 16),
            (0x1234_5678u64, 32),
            (u64::MAX, 64),
        ];

        for (value, bits) in test_cases {
            let mut writer = BitWriter::new();
            writer.write_bits(value, bits).unwrap();
            let bytes = writer.finish();

            let mut reader = BitReader::new(&bytes);
            let read_value = reader.read_bits(bits).unwrap();
            assert_eq!(
                read_value, value,
                "roundtrip failed for {bits}-bit value {value}"
            );
        }
    }

    #[test]
    fn mixed_roundtrip() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bits(0b1010, 4).unwrap();
        writer.write_i32(-7);
        writer.write_serialized_int(9, 10).unwrap();
        writer.write_fstring("Engine.Actor");
        writer.write_f32(1.5);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
        assert_eq!(reader.read_i32().unwrap(), -7);
        assert_eq!(reader.read_serialized_int(10).unwrap(), 9);
        assert_eq!(reader.read_fstring().unwrap(), "Engine.Actor");
        assert!((reader.read_f32().unwrap() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn public_api_exports() {
        let _ = BitError::InvalidPackedInt;
        let _: BitResult<()> = Ok(());
        let _ = BitBuffer::default();
        let mut reader = BitReader::new(&[0]);
        let _window: BitWindow<'_, '_> = reader.window(1).unwrap();
    }
}
