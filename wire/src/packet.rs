//! Demo packet framing.
//!
//! A demo frame carries a run of packets, each prefixed by an `i32` byte
//! length. Inside a packet the payload bits are followed by a single `1`
//! terminator bit and zero padding up to the byte boundary.

use bitstream::{BitReader, BitWriter};

use crate::error::{LimitKind, WireError, WireResult};
use crate::limits::Limits;

/// Reads a packet length prefix.
///
/// Returns `None` for the zero length that ends a frame's packet list.
pub fn read_packet_length(reader: &mut BitReader<'_>, limits: &Limits) -> WireResult<Option<usize>> {
    let length = reader.read_i32()?;
    if length == 0 {
        return Ok(None);
    }
    let Ok(bytes) = usize::try_from(length) else {
        return Err(WireError::InvalidPacketLength { length });
    };
    if bytes > limits.max_packet_bytes {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::PacketBytes,
            limit: limits.max_packet_bytes,
            actual: bytes,
        });
    }
    Ok(Some(bytes))
}

/// Returns the number of payload bits in a packet.
///
/// The highest set bit of the last byte is the terminator; everything
/// below it is payload.
pub fn packet_bit_length(packet: &[u8]) -> WireResult<usize> {
    let Some(&last) = packet.last() else {
        return Err(WireError::EmptyPacket);
    };
    if last == 0 {
        return Err(WireError::MissingTerminator);
    }
    let terminator = 7 - last.leading_zeros() as usize;
    Ok((packet.len() - 1) * 8 + terminator)
}

/// Writes a packet length prefix.
pub fn write_packet_length(writer: &mut BitWriter, bytes: usize) -> WireResult<()> {
    let length = i32::try_from(bytes).map_err(|_| WireError::InvalidPacketLength { length: -1 })?;
    writer.write_i32(length);
    Ok(())
}

/// Finishes a packet payload: appends the terminator bit and pads.
#[must_use]
pub fn terminate_packet(mut payload: BitWriter) -> Vec<u8> {
    payload.write_bit(true);
    payload.finish()
}
