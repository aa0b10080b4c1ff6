//! Container collaborators.
//!
//! Replay data chunks may be encrypted and compressed. The ciphers and
//! compression codecs are supplied by the caller; this module only frames
//! their inputs and checks their outputs.

use bitstream::BitReader;

use crate::error::{ReplayError, ReplayResult};

/// Decrypts an encrypted replay data chunk.
pub trait Decryptor {
    fn decrypt(&self, key: &[u8], cipher: &[u8]) -> ReplayResult<Vec<u8>>;
}

/// Decompresses a compressed replay data chunk.
pub trait Decompressor {
    /// Inflates `compressed` into exactly `decompressed_len` bytes.
    fn decompress(&self, compressed: &[u8], decompressed_len: usize) -> ReplayResult<Vec<u8>>;
}

/// How a replay data chunk is stored in its container.
#[derive(Clone, Copy, Default)]
pub struct ChunkEncoding<'a> {
    /// Key of an encrypted replay.
    pub encryption_key: Option<&'a [u8]>,
    pub compressed: bool,
    pub decryptor: Option<&'a dyn Decryptor>,
    pub decompressor: Option<&'a dyn Decompressor>,
}

impl std::fmt::Debug for ChunkEncoding<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkEncoding")
            .field("encrypted", &self.encryption_key.is_some())
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

/// Turns a stored replay data chunk into the plain stream of demo frames.
///
/// Decrypts first when the replay is encrypted. A compressed chunk starts
/// with `decompressed_len: i32` and `compressed_len: i32`, followed by the
/// compressed bytes.
pub fn prepare_replay_data(chunk: &[u8], encoding: ChunkEncoding<'_>) -> ReplayResult<Vec<u8>> {
    let data = match encoding.encryption_key {
        Some(key) => {
            let decryptor = encoding
                .decryptor
                .ok_or(ReplayError::MissingCollaborator {
                    what: "encrypted",
                    collaborator: "decryptor",
                })?;
            decryptor.decrypt(key, chunk)?
        }
        None => chunk.to_vec(),
    };
    if !encoding.compressed {
        return Ok(data);
    }

    let decompressor = encoding
        .decompressor
        .ok_or(ReplayError::MissingCollaborator {
            what: "compressed",
            collaborator: "decompressor",
        })?;
    let mut reader = BitReader::new(&data);
    let decompressed_len = read_length(&mut reader, "decompressed")?;
    let compressed_len = read_length(&mut reader, "compressed")?;
    let compressed = reader.read_bytes(compressed_len)?;

    let output = decompressor.decompress(&compressed, decompressed_len)?;
    if output.len() != decompressed_len {
        return Err(ReplayError::DecompressedLength {
            expected: decompressed_len,
            actual: output.len(),
        });
    }
    Ok(output)
}

fn read_length(reader: &mut BitReader<'_>, field: &'static str) -> ReplayResult<usize> {
    let value = reader.read_i32()?;
    usize::try_from(value).map_err(|_| ReplayError::InvalidLength {
        field,
        value: i64::from(value),
    })
}
