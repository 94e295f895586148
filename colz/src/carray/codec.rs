//! The byte format of one compressed chunk.
//!
//! ```text
//! offset  size  field
//! 0       2     magic "CZ"
//! 2       1     version
//! 3       1     flags: bit 0 shuffled, bit 1 compressed
//! 4       4     typesize (u32 LE)
//! 8       4     nbytes, uncompressed payload size (u32 LE)
//! 12      4     cbytes, size of the whole chunk including this header (u32 LE)
//! 16      ...   payload
//! ```

use std::io::{Read, Write};

use bzip2::Compression;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use colz_error::{ColzResult, colz_bail, colz_err};

use crate::carray::CompressionParams;

pub(crate) const HEADER_LEN: usize = 16;
const MAGIC: &[u8; 2] = b"CZ";
const VERSION: u8 = 1;
const FLAG_SHUFFLED: u8 = 0b01;
const FLAG_COMPRESSED: u8 = 0b10;

/// Compress `raw`, a run of `typesize`-byte values.
pub(crate) fn compress(raw: &[u8], typesize: usize, cparams: CompressionParams) -> ColzResult<Vec<u8>> {
    let nbytes = u32::try_from(raw.len())
        .map_err(|_| colz_err!("chunk of {} bytes is too large", raw.len()))?;
    let shuffled = cparams.shuffle() && typesize > 1;
    let payload = if shuffled {
        shuffle(raw, typesize)
    } else {
        raw.to_vec()
    };

    let mut flags = if shuffled { FLAG_SHUFFLED } else { 0 };
    let payload = if cparams.level() == 0 {
        payload
    } else {
        let mut encoder = BzEncoder::new(
            Vec::with_capacity(raw.len() / 2),
            Compression::new(u32::from(cparams.level())),
        );
        encoder.write_all(&payload)?;
        let compressed = encoder.finish()?;
        if compressed.len() < payload.len() {
            flags |= FLAG_COMPRESSED;
            compressed
        } else {
            payload
        }
    };

    let cbytes = u32::try_from(HEADER_LEN + payload.len())
        .map_err(|_| colz_err!("compressed chunk is too large"))?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.push(flags);
    out.extend_from_slice(&u32::try_from(typesize).unwrap_or(u32::MAX).to_le_bytes());
    out.extend_from_slice(&nbytes.to_le_bytes());
    out.extend_from_slice(&cbytes.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decompress a chunk produced by [`compress`] back into its raw bytes.
pub(crate) fn decompress(chunk: &[u8]) -> ColzResult<Vec<u8>> {
    if chunk.len() < HEADER_LEN || &chunk[..2] != MAGIC {
        colz_bail!(InvalidSerde: "not a colz chunk");
    }
    if chunk[2] != VERSION {
        colz_bail!(InvalidSerde: "unsupported chunk version {}", chunk[2]);
    }
    let flags = chunk[3];
    let typesize = read_u32(chunk, 4) as usize;
    let nbytes = read_u32(chunk, 8) as usize;
    let cbytes = read_u32(chunk, 12) as usize;
    if cbytes != chunk.len() {
        colz_bail!(
            InvalidSerde: "chunk header says {cbytes} bytes but {} were read",
            chunk.len()
        );
    }

    let payload = &chunk[HEADER_LEN..];
    let raw = if flags & FLAG_COMPRESSED != 0 {
        let mut out = Vec::with_capacity(nbytes);
        BzDecoder::new(payload).read_to_end(&mut out)?;
        out
    } else {
        payload.to_vec()
    };
    if raw.len() != nbytes {
        colz_bail!(
            InvalidSerde: "chunk decompressed to {} bytes, expected {nbytes}",
            raw.len()
        );
    }

    Ok(if flags & FLAG_SHUFFLED != 0 {
        unshuffle(&raw, typesize)
    } else {
        raw
    })
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

/// Group the `i`-th byte of every value together.
fn shuffle(raw: &[u8], typesize: usize) -> Vec<u8> {
    let n = raw.len() / typesize;
    let mut out = vec![0u8; raw.len()];
    for (i, value) in raw.chunks_exact(typesize).enumerate() {
        for (b, byte) in value.iter().enumerate() {
            out[b * n + i] = *byte;
        }
    }
    out
}

fn unshuffle(shuffled: &[u8], typesize: usize) -> Vec<u8> {
    let n = shuffled.len() / typesize.max(1);
    let mut out = vec![0u8; shuffled.len()];
    for (i, value) in out.chunks_exact_mut(typesize.max(1)).enumerate() {
        for (b, byte) in value.iter_mut().enumerate() {
            *byte = shuffled[b * n + i];
        }
    }
    out
}
