//! Chunk framing: two header shapes coexist for historical reasons.
//!
//! * The V5-style header (`PREVIEW` only): `u8 id | u32 size | payload`,
//!   payload always raw.
//! * The V6 header (`PALETTE`, `PALETTE_LEGACY`, `PALETTE_ID`, `SHAPE`):
//!   `u8 id | u32 storedSize | u8 isCompressed | u32 uncompressedSize |
//!   payload`, optionally zlib-deflated.
//!
//! Dispatch between the two shapes is purely by chunk id; this module is
//! the only place that knows which ids use which shape.

use std::io::Read;

use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib;

use crate::error::{P3sError, Result};
use crate::low_level::byte_sink::ByteSink;
use crate::low_level::byte_stream::ByteStream;
use crate::low_level::chunk_ids::{PALETTE, PALETTE_ID, PALETTE_LEGACY, SHAPE};

/// Whether an id's on-wire frame has a compression flag (V6) or is always
/// raw (V5). Unknown ids are treated as V5 so the format can tolerate
/// chunks it doesn't understand.
fn is_v6_framed(id: u8) -> bool {
    matches!(id, PALETTE_LEGACY | SHAPE | PALETTE_ID | PALETTE)
}

/// Reads one chunk frame, decompressing its payload if the V6 header flags
/// it as compressed. Returns the chunk id and the materialized payload.
pub fn read_frame<R: Read>(stream: &mut ByteStream<R>) -> Result<(u8, Vec<u8>)> {
    let id = stream.read_u8()?;
    if is_v6_framed(id) {
        let stored_size = stream.read_u32()? as usize;
        let is_compressed = stream.read_u8()?;
        let uncompressed_size = stream.read_u32()? as usize;
        let payload = stream.read_bytes_vec(stored_size)?;

        let bytes = match is_compressed {
            0 => payload,
            1 => {
                let decompressed = decompress_to_vec_zlib(&payload)
                    .map_err(|e| P3sError::BadCompression(format!("{e:?}")))?;
                if decompressed.len() != uncompressed_size {
                    return Err(P3sError::BadCompression(format!(
                        "declared uncompressed size {uncompressed_size} but got {}",
                        decompressed.len()
                    )));
                }
                decompressed
            }
            other => {
                return Err(P3sError::BadCompression(format!(
                    "unknown chunk compression flag {other}"
                )))
            }
        };
        Ok((id, bytes))
    } else {
        let size = stream.read_u32()? as usize;
        let bytes = stream.read_bytes_vec(size)?;
        Ok((id, bytes))
    }
}

/// Skips one chunk frame without materializing its payload, used for
/// unrecognized chunk ids. This is how the format tolerates chunks it
/// doesn't understand.
pub fn skip_unknown_v5_frame<R: Read>(stream: &mut ByteStream<R>) -> Result<u8> {
    let id = stream.read_u8()?;
    let size = stream.read_u32()? as u64;
    stream.skip(size)?;
    Ok(id)
}

/// Skips one frame's body without decompressing it, given `id` has already
/// been read off the stream. Used by the preview-only fast path, which
/// must not decompress `SHAPE`/`PALETTE` payloads.
pub fn skip_frame_body<R: Read>(stream: &mut ByteStream<R>, id: u8) -> Result<()> {
    if is_v6_framed(id) {
        let stored_size = stream.read_u32()? as u64;
        let _is_compressed = stream.read_u8()?;
        let _uncompressed_size = stream.read_u32()?;
        stream.skip(stored_size)
    } else {
        let size = stream.read_u32()? as u64;
        stream.skip(size)
    }
}

/// Writes one chunk frame. `compress` is ignored for ids that use the V5
/// header shape (`PREVIEW` and anything outside the recognized set), since
/// those payloads are always written raw.
pub fn write_frame(sink: &mut ByteSink, id: u8, bytes: &[u8], compress: bool) -> Result<()> {
    sink.write_u8(id)?;

    if is_v6_framed(id) {
        let (is_compressed, stored): (u8, Vec<u8>) = if compress {
            (1, compress_to_vec_zlib(bytes, 6))
        } else {
            (0, bytes.to_vec())
        };

        sink.write_u32(stored.len() as u32)?;
        sink.write_u8(is_compressed)?;
        sink.write_u32(bytes.len() as u32)?;
        sink.write_bytes(&stored)?;
    } else {
        sink.write_u32(bytes.len() as u32)?;
        sink.write_bytes(bytes)?;
    }

    Ok(())
}
