//! Cursor over a readable byte source with typed little-endian reads.

use std::io::{self, Read, Seek};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{P3sError, Result};

/// Sequential little-endian reader over any [`io::Read`] source.
///
/// Tracks how many bytes have been consumed so far; `seek`/`remaining` are
/// only available when the underlying source also implements [`io::Seek`]
/// (see the second `impl` block below), splitting sequential-only reads
/// from the seek-requiring ones the same way a row-at-a-time image reader
/// separates its streaming body from a trailing random-access palette.
pub struct ByteStream<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> ByteStream<R> {
    pub fn new(inner: R) -> Self {
        ByteStream { inner, pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.inner.read_u8().map_err(P3sError::from_io)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let v = self
            .inner
            .read_u16::<LittleEndian>()
            .map_err(P3sError::from_io)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self
            .inner
            .read_u32::<LittleEndian>()
            .map_err(P3sError::from_io)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let v = self
            .inner
            .read_f32::<LittleEndian>()
            .map_err(P3sError::from_io)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_f32x3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    pub fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buffer).map_err(P3sError::from_io)?;
        self.pos += buffer.len() as u64;
        Ok(())
    }

    pub fn read_bytes_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; n];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Reads and discards `n` bytes. Fails with `Truncated` on a short read.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        let copied = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())
            .map_err(P3sError::from_io)?;
        self.pos += copied;
        if copied != n {
            return Err(P3sError::Truncated);
        }
        Ok(())
    }
}

impl<R: Read + Seek> ByteStream<R> {
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner
            .seek(io::SeekFrom::Start(pos))
            .map_err(P3sError::from_io)?;
        self.pos = pos;
        Ok(())
    }

    pub fn remaining(&mut self) -> Result<u64> {
        let total = self.inner.seek(io::SeekFrom::End(0)).map_err(P3sError::from_io)?;
        self.inner
            .seek(io::SeekFrom::Start(self.pos))
            .map_err(P3sError::from_io)?;
        Ok(total.saturating_sub(self.pos))
    }
}
