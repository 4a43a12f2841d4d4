//! Growable little-endian write buffer with support for patching fields
//! after later data has already been appended (needed for the scene
//! header's `totalSize`, which is only known once every chunk is written).

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::Result;

pub struct ByteSink {
    buffer: Vec<u8>,
}

impl ByteSink {
    pub fn new() -> Self {
        ByteSink { buffer: Vec::new() }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.buffer.write_u8(v)?;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.buffer.write_u16::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.buffer.write_u32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.buffer.write_f32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn write_f32x3(&mut self, v: [f32; 3]) -> Result<()> {
        self.write_f32(v[0])?;
        self.write_f32(v[1])?;
        self.write_f32(v[2])?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Overwrites the 4 bytes at `offset` (previously written with
    /// `write_u32`) with `value`, little-endian. Used to patch `totalSize`
    /// once the chunk region has been fully written.
    pub fn patch_u32_at(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for ByteSink {
    fn default() -> Self {
        Self::new()
    }
}
