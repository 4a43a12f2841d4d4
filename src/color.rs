//! [`Rgba`] and [`ColorPalette`], the voxel color table.

use crate::error::{P3sError, Result};
use crate::low_level::byte_sink::ByteSink;
use crate::low_level::byte_stream::ByteStream;
use std::io::Read;

/// An 8-bit-per-channel RGBA color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    fn read<R: Read>(stream: &mut ByteStream<R>) -> Result<Self> {
        Ok(Rgba {
            r: stream.read_u8()?,
            g: stream.read_u8()?,
            b: stream.read_u8()?,
            a: stream.read_u8()?,
        })
    }

    fn write(&self, sink: &mut ByteSink) -> Result<()> {
        sink.write_u8(self.r)?;
        sink.write_u8(self.g)?;
        sink.write_u8(self.b)?;
        sink.write_u8(self.a)?;
        Ok(())
    }
}

/// Upper bound on the number of colors a palette may hold: indices are a
/// single byte and `AIR = 255` is reserved.
pub const MAX_COLORS: usize = 255;

/// An ordered list of RGBA colors plus a parallel emissive flag per entry
/// Index `i` into `colors`/`emissive` is the in-memory color index a
/// `Shape`'s block grid refers to before any remapping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorPalette {
    pub colors: Vec<Rgba>,
    pub emissive: Vec<bool>,
}

impl ColorPalette {
    pub fn new() -> Self {
        ColorPalette {
            colors: Vec::new(),
            emissive: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn push(&mut self, color: Rgba, emissive: bool) -> Result<u8> {
        if self.colors.len() >= MAX_COLORS {
            return Err(P3sError::BadChunk(
                "palette cannot hold more than 255 colors".into(),
            ));
        }
        self.colors.push(color);
        self.emissive.push(emissive);
        Ok((self.colors.len() - 1) as u8)
    }

    /// Finds an existing entry with this exact color and emissive flag, or
    /// appends a new one. Used by the SINGLE-mode "shrink" path and
    /// by the LEGACY-mode on-demand palette build.
    pub fn find_or_insert(&mut self, color: Rgba, emissive: bool) -> Result<u8> {
        if let Some(i) = self
            .colors
            .iter()
            .zip(self.emissive.iter())
            .position(|(&c, &e)| c == color && e == emissive)
        {
            return Ok(i as u8);
        }
        self.push(color, emissive)
    }

    /// Produces the canonical serialized order used by the writer: here
    /// that's simply the existing order (there is no reordering heuristic
    /// defined by the format), together with the identity permutation
    /// table from in-memory index to serialized index (the palette
    /// remapping applied on write).
    pub fn canonical_order(&self) -> (ColorPalette, Vec<u8>) {
        let permutation: Vec<u8> = (0..self.colors.len() as u8).collect();
        (self.clone(), permutation)
    }

    /// Reads the current (non-legacy) on-wire layout: `u8 colorCount |
    /// RGBA[colorCount] | bool[colorCount] emissive`.
    pub fn read_current<R: Read>(stream: &mut ByteStream<R>) -> Result<Self> {
        let color_count = stream.read_u8()? as usize;
        let mut colors = Vec::with_capacity(color_count);
        for _ in 0..color_count {
            colors.push(Rgba::read(stream)?);
        }
        let mut emissive = Vec::with_capacity(color_count);
        for _ in 0..color_count {
            emissive.push(stream.read_u8()? != 0);
        }
        Ok(ColorPalette { colors, emissive })
    }

    /// Writes the current on-wire layout.
    pub fn write_current(&self, sink: &mut ByteSink) -> Result<()> {
        if self.colors.len() > MAX_COLORS {
            return Err(P3sError::BadChunk(
                "palette cannot hold more than 255 colors".into(),
            ));
        }
        sink.write_u8(self.colors.len() as u8)?;
        for color in &self.colors {
            color.write(sink)?;
        }
        for &e in &self.emissive {
            sink.write_u8(e as u8)?;
        }
        Ok(())
    }

    /// Reads the legacy on-wire layout: `u8 rows | u8 cols | u16 colorCount
    /// | u8 defaultColor | u8 defaultBg | RGBA[colorCount] |
    /// bool[colorCount] emissive`. `rows`, `cols`, `defaultColor`,
    /// `defaultBg` are consumed and discarded.
    pub fn read_legacy<R: Read>(stream: &mut ByteStream<R>) -> Result<Self> {
        let _rows = stream.read_u8()?;
        let _cols = stream.read_u8()?;
        let color_count = stream.read_u16()? as usize;
        let _default_color = stream.read_u8()?;
        let _default_bg = stream.read_u8()?;

        let mut colors = Vec::with_capacity(color_count);
        for _ in 0..color_count {
            colors.push(Rgba::read(stream)?);
        }
        let mut emissive = Vec::with_capacity(color_count);
        for _ in 0..color_count {
            emissive.push(stream.read_u8()? != 0);
        }
        Ok(ColorPalette { colors, emissive })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_layout_round_trips() {
        let palette = ColorPalette {
            colors: vec![Rgba::new(255, 0, 0, 255), Rgba::new(0, 255, 0, 128)],
            emissive: vec![false, true],
        };

        let mut sink = ByteSink::new();
        palette.write_current(&mut sink).unwrap();
        let bytes = sink.into_bytes();

        let mut stream = ByteStream::new(&bytes[..]);
        let decoded = ColorPalette::read_current(&mut stream).unwrap();
        assert_eq!(decoded, palette);
    }

    #[test]
    fn legacy_header_fields_are_discarded() {
        let mut sink = ByteSink::new();
        sink.write_u8(4).unwrap(); // rows
        sink.write_u8(4).unwrap(); // cols
        sink.write_u16(1).unwrap(); // colorCount
        sink.write_u8(0).unwrap(); // defaultColor
        sink.write_u8(0).unwrap(); // defaultBg
        sink.write_u8(10).unwrap();
        sink.write_u8(20).unwrap();
        sink.write_u8(30).unwrap();
        sink.write_u8(255).unwrap();
        sink.write_u8(1).unwrap(); // emissive
        let bytes = sink.into_bytes();

        let mut stream = ByteStream::new(&bytes[..]);
        let decoded = ColorPalette::read_legacy(&mut stream).unwrap();
        assert_eq!(decoded.colors, vec![Rgba::new(10, 20, 30, 255)]);
        assert_eq!(decoded.emissive, vec![true]);
    }

    #[test]
    fn find_or_insert_reuses_identical_entries() {
        let mut palette = ColorPalette::new();
        let a = palette.find_or_insert(Rgba::new(1, 2, 3, 255), false).unwrap();
        let b = palette.find_or_insert(Rgba::new(1, 2, 3, 255), false).unwrap();
        let c = palette.find_or_insert(Rgba::new(4, 5, 6, 255), false).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(palette.len(), 2);
    }
}
