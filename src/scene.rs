//! [`Asset`], [`AssetFilter`], and the `Scene` tree `SceneCodec` produces.

use crate::color::ColorPalette;
use crate::shape::Shape;

/// One item `SceneCodec::load_assets` can produce.
#[derive(Debug)]
pub enum Asset {
    /// A standalone "artist palette" not bound to any shape (MULTI mode
    /// only).
    Palette(ColorPalette),
    /// A root shape, with its full descendant tree already attached.
    Shape(Shape),
}

/// Bitmask selecting which asset kinds/sub-data `load_assets` returns.
/// The four named categories map onto the chunk/sub-chunk
/// ids actually defined by the format: `Palette` gates the standalone
/// artist-palette asset and palette-chunk processing, `Shape` gates
/// whether `SHAPE` chunks are parsed at all, and `Object` gates whether
/// the `OBJECT_COLLISION_BOX`/`OBJECT_IS_HIDDEN` sub-chunks (literally
/// named "Object") are materialized onto parsed
/// shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssetFilter(u8);

impl AssetFilter {
    pub const PALETTE: AssetFilter = AssetFilter(1 << 0);
    pub const SHAPE: AssetFilter = AssetFilter(1 << 1);
    pub const OBJECT: AssetFilter = AssetFilter(1 << 2);
    pub const ANY: AssetFilter = AssetFilter(Self::PALETTE.0 | Self::SHAPE.0 | Self::OBJECT.0);

    pub const fn contains(self, other: AssetFilter) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: AssetFilter) -> AssetFilter {
        AssetFilter(self.0 | other.0)
    }
}

impl std::ops::BitOr for AssetFilter {
    type Output = AssetFilter;
    fn bitor(self, rhs: AssetFilter) -> AssetFilter {
        self.union(rhs)
    }
}

impl Default for AssetFilter {
    fn default() -> Self {
        AssetFilter::ANY
    }
}

// ---------------------------------------------------------------------
// SceneCodec: file header, chunk ordering, palette-compatibility-mode
// resolution, and shape parenting.
// ---------------------------------------------------------------------

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::rc::Rc;

use crate::color::Rgba;
use crate::error::{P3sError, Result};
use crate::low_level::byte_sink::ByteSink;
use crate::low_level::byte_stream::ByteStream;
use crate::low_level::chunk;
use crate::low_level::chunk_ids::*;
use crate::low_level::legacy_palettes::{self, LegacyPaletteId, LegacyPaletteSource};
use crate::shape::{block_count, Shape, ShapeSettings};
use crate::shape_codec::{self, ShapeEnvelope};

/// Scene-level compression algorithm byte. Only signals
/// whether any chunk in the file *may* be compressed; the actual
/// per-chunk flag lives in each V6 chunk frame.
const ALGO_NONE: u8 = 0;
const ALGO_ZIP: u8 = 1;

fn read_magic<R: Read>(stream: &mut ByteStream<R>) -> Result<()> {
    let mut magic = [0u8; 4];
    stream.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(P3sError::BadMagic);
    }
    Ok(())
}

/// Reads the fixed file header (magic, version, algo, totalSize) and
/// returns the declared size of the chunk region that follows.
fn read_header<R: Read>(stream: &mut ByteStream<R>) -> Result<u64> {
    read_magic(stream)?;
    let version = stream.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(P3sError::UnsupportedVersion(version));
    }
    let algo = stream.read_u8()?;
    if algo != ALGO_NONE && algo != ALGO_ZIP {
        return Err(P3sError::BadCompression(format!(
            "unknown scene compression algo {algo}"
        )));
    }
    let total_size = stream.read_u32()? as u64;
    Ok(total_size)
}

/// Ergonomic entry point for reading and writing P3S scenes. Every
/// method is a thin, stateless wrapper (the codec holds no process-wide
/// mutable state), so these are associated functions rather than
/// requiring an instance.
pub struct SceneCodec;

impl SceneCodec {
    /// Reads every chunk in `source` and returns the requested assets.
    /// Aborts the whole load and returns a single error on
    /// truncation or a malformed chunk; no partial results are returned
    /// for a failed load.
    pub fn load_assets<R: Read>(
        source: R,
        atlas: &dyn LegacyPaletteSource,
        filter: AssetFilter,
        settings: &ShapeSettings,
    ) -> Result<Vec<Asset>> {
        load_assets(source, atlas, filter, settings)
    }

    /// Scans only until the `PREVIEW` chunk is found; never decompresses
    /// `SHAPE`/`PALETTE` chunks encountered along the way (the
    /// "preview-only fast-path").
    pub fn get_preview<R: Read>(source: R) -> Result<Vec<u8>> {
        get_preview(source)
    }

    /// Serializes `shape`'s full tree directly to `sink`, with no
    /// top-level artist palette.
    pub fn save_shape<W: Write>(sink: W, shape: &Shape, preview: Option<&[u8]>) -> Result<()> {
        let buffer = save_shape_to_buffer(shape, None, preview)?;
        let mut sink = sink;
        sink.write_all(&buffer).map_err(P3sError::from_io)
    }

    /// Serializes `shape`'s full tree, with an optional standalone artist
    /// palette and preview image, into a freshly allocated buffer.
    pub fn save_shape_to_buffer(
        shape: &Shape,
        artist_palette: Option<&crate::color::ColorPalette>,
        preview: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        save_shape_to_buffer(shape, artist_palette, preview)
    }
}

// --- read path -----------------------------------------------------

/// Which of the three historical palette-compatibility modes a file uses
/// Resolved once, after every chunk has been seen, from the
/// signals collected while streaming: whether any shape carried its own
/// `SHAPE_PALETTE`, and whether a top-level `PALETTE`/`PALETTE_LEGACY`
/// chunk was present.
enum PaletteMode {
    Multi,
    Single,
    Legacy,
}

fn load_assets<R: Read>(
    mut source: R,
    atlas: &dyn LegacyPaletteSource,
    filter: AssetFilter,
    settings: &ShapeSettings,
) -> Result<Vec<Asset>> {
    let mut stream = ByteStream::new(&mut source);
    let total_size = read_header(&mut stream)?;
    let region_start = stream.position();

    let mut artist_palette: Option<crate::color::ColorPalette> = None;
    let mut legacy_id: Option<LegacyPaletteId> = None;
    let mut envelopes: Vec<ShapeEnvelope> = Vec::new();
    let mut any_embedded_palette = false;

    while stream.position() - region_start < total_size {
        let (id, bytes) = chunk::read_frame(&mut stream)?;

        match id {
            PREVIEW => { /* not part of load_assets' result, see get_preview */ }
            PALETTE if filter.contains(AssetFilter::PALETTE) => {
                let mut sub = ByteStream::new(&bytes[..]);
                artist_palette = Some(crate::color::ColorPalette::read_current(&mut sub)?);
            }
            PALETTE_LEGACY if filter.contains(AssetFilter::PALETTE) => {
                let mut sub = ByteStream::new(&bytes[..]);
                artist_palette = Some(crate::color::ColorPalette::read_legacy(&mut sub)?);
            }
            PALETTE_ID => {
                let byte = bytes.first().copied().unwrap_or(0);
                legacy_id = Some(LegacyPaletteId::from_byte(byte).ok_or_else(|| {
                    P3sError::BadChunk(format!("unknown PALETTE_ID byte {byte}"))
                })?);
            }
            SHAPE if filter.contains(AssetFilter::SHAPE) => {
                let envelope = shape_codec::decode(&bytes, settings, filter.contains(AssetFilter::OBJECT))?;
                if envelope.embedded_palette.is_some() {
                    any_embedded_palette = true;
                }
                envelopes.push(envelope);
            }
            _ => { /* SHAPE excluded by filter, or an id this layer doesn't recognize (error recovery) */ }
        }
    }

    let mut assets = Vec::new();

    let mode = if any_embedded_palette {
        PaletteMode::Multi
    } else if artist_palette.is_some() {
        PaletteMode::Single
    } else {
        PaletteMode::Legacy
    };

    if let PaletteMode::Multi = mode {
        if let Some(palette) = artist_palette.take() {
            assets.push(Asset::Palette(palette));
        }
    }

    if !envelopes.is_empty() {
        let shapes = resolve_shapes(envelopes, &mode, artist_palette.as_ref(), legacy_id, atlas, settings)?;
        assets.extend(shapes.into_iter().map(Asset::Shape));
    }

    Ok(assets)
}

/// Turns the flat, declaration-order list of decoded shape envelopes into
/// owned [`Shape`] trees: resolves each shape's palette per the
/// compatibility mode, then reparents children onto their parents
/// by `parentId` (cyclic back-references
/// design note).
fn resolve_shapes(
    envelopes: Vec<ShapeEnvelope>,
    mode: &PaletteMode,
    artist_palette: Option<&crate::color::ColorPalette>,
    legacy_id: Option<LegacyPaletteId>,
    atlas: &dyn LegacyPaletteSource,
    settings: &ShapeSettings,
) -> Result<Vec<Shape>> {
    let root_index = envelopes
        .iter()
        .position(|e| e.parent_id == 0)
        .unwrap_or(0);

    let legacy_id = legacy_id.unwrap_or(LegacyPaletteId::DEFAULT);

    // Root's palette is resolved first: in MULTI mode, shapes without
    // their own SHAPE_PALETTE share this one by reference.
    let root_palette = match mode {
        PaletteMode::Multi => Rc::new(RefCell::new(
            envelopes[root_index]
                .embedded_palette
                .clone()
                .unwrap_or_default(),
        )),
        _ => Rc::new(RefCell::new(crate::color::ColorPalette::new())),
    };

    let id_to_index: HashMap<u16, usize> = {
        let mut map = HashMap::new();
        for (i, e) in envelopes.iter().enumerate() {
            map.entry(e.shape_id).or_insert(i);
        }
        map
    };

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); envelopes.len()];
    let mut is_child = vec![false; envelopes.len()];
    for (i, e) in envelopes.iter().enumerate() {
        if e.parent_id == 0 {
            continue;
        }
        let parent_index = *id_to_index.get(&e.parent_id).ok_or_else(|| {
            P3sError::BadChunk(format!(
                "shape parentId {} does not match any declared shapeId",
                e.parent_id
            ))
        })?;
        if parent_index >= i {
            return Err(P3sError::BadChunk(
                "shape parentId refers to a shape not yet declared".into(),
            ));
        }
        children_of[parent_index].push(i);
        is_child[i] = true;
    }

    let mut flat: Vec<Option<Shape>> = Vec::with_capacity(envelopes.len());
    for (i, envelope) in envelopes.into_iter().enumerate() {
        let palette = resolve_palette(&envelope, i == root_index, mode, &root_palette, artist_palette, legacy_id, atlas)?;
        let blocks = remap_blocks_for_mode(&envelope, mode, artist_palette, legacy_id, atlas, &palette)?;

        flat.push(Some(Shape {
            shape_id: envelope.shape_id,
            parent_id: envelope.parent_id,
            size: envelope.size,
            blocks,
            palette,
            name: envelope.name,
            transform: envelope.transform,
            pivot: envelope.pivot,
            collision_box: envelope.collision_box,
            is_hidden_self: envelope.is_hidden_self,
            points: envelope.points,
            point_rotations: envelope.point_rotations,
            baked_lighting: envelope.baked_lighting,
            is_mutable: settings.mutable_shape,
            children: Vec::new(),
        }));
    }

    fn assemble(i: usize, flat: &mut Vec<Option<Shape>>, children_of: &[Vec<usize>]) -> Shape {
        let mut shape = flat[i].take().expect("each shape assembled exactly once");
        for &child_i in &children_of[i] {
            shape.children.push(assemble(child_i, flat, children_of));
        }
        shape
    }

    let root_indices: Vec<usize> = (0..flat.len()).filter(|&i| !is_child[i]).collect();

    Ok(root_indices
        .into_iter()
        .map(|i| assemble(i, &mut flat, &children_of))
        .collect())
}

#[allow(clippy::too_many_arguments)]
fn resolve_palette(
    envelope: &ShapeEnvelope,
    is_root: bool,
    mode: &PaletteMode,
    root_palette: &Rc<RefCell<crate::color::ColorPalette>>,
    artist_palette: Option<&crate::color::ColorPalette>,
    _legacy_id: LegacyPaletteId,
    _atlas: &dyn LegacyPaletteSource,
) -> Result<Rc<RefCell<crate::color::ColorPalette>>> {
    match mode {
        PaletteMode::Multi => {
            if is_root {
                Ok(Rc::clone(root_palette))
            } else if let Some(own) = &envelope.embedded_palette {
                Ok(Rc::new(RefCell::new(own.clone())))
            } else {
                Ok(Rc::clone(root_palette))
            }
        }
        PaletteMode::Single => {
            let source = artist_palette.expect("SINGLE mode implies an artist palette");
            if source.len() <= crate::color::MAX_COLORS {
                Ok(Rc::new(RefCell::new(source.clone())))
            } else {
                // Shrink path: built on demand per-shape in
                // `remap_blocks_for_mode`, starting from an empty palette.
                Ok(Rc::new(RefCell::new(crate::color::ColorPalette::new())))
            }
        }
        PaletteMode::Legacy => Ok(Rc::new(RefCell::new(crate::color::ColorPalette::new()))),
    }
}

/// Produces the block indices a resolved [`Shape`] should carry, remapping
/// through the file's palette (SINGLE shrink path) or the legacy atlas
/// (LEGACY mode) where the compatibility mode requires it; MULTI mode
/// passes blocks through unchanged since the embedded/shared palette is
/// already in the index space the blocks were written in.
fn remap_blocks_for_mode(
    envelope: &ShapeEnvelope,
    mode: &PaletteMode,
    artist_palette: Option<&crate::color::ColorPalette>,
    legacy_id: LegacyPaletteId,
    atlas: &dyn LegacyPaletteSource,
    palette: &Rc<RefCell<crate::color::ColorPalette>>,
) -> Result<Vec<u8>> {
    match mode {
        PaletteMode::Multi => Ok(envelope.blocks.clone()),
        PaletteMode::Single => {
            let source = artist_palette.expect("SINGLE mode implies an artist palette");
            if source.len() <= crate::color::MAX_COLORS {
                Ok(envelope.blocks.clone())
            } else {
                shrink_remap(&envelope.blocks, |index| {
                    source
                        .colors
                        .get(index as usize)
                        .copied()
                        .zip(source.emissive.get(index as usize).copied())
                }, palette)
            }
        }
        PaletteMode::Legacy => shrink_remap(
            &envelope.blocks,
            |index| Some((atlas.color_at(legacy_id, index), legacy_palettes::is_emissive(legacy_id, index))),
            palette,
        ),
    }
}

/// Builds a fresh per-shape palette on demand: for each non-`AIR` block,
/// looks up its color via `lookup`, inserts (deduplicating) into `palette`,
/// and remaps the block to the newly assigned index (the "shrink" path
/// / LEGACY on-demand palette build).
fn shrink_remap(
    blocks: &[u8],
    lookup: impl Fn(u8) -> Option<(Rgba, bool)>,
    palette: &Rc<RefCell<crate::color::ColorPalette>>,
) -> Result<Vec<u8>> {
    let mut palette = palette.borrow_mut();
    blocks
        .iter()
        .map(|&b| {
            if b == AIR {
                Ok(AIR)
            } else {
                let (color, emissive) = lookup(b).ok_or_else(|| {
                    P3sError::BadChunk(format!("block index {b} has no source palette entry"))
                })?;
                palette.find_or_insert(color, emissive)
            }
        })
        .collect()
}

fn get_preview<R: Read>(mut source: R) -> Result<Vec<u8>> {
    let mut stream = ByteStream::new(&mut source);
    let total_size = read_header(&mut stream)?;
    let region_start = stream.position();

    while stream.position() - region_start < total_size {
        let id = stream.read_u8()?;
        if id == PREVIEW {
            let size = stream.read_u32()? as usize;
            return stream.read_bytes_vec(size);
        }
        chunk::skip_frame_body(&mut stream, id)?;
    }

    Err(P3sError::BadChunk("no PREVIEW chunk present".into()))
}

// --- write path ------------------------------------------------------

/// Pre-order-DFS-flattens `shape`'s tree, assigning each node a fresh
/// 1-based `shapeId` and its parent's already-assigned id (shapeId values
/// form a 1-based pre-order sequence).
fn flatten_for_write<'a>(shape: &'a Shape, parent_id: u16, next_id: &mut u16, out: &mut Vec<(u16, u16, &'a Shape)>) {
    let id = *next_id;
    *next_id += 1;
    out.push((id, parent_id, shape));
    for child in &shape.children {
        flatten_for_write(child, id, next_id, out);
    }
}

fn save_shape_to_buffer(
    shape: &Shape,
    artist_palette: Option<&crate::color::ColorPalette>,
    preview: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut sink = ByteSink::new();

    sink.write_bytes(MAGIC)?;
    sink.write_u32(FORMAT_VERSION)?;
    sink.write_u8(ALGO_ZIP)?;

    let total_size_at = sink.position();
    sink.write_u32(0)?;
    let region_start = sink.position();

    if let Some(preview) = preview {
        chunk::write_frame(&mut sink, PREVIEW, preview, false)?;
    }

    if let Some(artist_palette) = artist_palette {
        let mut palette_sink = ByteSink::new();
        artist_palette.write_current(&mut palette_sink)?;
        chunk::write_frame(&mut sink, PALETTE, &palette_sink.into_bytes(), true)?;
    }

    let mut flattened = Vec::new();
    let mut next_id = 1u16;
    flatten_for_write(shape, 0, &mut next_id, &mut flattened);

    for (shape_id, parent_id, shape) in flattened {
        let palette = shape.palette.borrow();
        let (canonical, permutation) = palette.canonical_order();
        let payload = shape_codec::encode(shape, shape_id, parent_id, Some(&canonical), &permutation)?;
        chunk::write_frame(&mut sink, SHAPE, &payload, true)?;
    }

    let total_size = (sink.position() - region_start) as u32;
    sink.patch_u32_at(total_size_at, total_size);

    Ok(sink.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorPalette;
    use crate::low_level::legacy_palettes::BuiltinLegacyPalettes;

    fn atlas() -> BuiltinLegacyPalettes {
        BuiltinLegacyPalettes
    }

    #[test]
    fn empty_scene_has_no_assets() {
        // Hand-crafted: magic, version 6, algo=none, totalSize=0, no chunks.
        let mut sink = ByteSink::new();
        sink.write_bytes(MAGIC).unwrap();
        sink.write_u32(FORMAT_VERSION).unwrap();
        sink.write_u8(ALGO_NONE).unwrap();
        sink.write_u32(0).unwrap();
        let buffer = sink.into_bytes();

        let assets = SceneCodec::load_assets(&buffer[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();
        assert!(assets.is_empty());
    }

    #[test]
    fn single_red_block_round_trips() {
        let mut shape = Shape::new((1, 1, 1));
        shape.blocks[0] = 0;
        shape.palette = Rc::new(RefCell::new(ColorPalette {
            colors: vec![Rgba::new(255, 0, 0, 255)],
            emissive: vec![false],
        }));

        let buffer = SceneCodec::save_shape_to_buffer(&shape, None, None).unwrap();
        let assets = SceneCodec::load_assets(&buffer[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();

        assert_eq!(assets.len(), 1);
        let Asset::Shape(loaded) = &assets[0] else { panic!("expected a shape asset") };
        assert_eq!(loaded.size, (1, 1, 1));
        assert_eq!(loaded.parent_id, 0);
        assert_eq!(loaded.shape_id, 1);
        assert_eq!(loaded.block_at(0, 0, 0), 0);
        assert_eq!(loaded.palette.borrow().colors[0], Rgba::new(255, 0, 0, 255));
    }

    #[test]
    fn parent_and_child_round_trip() {
        let mut root = Shape::new((2, 2, 2));
        for b in root.blocks.iter_mut() {
            *b = 0;
        }
        root.palette = Rc::new(RefCell::new(ColorPalette {
            colors: vec![Rgba::new(10, 10, 10, 255)],
            emissive: vec![false],
        }));

        let mut child = Shape::new((1, 1, 1));
        child.blocks[0] = 0;
        child.palette = Rc::new(RefCell::new(ColorPalette {
            colors: vec![Rgba::new(20, 20, 20, 255)],
            emissive: vec![false],
        }));
        child.transform.position = [3.0, 0.0, 0.0];
        child.transform.rotation = [0.0, std::f32::consts::FRAC_PI_2, 0.0];
        root.children.push(child);

        let buffer = SceneCodec::save_shape_to_buffer(&root, None, None).unwrap();
        let assets = SceneCodec::load_assets(&buffer[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();

        assert_eq!(assets.len(), 1);
        let Asset::Shape(loaded_root) = &assets[0] else { panic!("expected a shape asset") };
        assert_eq!(loaded_root.shape_id, 1);
        assert_eq!(loaded_root.children.len(), 1);
        let loaded_child = &loaded_root.children[0];
        assert_eq!(loaded_child.parent_id, 1);
        assert!((loaded_child.transform.rotation[1] - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn hidden_and_custom_collider_round_trip() {
        let mut shape = Shape::new((1, 1, 1));
        shape.blocks[0] = 0;
        shape.is_hidden_self = true;
        shape.collision_box = crate::transform::CollisionBox {
            min: [-1.0, -1.0, -1.0],
            max: [2.0, 2.0, 2.0],
        };

        let buffer = SceneCodec::save_shape_to_buffer(&shape, None, None).unwrap();
        let assets = SceneCodec::load_assets(&buffer[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();
        let Asset::Shape(loaded) = &assets[0] else { panic!("expected a shape asset") };
        assert!(loaded.is_hidden_self);
        assert_eq!(loaded.collision_box.min, [-1.0, -1.0, -1.0]);
        assert_eq!(loaded.collision_box.max, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn defaults_when_object_sub_chunks_absent() {
        // OBJECT_COLLISION_BOX/OBJECT_IS_HIDDEN are always written by this
        // crate's encoder, so the "absent" case is exercised by filtering
        // them out on read via AssetFilter.
        let mut shape = Shape::new((1, 1, 1));
        shape.blocks[0] = 0;
        shape.is_hidden_self = true;
        shape.collision_box = crate::transform::CollisionBox {
            min: [-1.0, -1.0, -1.0],
            max: [2.0, 2.0, 2.0],
        };

        let buffer = SceneCodec::save_shape_to_buffer(&shape, None, None).unwrap();
        let filter = AssetFilter::SHAPE | AssetFilter::PALETTE;
        let assets = SceneCodec::load_assets(&buffer[..], &atlas(), filter, &ShapeSettings::default()).unwrap();
        let Asset::Shape(loaded) = &assets[0] else { panic!("expected a shape asset") };
        assert!(!loaded.is_hidden_self);
        assert_eq!(loaded.collision_box, crate::transform::CollisionBox::DEFAULT);
    }

    #[test]
    fn get_preview_does_not_decompress_shape() {
        let mut shape = Shape::new((1, 1, 1));
        shape.blocks[0] = 0;
        let preview = vec![0xAB; 1234];

        let buffer = SceneCodec::save_shape_to_buffer(&shape, None, Some(&preview)).unwrap();
        let extracted = SceneCodec::get_preview(&buffer[..]).unwrap();
        assert_eq!(extracted, preview);
    }

    #[test]
    fn unknown_chunk_is_tolerated() {
        let mut shape = Shape::new((1, 1, 1));
        shape.blocks[0] = 0;
        let preview = vec![1u8; 16];

        let plain_buffer = SceneCodec::save_shape_to_buffer(&shape, None, Some(&preview)).unwrap();

        // Inject an id=99 V5-framed chunk right after the header.
        let header_len = MAGIC.len() + 4 + 1 + 4;
        let mut injected = Vec::new();
        injected.extend_from_slice(&plain_buffer[..header_len]);
        injected.push(99);
        injected.extend_from_slice(&5u32.to_le_bytes());
        injected.extend_from_slice(b"hello");
        injected.extend_from_slice(&plain_buffer[header_len..]);

        let injected_total_size = (plain_buffer.len() - header_len) as u32 + 5 + 1 + 4;
        injected[header_len - 4..header_len].copy_from_slice(&injected_total_size.to_le_bytes());

        let without = SceneCodec::load_assets(&plain_buffer[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();
        let with = SceneCodec::load_assets(&injected[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();

        assert_eq!(without.len(), with.len());
        let (Asset::Shape(a), Asset::Shape(b)) = (&without[0], &with[0]) else {
            panic!("expected shape assets")
        };
        assert_eq!(a.blocks, b.blocks);
    }

    #[test]
    fn legacy_mode_resolves_through_builtin_atlas() {
        let payload = {
            let mut sink = ByteSink::new();
            sink.write_u8(SHAPE_ID).unwrap();
            sink.write_u32(2).unwrap();
            sink.write_u16(1).unwrap();

            sink.write_u8(SHAPE_SIZE).unwrap();
            sink.write_u32(6).unwrap();
            sink.write_u16(1).unwrap();
            sink.write_u16(1).unwrap();
            sink.write_u16(1).unwrap();

            sink.write_u8(SHAPE_BLOCKS).unwrap();
            sink.write_u32(1).unwrap();
            sink.write_bytes(&[7]).unwrap();
            sink.into_bytes()
        };

        let mut sink = ByteSink::new();
        sink.write_bytes(MAGIC).unwrap();
        sink.write_u32(FORMAT_VERSION).unwrap();
        sink.write_u8(ALGO_NONE).unwrap();
        let total_size_at = sink.position();
        sink.write_u32(0).unwrap();
        let region_start = sink.position();
        chunk::write_frame(&mut sink, SHAPE, &payload, false).unwrap();
        let total_size = (sink.position() - region_start) as u32;
        sink.patch_u32_at(total_size_at, total_size);
        let buffer = sink.into_bytes();

        let assets = SceneCodec::load_assets(&buffer[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();
        let Asset::Shape(loaded) = &assets[0] else { panic!("expected a shape asset") };
        assert_eq!(loaded.palette.borrow().len(), 1);
        let expected = legacy_palettes::ios_item_editor_legacy(7);
        assert_eq!(loaded.palette.borrow().colors[0], expected);
        assert_eq!(loaded.block_at(0, 0, 0), 0);
    }

    #[test]
    fn single_mode_shares_file_palette_copy_per_shape() {
        let artist_palette = ColorPalette {
            colors: vec![Rgba::new(1, 2, 3, 255), Rgba::new(4, 5, 6, 255)],
            emissive: vec![false, true],
        };

        let mut sink = ByteSink::new();
        sink.write_bytes(MAGIC).unwrap();
        sink.write_u32(FORMAT_VERSION).unwrap();
        sink.write_u8(ALGO_ZIP).unwrap();
        let total_size_at = sink.position();
        sink.write_u32(0).unwrap();
        let region_start = sink.position();

        let mut palette_sink = ByteSink::new();
        artist_palette.write_current(&mut palette_sink).unwrap();
        chunk::write_frame(&mut sink, PALETTE, &palette_sink.into_bytes(), true).unwrap();

        let shape_payload = {
            let mut s = ByteSink::new();
            s.write_u8(SHAPE_ID).unwrap();
            s.write_u32(2).unwrap();
            s.write_u16(1).unwrap();
            s.write_u8(SHAPE_SIZE).unwrap();
            s.write_u32(6).unwrap();
            s.write_u16(1).unwrap();
            s.write_u16(1).unwrap();
            s.write_u16(1).unwrap();
            s.write_u8(SHAPE_BLOCKS).unwrap();
            s.write_u32(1).unwrap();
            s.write_bytes(&[1]).unwrap();
            s.into_bytes()
        };
        chunk::write_frame(&mut sink, SHAPE, &shape_payload, true).unwrap();

        let total_size = (sink.position() - region_start) as u32;
        sink.patch_u32_at(total_size_at, total_size);
        let buffer = sink.into_bytes();

        let assets = SceneCodec::load_assets(&buffer[..], &atlas(), AssetFilter::ANY, &ShapeSettings::default()).unwrap();
        assert_eq!(assets.len(), 1);
        let Asset::Shape(loaded) = &assets[0] else { panic!("expected a shape asset") };
        assert_eq!(loaded.palette.borrow().colors, artist_palette.colors);
        assert_eq!(block_count(loaded.size), 1);
    }
}
