//! The [`Shape`] data model and the settings that tune how blocks are
//! materialized while loading one.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::color::ColorPalette;
use crate::low_level::chunk_ids::AIR;
use crate::transform::{CollisionBox, Transform};

/// One baked vertex-lighting sample per block cell. The wire layout isn't
/// pinned down by the distillation this crate was built from; a 4-byte RGB
/// tint plus an ambient-occlusion channel is the conventional shape for
/// baked voxel lighting and is what this crate reads/writes (documented as
/// an Open Question resolution in DESIGN.md).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BakedLight {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub ambient_occlusion: u8,
}

impl BakedLight {
    pub const SIZE: usize = 4;
}

/// Tunes how `SceneCodec::load_assets` materializes shapes.
#[derive(Clone, Copy, Debug)]
pub struct ShapeSettings {
    /// Whether loaded shapes are marked mutable (editable in place) versus
    /// read-only/frozen. Purely informational metadata carried onto the
    /// resulting [`Shape`]; the codec always produces an owned, editable
    /// block buffer either way.
    pub mutable_shape: bool,

    /// Whether a `SHAPE_BAKED_LIGHTING` sub-chunk's data should be
    /// materialized onto the resulting `Shape`. When `false`, baked
    /// lighting present in the file is parsed (to stay positioned
    /// correctly in the sub-chunk stream) but dropped rather than
    /// retained, saving the allocation for callers that don't need it.
    pub materialize_baked_lighting: bool,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        ShapeSettings {
            mutable_shape: true,
            materialize_baked_lighting: true,
        }
    }
}

/// A voxel object: grid of palette indices, metadata, and child shapes.
/// Parent/child ownership is the tree link (`children`); `parent_id` is
/// the non-owning, on-demand-resolved back-reference the wire format
/// actually stores.
#[derive(Clone, Debug)]
pub struct Shape {
    /// 1-based id, unique within the file this shape was loaded from.
    pub shape_id: u16,

    /// 0 = root. Retained from the source file for inspection; a fresh
    /// value is assigned at save time regardless.
    pub parent_id: u16,

    /// Bounding-box size in blocks: `(w, h, z)`.
    pub size: (u16, u16, u16),

    /// Dense `w*h*d` array of palette indices, x-major then y then z.
    /// `AIR` marks an empty cell.
    pub blocks: Vec<u8>,

    /// This shape's palette. Shared (via `Rc`) with the root shape's
    /// palette in MULTI mode when this shape has no `SHAPE_PALETTE` of its
    /// own; otherwise exclusively owned.
    pub palette: Rc<RefCell<ColorPalette>>,

    /// Opaque UTF-8 name, at most 255 bytes on the wire.
    pub name: Option<String>,

    /// Local transform relative to the parent.
    pub transform: Transform,

    /// Pivot point, in the shape's minimum-AABB-corner frame.
    pub pivot: [f32; 3],

    /// Custom collision box; defaults to `CollisionBox::DEFAULT` when the
    /// file has no `OBJECT_COLLISION_BOX` sub-chunk.
    pub collision_box: CollisionBox,

    /// Whether this shape itself (not its descendants) is hidden.
    pub is_hidden_self: bool,

    /// Named points of interest, in the shape's minimum-AABB-corner frame.
    pub points: BTreeMap<String, [f32; 3]>,

    /// Named point rotations (Euler XYZ radians), unaffected by AABB
    /// normalization.
    pub point_rotations: BTreeMap<String, [f32; 3]>,

    /// One lighting sample per block cell, if present and materialized.
    pub baked_lighting: Option<Vec<BakedLight>>,

    /// Whether this shape was produced with `mutable_shape = true`.
    pub is_mutable: bool,

    /// Child shapes, owned by their parent.
    pub children: Vec<Shape>,
}

impl Shape {
    /// Creates an empty shape of the given size with a fresh, empty,
    /// exclusively-owned palette. Used both as the in-progress state while
    /// a `SHAPE` envelope is being read and as a starting point for
    /// building scenes to save.
    pub fn new(size: (u16, u16, u16)) -> Self {
        Shape {
            shape_id: 0,
            parent_id: 0,
            size,
            blocks: vec![AIR; block_count(size)],
            palette: Rc::new(RefCell::new(ColorPalette::new())),
            name: None,
            transform: Transform::default(),
            pivot: [0.0, 0.0, 0.0],
            collision_box: CollisionBox::default(),
            is_hidden_self: false,
            points: BTreeMap::new(),
            point_rotations: BTreeMap::new(),
            baked_lighting: None,
            is_mutable: true,
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        block_count(self.size)
    }

    /// Index into `blocks` for cell `(x, y, z)`, x-major then y then z
    /// (the `SHAPE_BLOCKS` layout).
    #[inline]
    pub fn block_index(&self, x: u16, y: u16, z: u16) -> usize {
        let (w, h, _d) = self.size;
        x as usize + w as usize * (y as usize + h as usize * z as usize)
    }

    pub fn block_at(&self, x: u16, y: u16, z: u16) -> u8 {
        self.blocks[self.block_index(x, y, z)]
    }

    /// The minimum occupied AABB corner, or `None` if every cell is `AIR`.
    pub fn occupied_aabb(&self) -> Option<([u16; 3], [u16; 3])> {
        let (w, h, d) = self.size;
        let mut min = [u16::MAX; 3];
        let mut max = [0u16; 3];
        let mut any = false;

        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    if self.block_at(x, y, z) != AIR {
                        any = true;
                        min[0] = min[0].min(x);
                        min[1] = min[1].min(y);
                        min[2] = min[2].min(z);
                        max[0] = max[0].max(x);
                        max[1] = max[1].max(y);
                        max[2] = max[2].max(z);
                    }
                }
            }
        }

        if !any {
            return None;
        }
        Some((min, [max[0] + 1, max[1] + 1, max[2] + 1]))
    }
}

#[inline]
pub fn block_count(size: (u16, u16, u16)) -> usize {
    size.0 as usize * size.1 as usize * size.2 as usize
}
