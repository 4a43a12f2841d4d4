//! Chunk and sub-chunk id constants.
//!
//! These replace what the original format's C sources keep as preprocessor
//! `#define`s with a single module-level constant table.

/// Scene-level chunk ids, recognized directly inside the chunk region.
pub const PREVIEW: u8 = 1;
pub const PALETTE_LEGACY: u8 = 2;
pub const SHAPE: u8 = 3;
pub const PALETTE_ID: u8 = 15;
pub const PALETTE: u8 = 16;

/// Sub-chunk ids, recognized only inside a `SHAPE` envelope.
pub const SHAPE_SIZE: u8 = 4;
pub const SHAPE_BLOCKS: u8 = 5;
pub const SHAPE_POINT: u8 = 6;
pub const SHAPE_BAKED_LIGHTING: u8 = 7;
pub const SHAPE_POINT_ROTATION: u8 = 8;
pub const SHAPE_ID: u8 = 17;
pub const SHAPE_NAME: u8 = 18;
pub const SHAPE_PARENT_ID: u8 = 19;
pub const SHAPE_TRANSFORM: u8 = 20;
pub const SHAPE_PIVOT: u8 = 21;
pub const SHAPE_PALETTE: u8 = 22;
pub const OBJECT_COLLISION_BOX: u8 = 23;
pub const OBJECT_IS_HIDDEN: u8 = 24;

/// Highest sub-chunk id currently defined, for sanity-checking new ids.
pub const MAX_SUB_CHUNK_ID: u8 = OBJECT_IS_HIDDEN;

/// Sentinel block index meaning "no block occupies this cell".
pub const AIR: u8 = 255;

/// Fixed ASCII magic tag at the start of every P3S file.
pub const MAGIC: &[u8; 4] = b"3ZH6";

/// Current format version, the only one this crate reads or writes.
pub const FORMAT_VERSION: u32 = 6;
