//! Reader and writer for the P3S (`.3zh`) voxel scene format, version 6.
//!
//! A P3S file is a self-describing, chunked, optionally zlib-compressed
//! container holding a hierarchy of voxel shapes, each with its own color
//! palette, a grid of block indices, named points, a local transform
//! relative to its parent, an optional custom collision box, optional
//! baked vertex lighting, and an optional PNG preview image.
//!
//! [`SceneCodec`] is the entry point most callers want:
//!
//! ```no_run
//! use p3s::{AssetFilter, BuiltinLegacyPalettes, SceneCodec, ShapeSettings};
//!
//! # fn example() -> p3s::Result<()> {
//! let bytes = std::fs::read("example.3zh")?;
//! let _assets = SceneCodec::load_assets(
//!     &bytes[..],
//!     &BuiltinLegacyPalettes,
//!     AssetFilter::ANY,
//!     &ShapeSettings::default(),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! `low_level` exposes the wire-format primitives (`ByteStream`/`ByteSink`,
//! chunk framing, chunk-id constants, the built-in legacy palettes) that
//! back this crate's own encoder/decoder; most callers won't need it
//! directly.

pub mod color;
pub mod error;
pub mod low_level;
pub mod scene;
pub mod shape;
pub mod shape_codec;
pub mod transform;

pub use color::{ColorPalette, Rgba};
pub use error::{P3sError, Result};
pub use low_level::legacy_palettes::{BuiltinLegacyPalettes, LegacyPaletteId, LegacyPaletteSource};
pub use scene::{Asset, AssetFilter, SceneCodec};
pub use shape::{BakedLight, Shape, ShapeSettings};
pub use transform::{CollisionBox, Transform};
