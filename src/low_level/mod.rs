//! Low-level wire-format primitives: typed byte streams/sinks, chunk
//! framing, chunk-id constants, and the built-in legacy palettes. You
//! generally don't need to use this module directly; [`crate::SceneCodec`]
//! is the ergonomic entry point.

pub mod byte_sink;
pub mod byte_stream;
pub mod chunk;
pub mod chunk_ids;
pub mod legacy_palettes;

pub use self::byte_sink::ByteSink;
pub use self::byte_stream::ByteStream;
