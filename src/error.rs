//! Error type returned by every fallible operation in this crate.

use std::io;

/// Everything that can go wrong while reading or writing a P3S scene.
#[derive(thiserror::Error, Debug)]
pub enum P3sError {
    /// The stream ended in the middle of a field, chunk, or sub-chunk.
    #[error("truncated stream")]
    Truncated,

    /// The file-level magic bytes did not match.
    #[error("bad magic bytes")]
    BadMagic,

    /// `formatVersion` was not 6.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    /// The scene-level compression algorithm byte, or a chunk's compression
    /// flag, was not recognized, or zlib itself failed.
    #[error("bad compression: {0}")]
    BadCompression(String),

    /// A required sub-chunk was missing, or a field's declared size was
    /// self-inconsistent (e.g. blocks not matching `w*h*d`).
    #[error("bad chunk: {0}")]
    BadChunk(String),

    /// A buffer of the requested size could not be allocated.
    #[error("allocation failed")]
    AllocationFailed,

    /// Propagated I/O error from the underlying stream.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, P3sError>;

impl P3sError {
    /// Maps a short read (`UnexpectedEof`) to the domain-specific
    /// `Truncated` variant; other I/O errors pass through as `Io`.
    pub(crate) fn from_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            P3sError::Truncated
        } else {
            P3sError::Io(err)
        }
    }
}
