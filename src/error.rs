//! Error types for NIfTI header decoding and encoding.

use thiserror::Error;

/// Errors produced while reading or writing NIfTI headers.
#[derive(Debug, Error)]
pub enum Error {
    /// `sizeof_hdr` (or the magic string) matched in neither byte order.
    #[error("not a NIfTI header (leading bytes {0:02x?})")]
    NotNiftiHeader([u8; 4]),

    /// Extension chain is malformed: bad size, overflow past `vox_offset`,
    /// or a payload that does not fit its declared size.
    #[error("invalid NIfTI extension: {0}")]
    InvalidExtension(String),

    /// A scalar read or write fell outside the buffer.
    #[error("access of {len} bytes at offset {offset} is out of bounds for a {size}-byte buffer")]
    OutOfBounds {
        /// Requested start offset.
        offset: usize,
        /// Requested length in bytes.
        len: usize,
        /// Actual buffer size.
        size: usize,
    },

    /// Header dimensions do not describe a valid voxel byte range.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Underlying I/O failure when loading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Gzip stream could not be inflated.
    #[error("decompression failed: {0}")]
    Decompression(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
