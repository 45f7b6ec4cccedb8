//! Error types for the pak crate.

use thiserror::Error;

/// Errors that can occur when working with IPFB archives.
///
/// Corruption inside the container or envelope layer is never recovered
/// from: bounds violations, truncated indices, and bad envelopes all abort
/// the whole operation.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] ipfb_common::Error),

    /// Archive header does not start with "IPFB".
    #[error("invalid archive magic: expected \"IPFB\", got {actual:?}")]
    InvalidMagic { actual: Vec<u8> },

    /// Archive file is too short to hold its declared index.
    #[error("archive index truncated: {declared} entries declared, {available} bytes available")]
    TruncatedIndex { declared: u32, available: usize },

    /// An index entry points past the end of its part file.
    #[error(
        "entry {hash:#010x} out of bounds: offset {offset} + size {size} exceeds part length {part_len}"
    )]
    EntryOutOfBounds {
        hash: u32,
        offset: u64,
        size: u64,
        part_len: u64,
    },

    /// A single payload cannot fit inside one part file.
    #[error("entry {hash:#010x} is larger than the part size limit")]
    EntryTooLarge { hash: u32 },

    /// The archive would need more part files than the offset encoding allows.
    #[error("archive would span more than {max} part files")]
    TooManyParts { max: u32 },

    /// The Z1 compression envelope is corrupt.
    #[error("compression envelope corrupt: {0}")]
    Envelope(String),
}

/// Result type for pak operations.
pub type Result<T> = std::result::Result<T, Error>;
