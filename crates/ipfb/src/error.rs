//! Error type for the orchestration crate.

use thiserror::Error;

/// Errors surfaced by pack/unpack runs.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container or envelope error.
    #[error("{0}")]
    Pak(#[from] ipfb_pak::Error),

    /// Manifest error.
    #[error("{0}")]
    Manifest(#[from] ipfb_manifest::ManifestError),

    /// Transformer error.
    #[error("{0}")]
    Transform(#[from] ipfb_transform::Error),

    /// Worker pool could not be built.
    #[error("worker pool error: {0}")]
    Pool(String),
}

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;
