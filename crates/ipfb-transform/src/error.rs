//! Error types for the transform crate.

use thiserror::Error;

/// Errors raised by transformers and the registry.
///
/// A transformer that cannot handle an input is expected to say so through
/// its capability predicate; once `extract`/`pack` runs, failures are fatal
/// to the whole operation.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] ipfb_common::Error),

    /// Manifest error.
    #[error("{0}")]
    Manifest(#[from] ipfb_manifest::ManifestError),

    /// A transformer's own sub-format is corrupt.
    #[error("{transformer}: {message}")]
    Format {
        transformer: &'static str,
        message: String,
    },

    /// Image decode/encode failure.
    #[error("image error: {0}")]
    Image(String),

    /// `pack` called on a transformer that does not pack.
    #[error("transformer {0} does not support packing")]
    NotPackable(&'static str),

    /// A filter token referenced a transformer that does not exist.
    #[error("unknown transformer in filter: {0}")]
    UnknownTransformer(String),
}

impl Error {
    /// Shorthand for a sub-format corruption error.
    pub fn format(transformer: &'static str, message: impl ToString) -> Self {
        Error::Format {
            transformer,
            message: message.to_string(),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, Error>;
