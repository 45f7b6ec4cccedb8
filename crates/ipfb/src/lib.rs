//! IPFB game-asset archive toolkit.
//!
//! This crate ties the IPFB library ecosystem together and owns the two
//! orchestrators:
//!
//! - [`ipfb_common`] - binary reading and the FileID content hash
//! - [`ipfb_pak`] - the container format and compression envelope
//! - [`ipfb_manifest`] - the `list.xml` sidecar ledger
//! - [`ipfb_transform`] - the transformer registry and asset codecs
//! - [`pack_directory`] / [`unpack_archive`] - the concurrent pipelines
//!
//! # Example
//!
//! ```no_run
//! use ipfb::prelude::*;
//!
//! let registry = Registry::standard();
//! let stats = unpack_archive(
//!     "data/game.pak".as_ref(),
//!     "out/game".as_ref(),
//!     &registry,
//!     |_, _| {},
//! )?;
//! println!("extracted {} entries from {} parts", stats.entries, stats.parts);
//! # Ok::<(), ipfb::Error>(())
//! ```

// Re-export all sub-crates
pub use ipfb_common as common;
pub use ipfb_manifest as manifest;
pub use ipfb_pak as pak;
pub use ipfb_transform as transform;

mod error;
mod pack;
mod unpack;

pub use error::{Error, Result};
pub use pack::{pack_directory, PackStats};
pub use unpack::{unpack_archive, UnpackStats};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{pack_directory, unpack_archive, PackStats, UnpackStats};
    pub use ipfb_common::file_id::file_id;
    pub use ipfb_manifest::{Manifest, Record, Section};
    pub use ipfb_pak::{NameTable, PakArchive};
    pub use ipfb_transform::{Filter, Registry};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
