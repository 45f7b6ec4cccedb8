//! IPFB archive container format.
//!
//! An IPFB archive is a `.pak` index file (`"IPFB"` magic, big-endian,
//! hash-sorted 12-byte records) backed by one or more flat part files
//! holding the payloads with 2048-byte alignment between entries. This
//! crate owns everything about that container:
//!
//! - [`format`] - on-disk structs, constants, offset encoding
//! - [`envelope`] - the Z1 per-entry compression envelope
//! - [`PakArchive`] / [`PartReader`] - index parsing and payload reads
//! - [`write_archive`] - sorted, aligned, multi-part archive writing
//! - [`NameTable`] - the reverse hash -> name sidecar table
//!
//! Payload *meaning* lives elsewhere; this crate never inspects entry
//! contents beyond the envelope magic.

mod error;
mod names;
mod read;
mod write;

pub mod envelope;
pub mod format;

pub use error::{Error, Result};
pub use format::{IndexEntry, MAX_PARTS, PAD_UNIT, PART_LIMIT};
pub use names::NameTable;
pub use read::{PakArchive, PartReader};
pub use write::write_archive;
