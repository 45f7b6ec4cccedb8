//! Common utilities for the IPFB toolkit.
//!
//! This crate provides the foundational pieces shared by all IPFB crates:
//!
//! - [`BinaryReader`] - Zero-copy big-endian reading from byte slices
//! - [`file_id`] - The content-addressing FileID hash used as the archive key
//!
//! Everything in the IPFB container family is big-endian, so the reader
//! defaults to big-endian reads throughout.

mod error;
mod reader;

pub mod file_id;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export memchr for fast byte searching (name-table string pools)
pub use memchr;
