//! On-disk layout of the IPFB container.
//!
//! A container is a `.pak` index file plus one or more flat part files
//! (`.p00`, `.p01`, ...). The index is a fixed header followed by 12-byte
//! records sorted ascending by hash; consumers binary-search it, so the
//! ordering is part of the format. All integers are big-endian.
//!
//! An entry's `offset` packs two values: the top 4 bits select the part
//! file, the low 28 bits are the byte offset inside that part. That caps a
//! part at 256 MiB and an archive at 16 parts.

use std::path::{Path, PathBuf};

use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Archive magic bytes.
pub const PAK_MAGIC: &[u8; 4] = b"IPFB";

/// Entries are padded so each one (except the last) ends on this boundary.
pub const PAD_UNIT: u32 = 0x800;

/// Maximum size of one part file; also the inner-offset encoding range.
pub const PART_LIMIT: u32 = 0x1000_0000;

/// Maximum number of part files the 4-bit part index can address.
pub const MAX_PARTS: u32 = 16;

/// Size of the `.pak` header preceding the index records.
pub const HEADER_SIZE: usize = 16;

/// Mask extracting the inner offset from an encoded offset.
pub const INNER_OFFSET_MASK: u32 = 0x0FFF_FFFF;

/// One index record as stored on disk.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RawIndexEntry {
    /// FileID of the entry.
    pub hash: U32<BigEndian>,
    /// Encoded offset: part index in the top 4 bits, inner offset below.
    pub offset: U32<BigEndian>,
    /// Stored payload size in bytes.
    pub size: U32<BigEndian>,
}

/// A decoded index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// FileID of the entry.
    pub hash: u32,
    /// Encoded offset (see [`encode_offset`]).
    pub offset: u32,
    /// Stored payload size in bytes.
    pub size: u32,
}

impl IndexEntry {
    /// Which part file holds this entry.
    #[inline]
    pub const fn part_index(&self) -> u32 {
        self.offset >> 28
    }

    /// Byte offset inside the part file.
    #[inline]
    pub const fn inner_offset(&self) -> u32 {
        self.offset & INNER_OFFSET_MASK
    }
}

impl From<RawIndexEntry> for IndexEntry {
    fn from(raw: RawIndexEntry) -> Self {
        Self {
            hash: raw.hash.get(),
            offset: raw.offset.get(),
            size: raw.size.get(),
        }
    }
}

/// Pack a part index and inner offset into the on-disk offset encoding.
#[inline]
pub const fn encode_offset(part: u32, inner: u32) -> u32 {
    (part << 28) | (inner & INNER_OFFSET_MASK)
}

/// Path of the part file with the given index, next to the `.pak`.
pub fn part_path(pak_path: &Path, part: u32) -> PathBuf {
    let stem = pak_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    pak_path.with_file_name(format!("{stem}.p{part:02}"))
}
