//! IPFB archive reader.
//!
//! The `.pak` index is memory-mapped and parsed once; payloads are then
//! read from the part files. Each part is opened exactly once and read in
//! ascending offset order, which keeps extraction sequential on disk.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use ipfb_common::BinaryReader;

use crate::format::{self, IndexEntry, RawIndexEntry, HEADER_SIZE, PAK_MAGIC};
use crate::{Error, Result};

/// A parsed IPFB archive index.
pub struct PakArchive {
    mmap: Mmap,
    pak_path: PathBuf,
    entries: Vec<IndexEntry>,
}

impl PakArchive {
    /// Open and parse a `.pak` index file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let entries = Self::parse_index(&mmap)?;

        Ok(Self {
            mmap,
            pak_path: path.to_path_buf(),
            entries,
        })
    }

    /// Number of live index entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// The parsed index, in on-disk (hash-ascending) order.
    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Path of the `.pak` file this archive was opened from.
    #[inline]
    pub fn pak_path(&self) -> &Path {
        &self.pak_path
    }

    /// Group entries by part file, each group sorted by inner offset.
    ///
    /// Groups come back ordered by part index so extraction order is
    /// deterministic regardless of index layout.
    pub fn part_groups(&self) -> Vec<(u32, Vec<IndexEntry>)> {
        let mut groups: Vec<(u32, Vec<IndexEntry>)> = Vec::new();
        for entry in &self.entries {
            let part = entry.part_index();
            match groups.iter_mut().find(|(p, _)| *p == part) {
                Some((_, list)) => list.push(*entry),
                None => groups.push((part, vec![*entry])),
            }
        }
        groups.sort_by_key(|(part, _)| *part);
        for (_, list) in &mut groups {
            list.sort_by_key(IndexEntry::inner_offset);
        }
        groups
    }

    /// Open one part file for sequential entry reads.
    pub fn open_part(&self, part: u32) -> Result<PartReader> {
        PartReader::open(&format::part_path(&self.pak_path, part))
    }

    fn parse_index(data: &[u8]) -> Result<Vec<IndexEntry>> {
        let mut reader = BinaryReader::new(data);

        let magic = reader.peek_bytes(4).map_err(|_| Error::InvalidMagic {
            actual: data.to_vec(),
        })?;
        if magic != PAK_MAGIC {
            return Err(Error::InvalidMagic {
                actual: magic.to_vec(),
            });
        }
        reader.advance(4);

        let count = reader.read_u32()?;
        // Padding unit and part limit are fixed constants; their stored
        // values are not load-bearing for reading.
        reader.seek(HEADER_SIZE);

        if data.len() < HEADER_SIZE + count as usize * 12 {
            return Err(Error::TruncatedIndex {
                declared: count,
                available: data.len().saturating_sub(HEADER_SIZE),
            });
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let raw: RawIndexEntry = reader.read_struct()?;
            let entry = IndexEntry::from(raw);
            // A zero hash marks the end of a short index.
            if entry.hash == 0 {
                break;
            }
            entries.push(entry);
        }

        Ok(entries)
    }
}

impl std::fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("pak_path", &self.pak_path)
            .field("entries", &self.entries.len())
            .field("index_bytes", &self.mmap.len())
            .finish()
    }
}

/// One open part file, handing out entry payloads.
///
/// Hold one of these per worker; reads against a sorted group are monotonic
/// seeks forward.
pub struct PartReader {
    file: File,
    len: u64,
}

impl PartReader {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Length of the underlying part file.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the part file is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read exactly one entry's stored bytes.
    ///
    /// An entry reaching past the end of the part is fatal corruption, not
    /// a recoverable condition.
    pub fn read_entry(&mut self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let offset = entry.inner_offset() as u64;
        let size = entry.size as u64;

        if offset + size > self.len {
            return Err(Error::EntryOutOfBounds {
                hash: entry.hash,
                offset,
                size,
                part_len: self.len,
            });
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; entry.size as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
