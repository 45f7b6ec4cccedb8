//! IPFB archive writer.
//!
//! Takes an already-deduplicated hash -> payload map, streams the payloads
//! into part files with 2048-byte alignment padding between entries, and
//! writes the sorted index. Consumers binary-search the index, so hashes
//! are sorted ascending before anything touches disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use rustc_hash::FxHashMap;

use crate::format::{self, IndexEntry, MAX_PARTS, PAD_UNIT, PAK_MAGIC, PART_LIMIT};
use crate::{Error, Result};

/// Write a complete archive (`.pak` index plus part files).
///
/// Returns the index that was written, in hash order.
pub fn write_archive(payloads: &FxHashMap<u32, Vec<u8>>, pak_path: &Path) -> Result<Vec<IndexEntry>> {
    write_archive_with_limit(payloads, pak_path, PART_LIMIT)
}

/// Writer body with an injectable part limit so tests can exercise part
/// rollover without producing 256 MiB files. Production callers always go
/// through [`write_archive`].
pub(crate) fn write_archive_with_limit(
    payloads: &FxHashMap<u32, Vec<u8>>,
    pak_path: &Path,
    part_limit: u32,
) -> Result<Vec<IndexEntry>> {
    let mut hashes: Vec<u32> = payloads.keys().copied().collect();
    hashes.sort_unstable();

    let mut entries = Vec::with_capacity(hashes.len());

    let mut part: u32 = 0;
    let mut pos: u32 = 0;
    let mut out = part_writer(pak_path, part)?;

    for (i, &hash) in hashes.iter().enumerate() {
        let data = &payloads[&hash];
        let size = u32::try_from(data.len())
            .ok()
            .filter(|&s| s <= part_limit)
            .ok_or(Error::EntryTooLarge { hash })?;

        if pos >= part_limit || part_limit - pos < size {
            out.flush()?;
            part += 1;
            if part >= MAX_PARTS {
                return Err(Error::TooManyParts { max: MAX_PARTS });
            }
            out = part_writer(pak_path, part)?;
            pos = 0;
        }

        entries.push(IndexEntry {
            hash,
            offset: format::encode_offset(part, pos),
            size,
        });

        out.write_all(data)?;
        pos += size;

        // Pad so the next entry starts on a 2048-byte boundary; the final
        // entry of the whole archive is left unpadded.
        if i < hashes.len() - 1 {
            let pad = (PAD_UNIT - (pos & (PAD_UNIT - 1))) & (PAD_UNIT - 1);
            if pad != 0 {
                out.write_all(&vec![0u8; pad as usize])?;
                pos += pad;
            }
        }
    }

    out.flush()?;
    drop(out);

    write_index(pak_path, &entries)?;
    Ok(entries)
}

fn part_writer(pak_path: &Path, part: u32) -> Result<BufWriter<File>> {
    let path = format::part_path(pak_path, part);
    Ok(BufWriter::with_capacity(1 << 20, File::create(path)?))
}

fn write_index(pak_path: &Path, entries: &[IndexEntry]) -> Result<()> {
    let mut out = BufWriter::new(File::create(pak_path)?);

    out.write_all(PAK_MAGIC)?;
    out.write_u32::<BigEndian>(entries.len() as u32)?;
    out.write_u32::<BigEndian>(PAD_UNIT)?;
    out.write_u32::<BigEndian>(PART_LIMIT)?;

    for entry in entries {
        out.write_u32::<BigEndian>(entry.hash)?;
        out.write_u32::<BigEndian>(entry.offset)?;
        out.write_u32::<BigEndian>(entry.size)?;
    }

    out.flush()?;
    Ok(())
}
