//! Unpacking pipeline.
//!
//! Extracts an archive into an editable directory tree:
//!
//! 1. parse the index and group entries by part file, sorted by offset
//!    inside each group so every worker reads forward through its part
//! 2. one task per part group on a bounded pool, smaller than the packing
//!    pool since each task pins an open file handle for its whole part
//! 3. per entry: read, unwrap the compression envelope, resolve a display
//!    name from the reverse name table (or synthesize a `$HEX8` fallback,
//!    with a best-effort extension guessed from the payload's leading
//!    bytes), and run the transformer chain
//! 4. manifest records accumulate through a shared sink and `list.xml`
//!    is written once after every worker has joined

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use ipfb_common::file_id::to_hex8;
use ipfb_manifest::{Manifest, ManifestSink};
use ipfb_pak::{envelope, NameTable, PakArchive};
use ipfb_transform::{ExtractContext, Extracted, Registry};

use crate::{Error, Result};

/// Upper bound on unpacking workers (one open part handle each).
const MAX_UNPACK_WORKERS: usize = 8;

/// Statistics from an unpack run.
#[derive(Debug, Clone, Copy)]
pub struct UnpackStats {
    /// Entries extracted.
    pub entries: usize,
    /// Part files read.
    pub parts: usize,
    /// Entries whose name came from the name table (the rest got `$HEX8`
    /// fallbacks).
    pub named: usize,
}

/// Unpack `<pak_path>` into `out_dir`.
///
/// `progress` receives `(processed, total)` entry counts.
pub fn unpack_archive<F>(
    pak_path: &Path,
    out_dir: &Path,
    registry: &Registry,
    mut progress: F,
) -> Result<UnpackStats>
where
    F: FnMut(usize, usize) + Send,
{
    let archive = PakArchive::open(pak_path)?;
    let names = NameTable::load_for(pak_path);
    let groups = archive.part_groups();
    let total = archive.entry_count();

    std::fs::create_dir_all(out_dir)?;

    let sink = ManifestSink::new(Manifest::new());
    let done = AtomicUsize::new(0);
    let named = AtomicUsize::new(0);
    let progress_slot = Mutex::new(&mut progress);

    let workers = (crate::pack::available_parallelism() / 2)
        .max(1)
        .min(MAX_UNPACK_WORKERS)
        .min(groups.len().max(1));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Pool(e.to_string()))?;

    pool.install(|| {
        groups.par_iter().try_for_each(|(part, entries)| -> Result<()> {
            let mut reader = archive.open_part(*part)?;
            let ctx = ExtractContext {
                out_root: out_dir,
                manifest: &sink,
            };

            for entry in entries {
                let stored = reader.read_entry(entry)?;
                let payload = envelope::decode(&stored)?;

                let name = match names.get(entry.hash) {
                    Some(known) => {
                        named.fetch_add(1, Ordering::Relaxed);
                        known.to_string()
                    }
                    None => fallback_name(entry.hash, &payload),
                };

                match registry.extract(&payload, &name, &ctx)? {
                    Some(Extracted::Replace { name, data }) => ctx.write_file(&name, &data)?,
                    Some(Extracted::Handled) => {}
                    None => ctx.write_file(&name, &payload)?,
                }

                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % 64 == 0 || n == total {
                    if let Some(mut p) = progress_slot.try_lock() {
                        (*p)(n, total);
                    }
                }
            }

            Ok(())
        })
    })?;

    drop(progress_slot);

    // Read access to the manifest only happens after the pool has joined.
    let manifest = sink.into_inner();
    manifest.save(&out_dir.join("list.xml"))?;
    progress(total, total);

    Ok(UnpackStats {
        entries: total,
        parts: groups.len(),
        named: named.load(Ordering::Relaxed),
    })
}

/// Hash-coded fallback name for entries absent from the name table.
fn fallback_name(hash: u32, payload: &[u8]) -> String {
    let mut name = format!("${}", to_hex8(hash));
    if let Some(ext) = guess_extension(payload) {
        name.push('.');
        name.push_str(&ext);
    }
    name
}

/// Guess an extension from the payload's first bytes.
///
/// Display aid only: many formats open with an ASCII tag, so if at least
/// three of the first four non-NUL bytes are alphanumeric they become the
/// extension. Never correctness-bearing - compressed garbage can pass.
fn guess_extension(payload: &[u8]) -> Option<String> {
    if payload.len() < 3 {
        return None;
    }

    let mut ext = String::new();
    for &b in payload.iter().take(4) {
        if b == 0 {
            continue;
        }
        if !b.is_ascii_alphanumeric() {
            return None;
        }
        ext.push(b as char);
    }

    (ext.len() >= 3).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_extension() {
        assert_eq!(guess_extension(b"LSTA\x00\x00\x00\x02").as_deref(), Some("LSTA"));
        assert_eq!(guess_extension(b"T32 rest").as_deref(), None); // space
        assert_eq!(guess_extension(b"T32\x00rest").as_deref(), Some("T32"));
        assert_eq!(guess_extension(b"\x89PNG").as_deref(), None);
        assert_eq!(guess_extension(b"ab").as_deref(), None);
    }

    #[test]
    fn test_fallback_name() {
        assert_eq!(
            fallback_name(0xAABBCCDD, b"LSTA\x00\x00\x00\x02"),
            "$AABBCCDD.LSTA"
        );
        assert_eq!(fallback_name(0x12, b"\x89PNG"), "$00000012");
    }
}
