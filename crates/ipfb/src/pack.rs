//! Packing pipeline.
//!
//! Builds an archive from an editable directory tree:
//!
//! 1. load the `list.xml` manifest and replay the composite assets it
//!    declares (atlas and effect containers bundling sub-textures) plus
//!    standalone textures - these are built from manifest records and the
//!    sidecar images, not from packed files on disk
//! 2. enumerate the remaining tree, excluding the manifest itself, the
//!    files steps 1-2 already produced, and the images those builds
//!    consumed (a glyph PNG inside a font atlas is not also packed
//!    standalone)
//! 3. run the transformer chain over the remaining files on a bounded
//!    worker pool; each fixed-size chunk accumulates into its own buffer,
//!    so the hot path takes no lock, and one sequential fold merges the
//!    buffers afterwards
//! 4. merge everything into one hash -> bytes map - on a hash collision
//!    the last asset merged wins, by contract, not by accident
//! 5. wrap eligible payloads in the compression envelope and write the
//!    container

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use walkdir::WalkDir;

use ipfb_common::file_id::file_id;
use ipfb_manifest::{Manifest, Section};
use ipfb_pak::envelope;
use ipfb_transform::{atlas, build_texture_from_record, effect, PackContext, Registry};

use crate::{Error, Result};

/// Upper bound on packing workers.
const MAX_PACK_WORKERS: usize = 12;

/// Statistics from a pack run.
#[derive(Debug, Clone, Copy)]
pub struct PackStats {
    /// Entries written to the archive index.
    pub entries: usize,
    /// Files fed through the transformer chain.
    pub files: usize,
    /// Assets rebuilt from manifest records (composites + standalone
    /// textures).
    pub replayed: usize,
}

/// Pack a directory tree into `<pak_path>` (+ its part files).
///
/// `progress` receives `(processed, total)` for the transformer stage.
pub fn pack_directory<F>(
    input: &Path,
    pak_path: &Path,
    registry: &Registry,
    mut progress: F,
) -> Result<PackStats>
where
    F: FnMut(usize, usize) + Send,
{
    let manifest = Manifest::load(&input.join("list.xml"))?;
    let ctx = PackContext::from_manifest(&manifest);

    // Names produced by manifest replay, and sidecar images consumed by it;
    // both are excluded from the tree walk.
    let mut built: FxHashSet<String> = FxHashSet::default();
    let mut managed: FxHashSet<String> = FxHashSet::default();

    let mut fixed: Vec<(u32, Vec<u8>)> = Vec::new();

    for (name, bytes) in atlas::build_all(&manifest, input)?
        .into_iter()
        .chain(effect::build_all(&manifest, input)?)
    {
        built.insert(norm(&name));
        fixed.push((file_id(&name), finalize(&name, bytes)?));
    }

    for record in manifest.section(Section::Textures) {
        if let Some(png) = record.get("png") {
            managed.insert(norm(png));
        }
        if record.kind() != "standalone" {
            continue;
        }
        let name = record.container();
        let bytes = build_texture_from_record(record, input)?;
        built.insert(norm(name));
        fixed.push((file_id(name), finalize(name, bytes)?));
    }

    let replayed = fixed.len();
    let files = collect_files(input, &built, &managed)?;
    let total = files.len();

    let workers = available_parallelism()
        .min(MAX_PACK_WORKERS)
        .min(total.max(1));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Pool(e.to_string()))?;

    let done = AtomicUsize::new(0);
    let progress_slot = Mutex::new(&mut progress);
    let chunk_size = total.div_ceil(workers).max(1);

    // Fixed-size partition: one buffer per chunk, merged after the join.
    let chunks: Vec<Result<Vec<(u32, Vec<u8>)>>> = pool.install(|| {
        files
            .par_chunks(chunk_size)
            .map(|chunk| {
                let mut local = Vec::with_capacity(chunk.len());
                for rel in chunk {
                    let src = input.join(rel);
                    let (packed_name, data) = match registry.resolve_pack(rel) {
                        Some(transformer) => transformer.pack(&ctx, &src, rel)?,
                        None => (rel.clone(), std::fs::read(&src)?),
                    };
                    local.push((file_id(&packed_name), finalize(&packed_name, data)?));

                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % 64 == 0 || n == total {
                        if let Some(mut p) = progress_slot.try_lock() {
                            (*p)(n, total);
                        }
                    }
                }
                Ok(local)
            })
            .collect()
    });

    drop(progress_slot);

    // Single sequential fold; insertion order defines the dedup winner.
    let mut merged: FxHashMap<u32, Vec<u8>> = FxHashMap::default();
    for (hash, bytes) in fixed {
        merged.insert(hash, bytes);
    }
    for chunk in chunks {
        for (hash, bytes) in chunk? {
            merged.insert(hash, bytes);
        }
    }

    let entries = ipfb_pak::write_archive(&merged, pak_path)?;
    progress(total, total);

    Ok(PackStats {
        entries: entries.len(),
        files: total,
        replayed,
    })
}

/// Apply the compression envelope where the name is eligible.
fn finalize(name: &str, data: Vec<u8>) -> Result<Vec<u8>> {
    if envelope::should_compress(name) {
        Ok(envelope::encode(&data)?)
    } else {
        Ok(data)
    }
}

/// Enumerate packable files as sorted, `/`-separated relative paths.
fn collect_files(
    input: &Path,
    built: &FxHashSet<String>,
    managed: &FxHashSet<String>,
) -> Result<Vec<String>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(input) {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(input)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        let base = rel.rsplit('/').next().unwrap_or(&rel);
        if base.eq_ignore_ascii_case("list.xml") {
            continue;
        }

        let key = norm(&rel);
        if built.contains(&key) || managed.contains(&key) {
            continue;
        }

        files.push(rel);
    }

    // Deterministic chunking and merge order
    files.sort_unstable();
    Ok(files)
}

/// Exclusion-set key: lower-cased, `/`-separated.
fn norm(rel: &str) -> String {
    rel.replace('\\', "/").to_lowercase()
}

pub(crate) fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
