//! Format transformers for IPFB assets.
//!
//! A transformer is a strategy that converts one asset family between its
//! packed binary form and a human-editable sidecar form (image, text).
//! The archive core knows nothing about asset internals; it only drives
//! the [`Transformer`] contract through an ordered [`Registry`]:
//!
//! - on extraction, the first transformer whose `can_extract` accepts the
//!   entry name runs; it may replace the output file, report that it wrote
//!   its own outputs, or the chain declines and the payload is written raw
//! - on packing, resolution is the mirror image and is cached per file
//!   extension, since packing walks thousands of files with few extensions
//!
//! Structural facts a transformer learns during extraction (texture header
//! words, container entry order) travel through the manifest - that is the
//! only channel between an extract and the matching pack, because sidecar
//! files carry no format headers of their own.

mod error;
mod filter;
mod registry;
mod table;
mod texture;

pub mod atlas;
pub mod effect;
pub mod texcodec;

use std::path::Path;

use ipfb_manifest::ManifestSink;

pub use atlas::AtlasTransformer;
pub use effect::EffectTransformer;
pub use error::{Error, Result};
pub use filter::Filter;
pub use registry::Registry;
pub use table::TableTransformer;
pub use texture::{
    build_texture_from_record, embedded_id, texture_index, texture_record, TextureHeaderDb,
    TextureTransformer,
};

/// Outcome of a successful extraction.
#[derive(Debug)]
pub enum Extracted {
    /// Write `data` under `name` instead of the raw payload.
    Replace { name: String, data: Vec<u8> },
    /// The transformer already wrote its own output files (used when one
    /// packed entry expands into many sidecar files).
    Handled,
}

/// Context handed to extraction calls.
///
/// Owned by the unpack orchestrator for the duration of one run; this is
/// the explicit-state replacement for process-wide globals.
pub struct ExtractContext<'a> {
    /// Root directory extraction writes into.
    pub out_root: &'a Path,
    /// Concurrent manifest accumulator.
    pub manifest: &'a ManifestSink,
}

impl ExtractContext<'_> {
    /// Write a sidecar file under the output root, creating parent
    /// directories as needed. `rel` uses `/` separators.
    pub fn write_file(&self, rel: &str, data: &[u8]) -> Result<()> {
        let path = self.out_root.join(rel.replace('\\', "/"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Context handed to pack calls.
///
/// Carries the lookup state preloaded from the manifest before the run
/// starts (texture headers keyed by FileID).
pub struct PackContext {
    /// Texture headers recorded at extraction time, keyed by FileID.
    pub headers: TextureHeaderDb,
}

impl PackContext {
    /// Preload pack state from a manifest.
    pub fn from_manifest(manifest: &ipfb_manifest::Manifest) -> Self {
        Self {
            headers: TextureHeaderDb::from_manifest(manifest),
        }
    }

    /// A context with no recorded state (packs everything raw).
    pub fn empty() -> Self {
        Self {
            headers: TextureHeaderDb::default(),
        }
    }
}

/// A bidirectional asset-family converter.
///
/// Implementations are stateless; anything they need at pack time comes
/// through [`PackContext`], anything they learn at extract time goes into
/// the manifest via [`ExtractContext`].
pub trait Transformer: Send + Sync {
    /// Stable name used by the runtime filter.
    fn name(&self) -> &'static str;

    /// Whether this transformer wants to extract an entry with this name.
    fn can_extract(&self, name: &str) -> bool;

    /// Convert a packed payload into its sidecar form.
    fn extract(&self, data: &[u8], name: &str, ctx: &ExtractContext<'_>) -> Result<Extracted>;

    /// Whether this transformer wants to pack a source file with this name.
    fn can_pack(&self, _name: &str) -> bool {
        false
    }

    /// Convert a source file back into packed bytes, returning the logical
    /// name to hash and the final payload.
    fn pack(&self, _ctx: &PackContext, _src: &Path, _name: &str) -> Result<(String, Vec<u8>)> {
        Err(Error::NotPackable(self.name()))
    }
}

/// Strip an ASCII suffix case-insensitively, if present.
pub(crate) fn strip_suffix_ci<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    name[split..]
        .eq_ignore_ascii_case(suffix)
        .then(|| &name[..split])
}

/// Lower-cased extension of a name, if any.
pub(crate) fn ext_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_of() {
        assert_eq!(ext_of("ui/title.T32").as_deref(), Some("t32"));
        assert_eq!(ext_of("a\\b\\c.PNG").as_deref(), Some("png"));
        assert_eq!(ext_of("noext"), None);
        assert_eq!(ext_of("dir.d/noext"), None);
        assert_eq!(ext_of("trailingdot."), None);
    }
}
