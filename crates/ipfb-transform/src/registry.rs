//! The ordered transformer registry.
//!
//! Dispatch is first-match-wins over a fixed, ordered list. The list is
//! built once at startup; the only reconfiguration is the enable mask from
//! a [`Filter`], applied between runs, never mid-operation.
//!
//! Pack resolution is cached per file extension (or per bare file name when
//! there is none): packing visits thousands of files drawn from a handful
//! of extensions, and predicates for packing are extension-shaped by
//! contract. Extraction is never cached - entry names are not assumed
//! stable enough to key on. The cache tolerates concurrent reads; applying
//! a filter clears it under the write lock.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{
    ext_of, AtlasTransformer, EffectTransformer, ExtractContext, Extracted, Filter, Result,
    TableTransformer, TextureTransformer, Transformer,
};

/// The ordered, filterable transformer set.
pub struct Registry {
    transformers: Vec<Box<dyn Transformer>>,
    enabled: Vec<bool>,
    pack_cache: RwLock<FxHashMap<String, Option<usize>>>,
}

impl Registry {
    /// The standard chain, in dispatch order.
    pub fn standard() -> Self {
        Self::with_transformers(vec![
            Box::new(TableTransformer),
            Box::new(TextureTransformer),
            Box::new(AtlasTransformer),
            Box::new(EffectTransformer),
        ])
    }

    /// Build a registry from an explicit ordered list.
    pub fn with_transformers(transformers: Vec<Box<dyn Transformer>>) -> Self {
        let enabled = vec![true; transformers.len()];
        Self {
            transformers,
            enabled,
            pack_cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Names of all registered transformers, in dispatch order.
    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// Apply a filter, recomputing the enable mask and invalidating the
    /// pack-resolution cache.
    pub fn apply_filter(&mut self, filter: &Filter) -> Result<()> {
        let names = self.names();
        self.enabled = filter.enabled_mask(&names)?;
        self.pack_cache.write().clear();
        Ok(())
    }

    /// Run the extraction chain over a payload.
    ///
    /// Returns `Ok(None)` when every transformer declines; the caller then
    /// writes the payload verbatim.
    pub fn extract(
        &self,
        data: &[u8],
        name: &str,
        ctx: &ExtractContext<'_>,
    ) -> Result<Option<Extracted>> {
        for (transformer, enabled) in self.transformers.iter().zip(&self.enabled) {
            if !enabled || !transformer.can_extract(name) {
                continue;
            }
            return transformer.extract(data, name, ctx).map(Some);
        }
        Ok(None)
    }

    /// Resolve which transformer packs a file with this name, if any.
    pub fn resolve_pack(&self, name: &str) -> Option<&dyn Transformer> {
        let key = ext_of(name).unwrap_or_else(|| {
            name.rsplit(['/', '\\'])
                .next()
                .unwrap_or(name)
                .to_ascii_lowercase()
        });

        if let Some(resolved) = self.pack_cache.read().get(&key).copied() {
            return resolved.map(|i| self.transformers[i].as_ref());
        }

        let resolved = self
            .transformers
            .iter()
            .enumerate()
            .find(|(i, t)| self.enabled[*i] && t.can_pack(name))
            .map(|(i, _)| i);

        self.pack_cache.write().insert(key, resolved);
        resolved.map(|i| self.transformers[i].as_ref())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .field("enabled", &self.enabled)
            .finish()
    }
}
