//! Reverse hash -> name lookup table.
//!
//! The archive index stores only FileIDs; human-readable names on unpack
//! come from a sidecar table. Two forms exist:
//!
//! - `list.hash` - binary cache: little-endian `u32 count`, then
//!   `count x (u32 hash, u32 name_offset)`, then a NUL-terminated UTF-8
//!   string pool. (The archive itself is big-endian; this sidecar keeps
//!   the little-endian layout it shipped with.)
//! - `list.txt` - one logical path per line, `#` comments allowed. When
//!   only the text form exists, the binary cache is regenerated from it.
//!
//! The table is plain owned state with an explicit load at the start of an
//! unpack run; a missing table just means hash-coded fallback names.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use rustc_hash::FxHashMap;

use ipfb_common::file_id::file_id;

/// In-memory reverse lookup table.
#[derive(Debug, Default)]
pub struct NameTable {
    map: FxHashMap<u32, String>,
}

impl NameTable {
    /// An empty table; every lookup falls back to a hash-coded name.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the table that applies to an archive.
    ///
    /// Looks for `list.hash` / `list.txt` next to the `.pak` first, then in
    /// the current directory. Missing tables are not an error.
    pub fn load_for(pak_path: &Path) -> Self {
        let mut dirs: Vec<&Path> = Vec::with_capacity(2);
        if let Some(dir) = pak_path.parent() {
            dirs.push(dir);
        }
        let cwd = Path::new(".");
        if !dirs.contains(&cwd) {
            dirs.push(cwd);
        }

        for dir in dirs {
            if let Some(table) = Self::load_dir(dir) {
                return table;
            }
        }
        Self::empty()
    }

    /// Load from one directory, preferring the binary cache.
    pub fn load_dir(dir: &Path) -> Option<Self> {
        let hash_path = dir.join("list.hash");
        if let Ok(data) = std::fs::read(&hash_path) {
            return Some(Self::from_hash_bytes(&data));
        }

        let txt_path = dir.join("list.txt");
        if let Ok(text) = std::fs::read_to_string(&txt_path) {
            let table = Self::from_text(&text);
            // Best effort: the cache is a convenience, not a contract.
            let _ = std::fs::write(&hash_path, table.to_hash_bytes());
            return Some(table);
        }

        None
    }

    /// Parse the binary `list.hash` form. Malformed trailing entries are
    /// skipped rather than fatal; this is a display aid, not archive data.
    pub fn from_hash_bytes(data: &[u8]) -> Self {
        let mut map = FxHashMap::default();

        if data.len() < 4 {
            return Self { map };
        }

        let count = LittleEndian::read_u32(data) as usize;
        let entries_offset = 4;
        let names_offset = entries_offset + count * 8;
        if names_offset > data.len() {
            return Self { map };
        }

        for i in 0..count {
            let off = entries_offset + i * 8;
            let hash = LittleEndian::read_u32(&data[off..]);
            let rel = LittleEndian::read_u32(&data[off + 4..]) as usize;

            let pos = names_offset + rel;
            if pos >= data.len() {
                continue;
            }
            let Some(end) = memchr::memchr(0, &data[pos..]) else {
                continue;
            };
            if end == 0 {
                continue;
            }
            if let Ok(name) = std::str::from_utf8(&data[pos..pos + end]) {
                map.entry(hash).or_insert_with(|| name.to_string());
            }
        }

        Self { map }
    }

    /// Build a table from the plain-text form.
    pub fn from_text(text: &str) -> Self {
        let mut map = FxHashMap::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            map.entry(file_id(line)).or_insert_with(|| line.to_string());
        }
        Self { map }
    }

    /// Serialize to the binary `list.hash` layout, sorted by hash.
    pub fn to_hash_bytes(&self) -> Vec<u8> {
        let mut items: Vec<(u32, &str)> = self.map.iter().map(|(h, n)| (*h, n.as_str())).collect();
        items.sort_by_key(|(h, _)| *h);

        let mut entries = Vec::with_capacity(items.len() * 8);
        let mut pool = Vec::new();

        for (hash, name) in &items {
            let mut entry = [0u8; 8];
            LittleEndian::write_u32(&mut entry[..4], *hash);
            LittleEndian::write_u32(&mut entry[4..], pool.len() as u32);
            entries.extend_from_slice(&entry);

            pool.extend_from_slice(name.as_bytes());
            pool.push(0);
        }

        let mut out = Vec::with_capacity(4 + entries.len() + pool.len());
        let mut count = [0u8; 4];
        LittleEndian::write_u32(&mut count, items.len() as u32);
        out.extend_from_slice(&count);
        out.extend_from_slice(&entries);
        out.extend_from_slice(&pool);
        out
    }

    /// Look up the display name for a hash.
    #[inline]
    pub fn get(&self, hash: u32) -> Option<&str> {
        self.map.get(&hash).map(String::as_str)
    }

    /// Number of known names.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table knows no names at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_to_table() {
        let table = NameTable::from_text(
            "# asset list\n\
             ui/title.t32\n\
             \n\
             fonts/main.ttf\n",
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(file_id("ui/title.t32")), Some("ui/title.t32"));
        assert_eq!(table.get(file_id("fonts/main.ttf")), Some("fonts/main.ttf"));
        assert_eq!(table.get(0xDEAD_BEEF), None);
    }

    #[test]
    fn test_binary_roundtrip() {
        let table = NameTable::from_text("ui/title.t32\nscripts/op.isb\ndata/items.tbl\n");
        let bytes = table.to_hash_bytes();
        let parsed = NameTable::from_hash_bytes(&bytes);

        assert_eq!(parsed.len(), table.len());
        for name in ["ui/title.t32", "scripts/op.isb", "data/items.tbl"] {
            assert_eq!(parsed.get(file_id(name)), Some(name));
        }
    }

    #[test]
    fn test_first_mapping_wins() {
        // Same hash twice in the text form keeps the first line.
        let table = NameTable::from_text("ui/title.t32\nUI/TITLE.T32\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(file_id("ui/title.t32")), Some("ui/title.t32"));
    }

    #[test]
    fn test_malformed_hash_bytes() {
        assert!(NameTable::from_hash_bytes(&[]).is_empty());
        assert!(NameTable::from_hash_bytes(&[1, 0]).is_empty());
        // Count pointing past the buffer
        assert!(NameTable::from_hash_bytes(&[0xFF, 0xFF, 0, 0]).is_empty());
    }

    #[test]
    fn test_load_for_prefers_pak_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("list.txt"), "ui/title.t32\n").unwrap();
        let pak = dir.path().join("game.pak");

        let table = NameTable::load_for(&pak);
        assert_eq!(table.get(file_id("ui/title.t32")), Some("ui/title.t32"));
        // The binary cache was regenerated alongside the text form
        assert!(dir.path().join("list.hash").exists());
    }
}
