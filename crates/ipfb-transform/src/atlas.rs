//! Font/atlas container transformer (`LSTA` envelopes).
//!
//! An atlas bundles many small textures (glyph images) into one packed
//! entry:
//!
//! ```text
//! "LSTA" | be32 count | count x entry
//! entry: be16 char_code | u8 flag | be32 x | be32 y | be32 size | payload
//! ```
//!
//! This is a pure extractor: one packed entry expands into a folder of
//! PNGs plus manifest records, so extraction returns `Handled` and the
//! pack side is [`build_all`] - a manifest replay the orchestrator runs
//! before walking the input tree. The replay is pure: records sorted by
//! ordinal plus the sidecar images fully determine the rebuilt bytes.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use ipfb_common::file_id::{parse_id, to_hex8};
use ipfb_common::BinaryReader;
use ipfb_manifest::{Manifest, Record, Section};

use crate::texture::{build_texture_from_record, embedded_id, texture_index, texture_record};
use crate::{ext_of, texcodec, Error, ExtractContext, Extracted, Result, Transformer};

const NAME: &str = "atlas";

/// Container magic.
pub const ATLAS_MAGIC: &[u8; 4] = b"LSTA";

const ENTRY_HEADER: usize = 15;

/// The atlas transformer.
pub struct AtlasTransformer;

impl Transformer for AtlasTransformer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn can_extract(&self, name: &str) -> bool {
        matches!(ext_of(name).as_deref(), Some("lsta") | Some("fnt"))
    }

    fn extract(&self, data: &[u8], name: &str, ctx: &ExtractContext<'_>) -> Result<Extracted> {
        let mut reader = BinaryReader::new(data);
        reader
            .expect_magic(ATLAS_MAGIC)
            .map_err(|_| Error::format(NAME, format!("{name}: not an atlas container")))?;
        let count = reader.read_u32()?;

        ctx.manifest.push(
            Section::Atlases,
            Record::new("container", name).with("count", count),
        );

        let folder = container_folder(name);

        for i in 0..count {
            if reader.remaining() < ENTRY_HEADER {
                return Err(Error::format(
                    NAME,
                    format!("{name}: truncated at entry {i} of {count}"),
                ));
            }

            let char_code = reader.read_u16()?;
            let flag = reader.read_u8()?;
            let x = reader.read_i32()?;
            let y = reader.read_i32()?;
            let size = reader.read_u32()? as usize;

            let payload = reader.read_bytes(size).map_err(|_| {
                Error::format(NAME, format!("{name}: entry {i} payload out of range"))
            })?;

            let img_name = format!("{char_code:04X}");
            let img_id = embedded_id(NAME, name, i);
            let png_rel = format!("{folder}/{img_name}.png");

            ctx.manifest.push(
                Section::Atlases,
                Record::new("entry", name)
                    .with("index", i)
                    .with("char_code", char_code)
                    .with("flag", flag)
                    .with("pos_x", x)
                    .with("pos_y", y)
                    .with("img_id", to_hex8(img_id))
                    .with("img_name", &img_name),
            );

            // Entries may be external references with no payload; anything
            // present must be a packed texture.
            if payload.is_empty() {
                continue;
            }
            let (header, img) = texcodec::decode(payload)?;
            ctx.write_file(&png_rel, &crate::texture::png_bytes(&img)?)?;
            ctx.manifest.push(
                Section::Textures,
                texture_record("embedded", name, i, img_id, &png_rel, &header),
            );
        }

        Ok(Extracted::Handled)
    }
}

/// Rebuild every atlas container the manifest declares.
///
/// Returns `(logical_name, bytes)` pairs. Entry records are grouped by
/// container and re-sorted by ordinal first, so the result is independent
/// of the order extraction workers appended them.
pub fn build_all(manifest: &Manifest, root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let textures = texture_index(manifest);
    let groups = group_entries(manifest.section(Section::Atlases));

    let mut out = Vec::with_capacity(groups.len());
    for (container, mut entries) in groups {
        entries.sort_by_key(|r| r.ordinal().unwrap_or(u32::MAX));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(ATLAS_MAGIC);
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, entries.len() as u32);
        bytes.extend_from_slice(&buf);

        for entry in entries {
            let img = match entry.get("img_id").map(parse_id).filter(|id| *id != 0) {
                Some(id) => match textures.get(&id) {
                    Some(record) => build_texture_from_record(record, root)?,
                    None => Vec::new(),
                },
                None => Vec::new(),
            };

            let char_code = entry.get_u32("char_code").unwrap_or(0) as u16;
            bytes.extend_from_slice(&char_code.to_be_bytes());
            bytes.push(entry.get_u32("flag").unwrap_or(0) as u8);
            bytes.extend_from_slice(&entry.get_i32("pos_x").unwrap_or(0).to_be_bytes());
            bytes.extend_from_slice(&entry.get_i32("pos_y").unwrap_or(0).to_be_bytes());
            bytes.extend_from_slice(&(img.len() as u32).to_be_bytes());
            bytes.extend_from_slice(&img);
        }

        out.push((container, bytes));
    }

    Ok(out)
}

/// Group `kind="entry"` records by container, preserving first-seen order.
fn group_entries(records: &[Record]) -> Vec<(String, Vec<&Record>)> {
    let mut groups: Vec<(String, Vec<&Record>)> = Vec::new();
    for record in records {
        if record.kind() != "entry" {
            continue;
        }
        let container = record.container();
        match groups
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(container))
        {
            Some((_, list)) => list.push(record),
            None => groups.push((container.to_string(), vec![record])),
        }
    }
    groups
}

/// Sidecar folder for a container's member images: the container path
/// without its extension.
fn container_folder(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') && !ext.contains('\\') => stem.to_string(),
        _ => format!("{name}.d"),
    }
}
