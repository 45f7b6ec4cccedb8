//! Particle-effect container transformer (`RATC` envelopes).
//!
//! An effect container bundles named sub-textures:
//!
//! ```text
//! "RATC" | be32 count | count x item | "end "
//! item: "opt " | 32-byte NUL-padded name | be32 size | payload
//! ```
//!
//! Same contract as the atlas transformer: pure extractor returning
//! `Handled`, with [`build_all`] replaying the manifest at pack time.
//! Items carry a `set` ordinal rather than `index`; both spell the same
//! regrouping contract.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use ipfb_common::file_id::{parse_id, to_hex8};
use ipfb_common::BinaryReader;
use ipfb_manifest::{Manifest, Record, Section};

use crate::texture::{build_texture_from_record, embedded_id, texture_index, texture_record};
use crate::{ext_of, texcodec, Error, ExtractContext, Extracted, Result, Transformer};

const NAME: &str = "effect";

/// Container magic.
pub const EFFECT_MAGIC: &[u8; 4] = b"RATC";

const ITEM_MAGIC: &[u8; 4] = b"opt ";
const END_MAGIC: &[u8; 4] = b"end ";
const ITEM_NAME_LEN: usize = 32;

/// The effect transformer.
pub struct EffectTransformer;

impl Transformer for EffectTransformer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn can_extract(&self, name: &str) -> bool {
        matches!(ext_of(name).as_deref(), Some("ratc") | Some("prt"))
    }

    fn extract(&self, data: &[u8], name: &str, ctx: &ExtractContext<'_>) -> Result<Extracted> {
        let mut reader = BinaryReader::new(data);
        reader
            .expect_magic(EFFECT_MAGIC)
            .map_err(|_| Error::format(NAME, format!("{name}: not an effect container")))?;
        let count = reader.read_u32()?;

        ctx.manifest.push(
            Section::Effects,
            Record::new("container", name).with("count", count),
        );

        let folder = match name.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') && !ext.contains('\\') => stem.to_string(),
            _ => format!("{name}.d"),
        };

        for i in 0..count {
            reader
                .expect_magic(ITEM_MAGIC)
                .map_err(|_| Error::format(NAME, format!("{name}: item {i} marker missing")))?;

            let item_name = reader
                .read_string_in_buffer(ITEM_NAME_LEN)
                .map_err(|_| Error::format(NAME, format!("{name}: item {i} name unreadable")))?
                .to_string();
            let size = reader.read_u32()? as usize;
            let payload = reader
                .read_bytes(size)
                .map_err(|_| Error::format(NAME, format!("{name}: item {i} payload out of range")))?;

            let img_id = embedded_id(NAME, name, i);
            let png_rel = format!("{folder}/{item_name}.png");

            ctx.manifest.push(
                Section::Effects,
                Record::new("item", name)
                    .with("set", i)
                    .with("item", &item_name)
                    .with("img_id", to_hex8(img_id)),
            );

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

        reader
            .expect_magic(END_MAGIC)
            .map_err(|_| Error::format(NAME, format!("{name}: end marker missing")))?;

        Ok(Extracted::Handled)
    }
}

/// Rebuild every effect container the manifest declares.
pub fn build_all(manifest: &Manifest, root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let textures = texture_index(manifest);
    let groups = group_items(manifest.section(Section::Effects));

    let mut out = Vec::with_capacity(groups.len());
    for (container, mut items) in groups {
        items.sort_by_key(|r| r.ordinal().unwrap_or(u32::MAX));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(EFFECT_MAGIC);
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, items.len() as u32);
        bytes.extend_from_slice(&buf);

        for item in items {
            let name = item.get("item").unwrap_or("");
            if name.len() > ITEM_NAME_LEN {
                return Err(Error::format(
                    NAME,
                    format!("{container}: item name {name:?} exceeds {ITEM_NAME_LEN} bytes"),
                ));
            }

            let img = match item.get("img_id").map(parse_id).filter(|id| *id != 0) {
                Some(id) => match textures.get(&id) {
                    Some(record) => build_texture_from_record(record, root)?,
                    None => Vec::new(),
                },
                None => Vec::new(),
            };

            bytes.extend_from_slice(ITEM_MAGIC);
            let mut name_buf = [0u8; ITEM_NAME_LEN];
            name_buf[..name.len()].copy_from_slice(name.as_bytes());
            bytes.extend_from_slice(&name_buf);
            bytes.extend_from_slice(&(img.len() as u32).to_be_bytes());
            bytes.extend_from_slice(&img);
        }

        bytes.extend_from_slice(END_MAGIC);
        out.push((container, bytes));
    }

    Ok(out)
}

fn group_items(records: &[Record]) -> Vec<(String, Vec<&Record>)> {
    let mut groups: Vec<(String, Vec<&Record>)> = Vec::new();
    for record in records {
        if record.kind() != "item" {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texcodec::{TexFormat, TexHeader};
    use image::RgbaImage;
    use ipfb_manifest::ManifestSink;

    fn spark_texture() -> Vec<u8> {
        let header = TexHeader {
            format: Some(TexFormat::Argb4444),
            words: [0, 0, 0, 9],
            width: 16,
            height: 16,
            flags: 2,
            logical_w: 16,
            logical_h: 16,
        };
        let img = RgbaImage::from_fn(16, 16, |x, y| {
            // Values on the 4444 quantization grid survive re-encoding
            image::Rgba([(x as u8 % 16) * 17, (y as u8 % 16) * 17, 0x44, 0xFF])
        });
        texcodec::encode(&header, &img).unwrap()
    }

    fn sample_container() -> Vec<u8> {
        let spark = spark_texture();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(EFFECT_MAGIC);
        bytes.extend_from_slice(&2u32.to_be_bytes());

        bytes.extend_from_slice(ITEM_MAGIC);
        let mut name = [0u8; ITEM_NAME_LEN];
        name[..5].copy_from_slice(b"spark");
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(&(spark.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&spark);

        bytes.extend_from_slice(ITEM_MAGIC);
        let mut name = [0u8; ITEM_NAME_LEN];
        name[..4].copy_from_slice(b"halo");
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(&0u32.to_be_bytes());

        bytes.extend_from_slice(END_MAGIC);
        bytes
    }

    #[test]
    fn test_extract_then_rebuild_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ManifestSink::new(Manifest::new());
        let ctx = ExtractContext {
            out_root: dir.path(),
            manifest: &sink,
        };

        let container = sample_container();
        let outcome = EffectTransformer
            .extract(&container, "fx/hit.ratc", &ctx)
            .unwrap();
        assert!(matches!(outcome, Extracted::Handled));

        assert!(dir.path().join("fx/hit/spark.png").exists());
        assert!(!dir.path().join("fx/hit/halo.png").exists());

        let manifest = sink.into_inner();
        let effects = manifest.section(Section::Effects);
        assert_eq!(effects.len(), 3); // container + 2 items
        assert_eq!(effects[1].get("item"), Some("spark"));
        assert_eq!(effects[1].ordinal(), Some(0));

        let rebuilt = build_all(&manifest, dir.path()).unwrap();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].0, "fx/hit.ratc");
        assert_eq!(rebuilt[0].1, container);
    }

    #[test]
    fn test_missing_end_marker_is_fatal() {
        let sink = ManifestSink::new(Manifest::new());
        let ctx = ExtractContext {
            out_root: Path::new("."),
            manifest: &sink,
        };
        let mut container = sample_container();
        container.truncate(container.len() - 4);
        assert!(EffectTransformer
            .extract(&container, "fx/hit.ratc", &ctx)
            .is_err());
    }

    #[test]
    fn test_bad_item_marker_is_fatal() {
        let sink = ManifestSink::new(Manifest::new());
        let ctx = ExtractContext {
            out_root: Path::new("."),
            manifest: &sink,
        };
        let mut container = sample_container();
        container[8..12].copy_from_slice(b"bad ");
        assert!(EffectTransformer
            .extract(&container, "fx/hit.ratc", &ctx)
            .is_err());
    }
}
