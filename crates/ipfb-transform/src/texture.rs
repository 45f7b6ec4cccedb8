//! Standalone texture transformer.
//!
//! Extraction turns a packed texture into a PNG sidecar and records the
//! header words in the manifest. Packing runs against a directory of plain
//! PNGs, so the recorded header is the only way to rebuild the original
//! container bytes - a PNG that was never extracted (no recorded header)
//! is stored as-is under its logical name.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use rustc_hash::FxHashMap;

use ipfb_common::file_id::{file_id, parse_id, to_hex8};
use ipfb_manifest::{Manifest, Record, Section};

use crate::texcodec::{self, TexFormat, TexHeader};
use crate::{ext_of, Error, ExtractContext, Extracted, PackContext, Result, Transformer};

const NAME: &str = "texture";

/// Extensions holding packed textures.
pub const TEXTURE_EXTS: &[&str] = &["t32", "t4ad", "t1ad"];

/// The texture transformer.
pub struct TextureTransformer;

impl Transformer for TextureTransformer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn can_extract(&self, name: &str) -> bool {
        ext_of(name).is_some_and(|ext| TEXTURE_EXTS.contains(&ext.as_str()))
    }

    fn extract(&self, data: &[u8], name: &str, ctx: &ExtractContext<'_>) -> Result<Extracted> {
        let (header, img) = texcodec::decode(data)?;
        let png_rel = format!("{name}.png");

        ctx.manifest.push(
            Section::Textures,
            texture_record("standalone", name, 0, file_id(name), &png_rel, &header),
        );

        Ok(Extracted::Replace {
            name: png_rel,
            data: png_bytes(&img)?,
        })
    }

    fn can_pack(&self, name: &str) -> bool {
        ext_of(name).as_deref() == Some("png")
    }

    fn pack(&self, ctx: &PackContext, src: &Path, name: &str) -> Result<(String, Vec<u8>)> {
        let logical = strip_png(name).to_string();

        let id = file_id(&logical);
        let Some(header) = ctx.headers.get(id) else {
            // Never extracted from a texture: store the PNG bytes as-is.
            return Ok((logical, std::fs::read(src)?));
        };

        let img = image::open(src)?.to_rgba8();
        if img.dimensions() != (header.width, header.height) {
            return Err(Error::format(
                NAME,
                format!(
                    "{name}: image is {}x{} but the recorded header says {}x{}",
                    img.width(),
                    img.height(),
                    header.width,
                    header.height
                ),
            ));
        }

        Ok((logical, texcodec::encode(header, &img)?))
    }
}

/// Encode an image as PNG bytes.
pub(crate) fn png_bytes(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

fn strip_png(name: &str) -> &str {
    crate::strip_suffix_ci(name, ".png").unwrap_or(name)
}

/// Stable FileID for a sub-asset embedded in a composite container.
pub fn embedded_id(family: &str, container: &str, ordinal: u32) -> u32 {
    file_id(&format!("{family}|{container}|{ordinal}"))
}

/// Build the manifest record for one texture (standalone or embedded).
pub fn texture_record(
    kind: &str,
    container: &str,
    ordinal: u32,
    id: u32,
    png_rel: &str,
    header: &TexHeader,
) -> Record {
    let format = header.format.map(TexFormat::label).unwrap_or("");
    Record::new(kind, container)
        .with("index", ordinal)
        .with("id", to_hex8(id))
        .with("png", png_rel)
        .with("format", format)
        .with("f04", header.words[0])
        .with("f08", header.words[1])
        .with("f0c", header.words[2])
        .with("f10", header.words[3])
        .with("width", header.width)
        .with("height", header.height)
        .with("f20", header.flags)
        .with("logical_w", header.logical_w)
        .with("logical_h", header.logical_h)
}

/// Parse a texture header back out of a manifest record.
pub fn header_from_record(record: &Record) -> Option<TexHeader> {
    let format = TexFormat::from_label(record.get("format")?)?;
    Some(TexHeader {
        format: Some(format),
        words: [
            record.get_u32("f04")?,
            record.get_u32("f08")?,
            record.get_u32("f0c")?,
            record.get_u32("f10")?,
        ],
        width: record.get_u32("width")?,
        height: record.get_u32("height")?,
        flags: record.get_u32("f20")?,
        logical_w: record.get_u32("logical_w")?,
        logical_h: record.get_u32("logical_h")?,
    })
}

/// Rebuild one texture's packed bytes from its record and the sidecar PNG.
pub fn build_texture_from_record(record: &Record, root: &Path) -> Result<Vec<u8>> {
    let png_rel = record
        .get("png")
        .ok_or_else(|| Error::format(NAME, "texture record without a png attribute"))?;
    let header = header_from_record(record).ok_or_else(|| {
        Error::format(
            NAME,
            format!("texture record for {png_rel} is missing header fields"),
        )
    })?;

    let img = image::open(root.join(png_rel))?.to_rgba8();
    if img.dimensions() != (header.width, header.height) {
        return Err(Error::format(
            NAME,
            format!(
                "{png_rel}: image is {}x{} but the recorded header says {}x{}",
                img.width(),
                img.height(),
                header.width,
                header.height
            ),
        ));
    }

    texcodec::encode(&header, &img)
}

/// Texture records keyed by FileID, for composite-container rebuilds.
pub fn texture_index(manifest: &Manifest) -> FxHashMap<u32, &Record> {
    let mut map = FxHashMap::default();
    for record in manifest.section(Section::Textures) {
        if let Some(id) = record.get("id").map(parse_id).filter(|id| *id != 0) {
            map.insert(id, record);
        }
    }
    map
}

/// Texture headers keyed by FileID, preloaded before a pack run.
///
/// This is the pack-side half of the manifest bridge: explicit state with
/// a load lifecycle tied to the run, not a process-wide cache.
#[derive(Debug, Default)]
pub struct TextureHeaderDb {
    map: FxHashMap<u32, TexHeader>,
}

impl TextureHeaderDb {
    /// Collect every texture header the manifest records.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut map = FxHashMap::default();
        for record in manifest.section(Section::Textures) {
            let Some(id) = record.get("id").map(parse_id).filter(|id| *id != 0) else {
                continue;
            };
            if let Some(header) = header_from_record(record) {
                map.insert(id, header);
            }
        }
        Self { map }
    }

    /// Look up the recorded header for a FileID.
    pub fn get(&self, id: u32) -> Option<&TexHeader> {
        self.map.get(&id)
    }

    /// Number of recorded headers.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no headers are recorded.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
