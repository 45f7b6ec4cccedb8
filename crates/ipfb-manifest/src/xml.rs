//! XML (de)serialization for the manifest.
//!
//! Layout on disk:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <pak>
//!   <textures>
//!     <file kind="standalone" container="ui/title.t32" ... />
//!   </textures>
//!   <atlases> ... </atlases>
//!   <effects> ... </effects>
//! </pak>
//! ```
//!
//! Empty sections are omitted. Attribute order within a record is
//! significant only for readability and is preserved both ways.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::{Manifest, ManifestError, Record, Result, Section};

const ROOT_TAG: &str = "pak";
const RECORD_TAG: &str = "file";

/// Serialize a manifest to XML bytes.
pub fn serialize(manifest: &Manifest) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new(ROOT_TAG)))
        .map_err(xml_err)?;

    for section in Section::ALL {
        let records = manifest.section(section);
        if records.is_empty() {
            continue;
        }

        writer
            .write_event(Event::Start(BytesStart::new(section.tag())))
            .map_err(xml_err)?;

        for record in records {
            let mut el = BytesStart::new(RECORD_TAG);
            for (key, value) in record.attrs() {
                el.push_attribute((key.as_str(), value.as_str()));
            }
            writer.write_event(Event::Empty(el)).map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(section.tag())))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT_TAG)))
        .map_err(xml_err)?;

    Ok(writer.into_inner())
}

/// Parse a manifest from XML text.
pub fn parse(text: &str) -> Result<Manifest> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut manifest = Manifest::new();
    let mut current: Option<Section> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(section) = Section::from_tag(&tag) {
                    current = Some(section);
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if tag == RECORD_TAG {
                    if let Some(section) = current {
                        manifest.push(section, read_record(&e)?);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if Section::from_tag(&tag) == current {
                    current = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ManifestError::Xml(e.to_string())),
        }
    }

    Ok(manifest)
}

fn read_record(el: &BytesStart<'_>) -> Result<Record> {
    let mut attrs = Vec::new();
    for attr in el.attributes() {
        let attr = attr.map_err(|e| ManifestError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ManifestError::Xml(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Record::from_attrs(attrs))
}

fn xml_err(e: impl std::fmt::Display) -> ManifestError {
    ManifestError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        let mut m = Manifest::new();
        m.push(
            Section::Textures,
            Record::new("standalone", "ui/title.t32")
                .with("id", "2661626B")
                .with("png", "ui/title.t32.png")
                .with("width", 256u32)
                .with("height", 128u32),
        );
        m.push(
            Section::Atlases,
            Record::new("container", "fonts/main.fnt").with("count", 2u32),
        );
        m.push(
            Section::Atlases,
            Record::new("entry", "fonts/main.fnt")
                .with("index", 0u32)
                .with("char_code", 65u32),
        );
        m
    }

    #[test]
    fn test_roundtrip() {
        let original = sample();
        let bytes = serialize(&original).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.section(Section::Textures), original.section(Section::Textures));
        assert_eq!(parsed.section(Section::Atlases), original.section(Section::Atlases));
        assert!(parsed.section(Section::Effects).is_empty());
    }

    #[test]
    fn test_empty_sections_omitted() {
        let bytes = serialize(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<textures>"));
        assert!(!text.contains("<effects>"));
    }

    #[test]
    fn test_attribute_escaping() {
        let mut m = Manifest::new();
        m.push(
            Section::Textures,
            Record::new("standalone", "a&b.t32").with("note", "<quoted \"text\">"),
        );

        let bytes = serialize(&m).unwrap();
        let parsed = parse(std::str::from_utf8(&bytes).unwrap()).unwrap();
        let record = &parsed.section(Section::Textures)[0];
        assert_eq!(record.container(), "a&b.t32");
        assert_eq!(record.get("note"), Some("<quoted \"text\">"));
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(parse("<pak><textures><file kind=oops</textures>").is_err());
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.xml");

        sample().save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.section(Section::Atlases)[1].ordinal(), Some(0));
    }
}
