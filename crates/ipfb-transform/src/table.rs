//! String-table transformer (`IDXD` containers).
//!
//! Packed tables are keyed string lookups grouped into named sections:
//!
//! ```text
//! "IDXD" | be32 section_count | section...
//! section: NUL name | be32 entry_count | entry...
//! entry: be32 key | NUL-terminated UTF-8 value
//! ```
//!
//! The editable form is plain text - `[section]` headers and
//! `key<TAB>value` lines - so translators can edit strings in any editor.
//! Tabs, newlines and backslashes inside values are escaped. The text
//! form is parsed back byte-deterministically on pack.

use std::fmt::Write as _;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use ipfb_common::BinaryReader;

use crate::{ext_of, Error, ExtractContext, Extracted, PackContext, Result, Transformer};

const NAME: &str = "table";

/// Container magic.
pub const TABLE_MAGIC: &[u8; 4] = b"IDXD";

/// The table transformer.
pub struct TableTransformer;

impl Transformer for TableTransformer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn can_extract(&self, name: &str) -> bool {
        ext_of(name).as_deref() == Some("tbl")
    }

    fn extract(&self, data: &[u8], name: &str, _ctx: &ExtractContext<'_>) -> Result<Extracted> {
        if data.len() < 8 || &data[..4] != TABLE_MAGIC {
            // A .tbl without the magic is some other table variant; store
            // it verbatim rather than guessing.
            return Ok(Extracted::Replace {
                name: name.to_string(),
                data: data.to_vec(),
            });
        }

        let text = binary_to_text(data, name)?;
        Ok(Extracted::Replace {
            name: format!("{name}.txt"),
            data: text.into_bytes(),
        })
    }

    fn can_pack(&self, name: &str) -> bool {
        ext_of(name).as_deref() == Some("txt")
    }

    fn pack(&self, _ctx: &PackContext, src: &Path, name: &str) -> Result<(String, Vec<u8>)> {
        let logical = match crate::strip_suffix_ci(name, ".txt")
            .filter(|stem| ext_of(stem).as_deref() == Some("tbl"))
        {
            Some(stem) => stem.to_string(),
            // Any other .txt is an ordinary text file
            None => return Ok((name.to_string(), std::fs::read(src)?)),
        };

        let text = std::fs::read_to_string(src)?;
        let bytes = text_to_binary(&text, name)?;
        Ok((logical, bytes))
    }
}

fn binary_to_text(data: &[u8], name: &str) -> Result<String> {
    let mut reader = BinaryReader::new(data);
    reader.advance(4);

    let section_count = reader.read_u32()?;
    if section_count > 100_000 {
        return Err(Error::format(
            NAME,
            format!("{name}: implausible section count {section_count}"),
        ));
    }

    let mut text = String::new();
    for _ in 0..section_count {
        let section = reader
            .read_cstring()
            .map_err(|e| Error::format(NAME, format!("{name}: bad section name: {e}")))?;
        let _ = writeln!(text, "[{section}]");

        let entry_count = reader.read_u32()?;
        if entry_count > 5_000_000 {
            return Err(Error::format(
                NAME,
                format!("{name}: implausible entry count {entry_count}"),
            ));
        }

        for _ in 0..entry_count {
            let key = reader.read_u32()?;
            let value = reader
                .read_cstring()
                .map_err(|e| Error::format(NAME, format!("{name}: bad entry value: {e}")))?;
            let _ = writeln!(text, "{key}\t{}", escape(value));
        }
    }

    if !reader.is_empty() {
        return Err(Error::format(
            NAME,
            format!("{name}: {} trailing bytes after last section", reader.remaining()),
        ));
    }

    Ok(text)
}

fn text_to_binary(text: &str, name: &str) -> Result<Vec<u8>> {
    struct TblSection {
        name: String,
        entries: Vec<(u32, String)>,
    }

    let mut sections: Vec<TblSection> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }

        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.push(TblSection {
                name: section.to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        let (key, value) = line.split_once('\t').ok_or_else(|| {
            Error::format(NAME, format!("{name}:{}: expected key<TAB>value", line_no + 1))
        })?;
        let key: u32 = key.trim().parse().map_err(|_| {
            Error::format(NAME, format!("{name}:{}: bad key {key:?}", line_no + 1))
        })?;
        let section = sections.last_mut().ok_or_else(|| {
            Error::format(NAME, format!("{name}:{}: entry before any [section]", line_no + 1))
        })?;
        section.entries.push((key, unescape(value)?));
    }

    let mut out = Vec::new();
    out.extend_from_slice(TABLE_MAGIC);
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, sections.len() as u32);
    out.extend_from_slice(&buf);

    for section in &sections {
        out.extend_from_slice(section.name.as_bytes());
        out.push(0);
        BigEndian::write_u32(&mut buf, section.entries.len() as u32);
        out.extend_from_slice(&buf);

        for (key, value) in &section.entries {
            BigEndian::write_u32(&mut buf, *key);
            out.extend_from_slice(&buf);
            out.extend_from_slice(value.as_bytes());
            out.push(0);
        }
    }

    Ok(out)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            other => {
                return Err(Error::format(
                    NAME,
                    format!("bad escape sequence \\{}", other.map(String::from).unwrap_or_default()),
                ))
            }
        }
    }
    Ok(out)
}
