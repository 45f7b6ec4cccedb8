//! The Z1 compression envelope.
//!
//! Most stored payloads are wrapped in a self-describing envelope:
//!
//! ```text
//! "Z1" | be32 raw_len | be32 adler32(raw) | 78 DA | raw deflate | be32 adler32(raw)
//! ```
//!
//! The `78 DA` marker and the trailing checksum copy make the inner region
//! look like a zlib stream, but both are emitted literally here: the deflate
//! data itself is headerless, and the duplicated tail checksum is required
//! for compatibility even though decoders only consult the head copy.
//!
//! Presence is signaled only by the two magic bytes; a payload without them
//! is stored literally. Font files and streamed media are never wrapped.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::{Error, Result};

/// Envelope magic bytes.
pub const ENVELOPE_MAGIC: &[u8; 2] = b"Z1";

/// Marker bytes following the header, emitted verbatim.
const STREAM_MARKER: [u8; 2] = [0x78, 0xDA];

/// Deflate level used when wrapping.
const DEFLATE_LEVEL: u32 = 7;

/// A wrapped payload is at least this long (exclusive) before decoding
/// treats it as an envelope.
const MIN_WRAPPED: usize = 16;

/// Extensions that are always stored raw.
const NO_COMPRESS_EXTS: &[&str] = &["ttf", "ttc"];

/// Base-name prefixes that are always stored raw (streamed media).
const NO_COMPRESS_PREFIXES: &[&str] = &["bgm", "se_", "voice"];

/// Whether an entry with this logical name gets the envelope.
pub fn should_compress(name: &str) -> bool {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let lower = base.to_ascii_lowercase();

    if let Some((_, ext)) = lower.rsplit_once('.') {
        if NO_COMPRESS_EXTS.contains(&ext) {
            return false;
        }
    }

    !NO_COMPRESS_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Check whether stored bytes carry the envelope.
#[inline]
pub fn is_wrapped(bytes: &[u8]) -> bool {
    bytes.len() > MIN_WRAPPED && bytes[..2] == *ENVELOPE_MAGIC
}

/// Wrap raw bytes in the envelope.
pub fn encode(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(raw.len() / 2 + 16),
        Compression::new(DEFLATE_LEVEL),
    );
    encoder
        .write_all(raw)
        .map_err(|e| Error::Envelope(e.to_string()))?;
    let deflated = encoder
        .finish()
        .map_err(|e| Error::Envelope(e.to_string()))?;

    let adler = adler2::adler32_slice(raw);
    let mut out = Vec::with_capacity(12 + deflated.len() + 4);
    out.extend_from_slice(ENVELOPE_MAGIC);
    out.extend_from_slice(&(raw.len() as u32).to_be_bytes());
    out.extend_from_slice(&adler.to_be_bytes());
    out.extend_from_slice(&STREAM_MARKER);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&adler.to_be_bytes());
    Ok(out)
}

/// Unwrap stored bytes.
///
/// Bytes without the envelope magic are returned as-is. A marked envelope
/// that fails to inflate, or whose declared length or checksum does not
/// match the inflated output, is fatal corruption.
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>> {
    if !is_wrapped(bytes) {
        return Ok(bytes.to_vec());
    }

    let declared_len = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
    let declared_adler = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);

    let stream = &bytes[12..bytes.len() - 4];
    let mut raw = Vec::with_capacity(declared_len);
    DeflateDecoder::new(stream)
        .read_to_end(&mut raw)
        .map_err(|e| Error::Envelope(e.to_string()))?;

    if raw.len() != declared_len {
        return Err(Error::Envelope(format!(
            "declared length {} but inflated {} bytes",
            declared_len,
            raw.len()
        )));
    }
    if adler2::adler32_slice(&raw) != declared_adler {
        return Err(Error::Envelope("checksum mismatch".into()));
    }

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let original = b"Hello, World! This is a test of the Z1 envelope.".repeat(8);
        let wrapped = encode(&original).unwrap();
        assert!(is_wrapped(&wrapped));
        assert_eq!(decode(&wrapped).unwrap(), original);
    }

    #[test]
    fn test_layout() {
        let raw = b"abcabcabcabcabcabcabcabc";
        let wrapped = encode(raw).unwrap();

        assert_eq!(&wrapped[..2], b"Z1");
        assert_eq!(
            u32::from_be_bytes([wrapped[2], wrapped[3], wrapped[4], wrapped[5]]),
            raw.len() as u32
        );
        assert_eq!(wrapped[10], 0x78);
        assert_eq!(wrapped[11], 0xDA);

        // Head and tail checksum copies are byte-identical
        let head = &wrapped[6..10];
        let tail = &wrapped[wrapped.len() - 4..];
        assert_eq!(head, tail);
        assert_eq!(
            u32::from_be_bytes([head[0], head[1], head[2], head[3]]),
            adler2::adler32_slice(raw)
        );
    }

    #[test]
    fn test_unwrapped_passthrough() {
        let raw = b"short";
        assert!(!is_wrapped(raw));
        assert_eq!(decode(raw).unwrap(), raw);

        // Starts with Z1 but too short to be an envelope
        let short = b"Z1abc";
        assert_eq!(decode(short).unwrap(), short);
    }

    #[test]
    fn test_corrupt_stream_is_fatal() {
        let mut wrapped = encode(b"some payload bytes to compress").unwrap();
        let mid = wrapped.len() / 2;
        wrapped[mid] ^= 0xFF;
        // Either the inflate fails or the checksum does; both abort.
        assert!(decode(&wrapped).is_err());
    }

    #[test]
    fn test_declared_length_mismatch_is_fatal() {
        let mut wrapped = encode(b"payload payload payload payload").unwrap();
        wrapped[5] ^= 0x01;
        assert!(decode(&wrapped).is_err());
    }

    #[test]
    fn test_eligibility() {
        assert!(should_compress("ui/title.t32"));
        assert!(should_compress("scripts/opening.isb"));
        assert!(!should_compress("fonts/main.ttf"));
        assert!(!should_compress("fonts/MAIN.TTC"));
        assert!(!should_compress("sound/bgm01.bin"));
        assert!(!should_compress("sound/se_hit.bin"));
        assert!(!should_compress("VOICE_0001"));
        // Prefix check is on the base name, not the directory
        assert!(should_compress("bgm/cover.t32"));
    }

    #[test]
    fn test_empty_roundtrip() {
        let wrapped = encode(b"").unwrap();
        assert_eq!(decode(&wrapped).unwrap(), b"");
    }
}
