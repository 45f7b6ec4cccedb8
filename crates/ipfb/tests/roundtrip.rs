//! End-to-end pack/unpack scenarios.

use std::path::Path;

use image::RgbaImage;

use ipfb::prelude::*;
use ipfb::transform::texcodec::{self, TexFormat, TexHeader};
use ipfb_pak::{envelope, PakArchive, PAD_UNIT};

fn registry() -> Registry {
    Registry::standard()
}

fn no_progress(_done: usize, _total: usize) {}

fn sample_texture_bytes() -> Vec<u8> {
    let header = TexHeader {
        format: Some(TexFormat::Rgba32),
        words: [11, 22, 33, 44],
        width: 48,
        height: 24,
        flags: 3,
        logical_w: 40,
        logical_h: 20,
    };
    let img = RgbaImage::from_fn(48, 24, |x, y| {
        image::Rgba([(x * 5) as u8, (y * 9) as u8, 0x5A, 255])
    });
    texcodec::encode(&header, &img).unwrap()
}

fn sample_atlas_bytes() -> Vec<u8> {
    let glyph = {
        let header = TexHeader {
            format: Some(TexFormat::Rgba32),
            words: [1, 1, 2, 3],
            width: 8,
            height: 8,
            flags: 0,
            logical_w: 8,
            logical_h: 8,
        };
        let img = RgbaImage::from_fn(8, 8, |x, y| {
            image::Rgba([x as u8 * 31, y as u8 * 31, 0x10, 255])
        });
        texcodec::encode(&header, &img).unwrap()
    };

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"LSTA");
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(&0x0041u16.to_be_bytes());
    bytes.push(0);
    bytes.extend_from_slice(&2i32.to_be_bytes());
    bytes.extend_from_slice(&3i32.to_be_bytes());
    bytes.extend_from_slice(&(glyph.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&glyph);
    bytes
}

fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel, data) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
}

/// Read every entry's stored (pre-envelope) bytes, keyed by hash.
fn stored_entries(pak: &Path) -> Vec<(u32, Vec<u8>)> {
    let archive = PakArchive::open(pak).unwrap();
    let mut out = Vec::new();
    for (part, entries) in archive.part_groups() {
        let mut reader = archive.open_part(part).unwrap();
        for entry in entries {
            out.push((entry.hash, reader.read_entry(&entry).unwrap()));
        }
    }
    out.sort_by_key(|(hash, _)| *hash);
    out
}

#[test]
fn pack_then_unpack_restores_raw_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let out = dir.path().join("out");
    let pak = dir.path().join("game.pak");

    let blob: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();
    write_tree(
        &input,
        &[
            ("misc/blob.bin", blob.as_slice()),
            ("scripts/readme.md", b"hello world"),
        ],
    );

    let stats = pack_directory(&input, &pak, &registry(), no_progress).unwrap();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.replayed, 0);

    // Names for the unpack side
    std::fs::write(
        dir.path().join("list.txt"),
        "misc/blob.bin\nscripts/readme.md\n",
    )
    .unwrap();

    let stats = unpack_archive(&pak, &out, &registry(), no_progress).unwrap();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.named, 2);

    assert_eq!(std::fs::read(out.join("misc/blob.bin")).unwrap(), blob);
    assert_eq!(
        std::fs::read(out.join("scripts/readme.md")).unwrap(),
        b"hello world"
    );
}

#[test]
fn manifest_declared_texture_scenario() {
    // One manifest-declared standalone texture plus two unrelated
    // compressible raw files -> a .pak/.p00 pair with exactly three
    // hash-sorted entries, non-final entries 2048-aligned, and the
    // texture entry wearing the envelope.
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let pak = dir.path().join("tex.pak");

    let texture = sample_texture_bytes();
    let (header, img) = texcodec::decode(&texture).unwrap();

    // The editable tree: a PNG sidecar + the manifest that describes it
    std::fs::create_dir_all(input.join("ui")).unwrap();
    let mut png = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut png),
        image::ImageFormat::Png,
    )
    .unwrap();
    std::fs::write(input.join("ui/title.t32.png"), &png).unwrap();

    let mut manifest = Manifest::new();
    manifest.push(
        Section::Textures,
        ipfb::transform::texture_record(
            "standalone",
            "ui/title.t32",
            0,
            file_id("ui/title.t32"),
            "ui/title.t32.png",
            &header,
        ),
    );
    manifest.save(&input.join("list.xml")).unwrap();

    write_tree(
        &input,
        &[
            ("data/alpha.bin", b"alpha payload".as_slice()),
            ("data/beta.bin", b"beta payload".as_slice()),
        ],
    );

    let stats = pack_directory(&input, &pak, &registry(), no_progress).unwrap();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.replayed, 1);

    assert!(pak.exists());
    assert!(dir.path().join("tex.p00").exists());

    let archive = PakArchive::open(&pak).unwrap();
    assert_eq!(archive.entry_count(), 3);

    // Index is non-decreasing in hash
    let hashes: Vec<u32> = archive.entries().iter().map(|e| e.hash).collect();
    let mut sorted = hashes.clone();
    sorted.sort_unstable();
    assert_eq!(hashes, sorted);

    // Every non-final entry starts the next one on a padding boundary
    for entry in &archive.entries()[1..] {
        assert_eq!(entry.inner_offset() % PAD_UNIT, 0);
    }

    // The texture entry was wrapped, and unwraps to the packed texture
    let tex_hash = file_id("ui/title.t32");
    let stored = stored_entries(&pak);
    let (_, tex_stored) = stored.iter().find(|(h, _)| *h == tex_hash).unwrap();
    assert_eq!(&tex_stored[..2], b"Z1");
    assert_eq!(envelope::decode(tex_stored).unwrap(), texture);
}

#[test]
fn editable_roundtrip_rebuilds_identical_archives() {
    // Pack packed binaries -> unpack to the editable tree -> pack again.
    // The second archive must be byte-identical to the first: textures and
    // atlases rebuild from manifest records, everything else passes
    // through raw.
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("original");
    let edit = dir.path().join("editable");
    let pak1 = dir.path().join("first.pak");
    let pak2 = dir.path().join("second.pak");

    let texture = sample_texture_bytes();
    let atlas = sample_atlas_bytes();
    let blob: Vec<u8> = (0..5000u32).map(|i| (i ^ 0x35) as u8).collect();

    write_tree(
        &input,
        &[
            ("ui/title.t32", texture.as_slice()),
            ("fonts/main.fnt", atlas.as_slice()),
            ("misc/blob.bin", blob.as_slice()),
        ],
    );

    pack_directory(&input, &pak1, &registry(), no_progress).unwrap();

    std::fs::write(
        dir.path().join("list.txt"),
        "ui/title.t32\nfonts/main.fnt\nmisc/blob.bin\n",
    )
    .unwrap();

    let stats = unpack_archive(&pak1, &edit, &registry(), no_progress).unwrap();
    assert_eq!(stats.entries, 3);

    // The editable tree holds sidecars, not packed binaries
    assert!(edit.join("ui/title.t32.png").exists());
    assert!(!edit.join("ui/title.t32").exists());
    assert!(edit.join("fonts/main/0041.png").exists());
    assert!(edit.join("list.xml").exists());
    assert_eq!(std::fs::read(edit.join("misc/blob.bin")).unwrap(), blob);

    pack_directory(&edit, &pak2, &registry(), no_progress).unwrap();

    assert_eq!(
        std::fs::read(&pak1).unwrap(),
        std::fs::read(&pak2).unwrap(),
        "index differs after editable round trip"
    );
    assert_eq!(
        std::fs::read(dir.path().join("first.p00")).unwrap(),
        std::fs::read(dir.path().join("second.p00")).unwrap(),
        "part file differs after editable round trip"
    );
}

#[test]
fn duplicate_hash_last_merge_wins() {
    // Two inputs engineered to the same FileID via the $HEX override; the
    // lexicographically later one is merged last and must win.
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let pak = dir.path().join("dup.pak");

    write_tree(
        &input,
        &[
            ("a/$0000002A.dat", b"first body".as_slice()),
            ("b/$0000002A.raw", b"second body".as_slice()),
        ],
    );

    let stats = pack_directory(&input, &pak, &registry(), no_progress).unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.files, 2);

    let stored = stored_entries(&pak);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, 0x2A);
    assert_eq!(envelope::decode(&stored[0].1).unwrap(), b"second body");
}

#[test]
fn unknown_hash_gets_fallback_name_with_guessed_extension() {
    // A raw (unwrapped) entry whose hash is absent from the name table
    // comes out as "$" + HEX8 plus a guessed extension.
    let dir = tempfile::tempdir().unwrap();
    let pak = dir.path().join("anon.pak");
    let out = dir.path().join("out");

    let mut payloads = rustc_hash::FxHashMap::default();
    payloads.insert(0x0000_002Au32, b"DATA0123456789".to_vec());
    payloads.insert(0x0000_0FF0u32, b"\x89PNG-ish not alnum".to_vec());
    ipfb_pak::write_archive(&payloads, &pak).unwrap();

    let stats = unpack_archive(&pak, &out, &registry(), no_progress).unwrap();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.named, 0);

    assert_eq!(
        std::fs::read(out.join("$0000002A.DATA")).unwrap(),
        b"DATA0123456789"
    );
    assert_eq!(
        std::fs::read(out.join("$00000FF0")).unwrap(),
        b"\x89PNG-ish not alnum"
    );
}

#[test]
fn no_compress_extensions_stored_raw() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let pak = dir.path().join("fonts.pak");

    let font = vec![0x42u8; 4000];
    write_tree(&input, &[("fonts/main.ttf", font.as_slice())]);

    pack_directory(&input, &pak, &registry(), no_progress).unwrap();

    let stored = stored_entries(&pak);
    assert_eq!(stored.len(), 1);
    // Stored verbatim, no envelope
    assert_eq!(stored[0].1, font);
}

#[test]
fn transformer_filter_none_extracts_raw() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let out = dir.path().join("out");
    let pak = dir.path().join("raw.pak");

    let texture = sample_texture_bytes();
    write_tree(&input, &[("ui/title.t32", texture.as_slice())]);
    pack_directory(&input, &pak, &registry(), no_progress).unwrap();

    std::fs::write(dir.path().join("list.txt"), "ui/title.t32\n").unwrap();

    let mut disabled = Registry::standard();
    disabled.apply_filter(&Filter::None).unwrap();
    unpack_archive(&pak, &out, &disabled, no_progress).unwrap();

    // With the chain disabled the packed bytes land on disk verbatim
    assert_eq!(std::fs::read(out.join("ui/title.t32")).unwrap(), texture);
    assert!(!out.join("ui/title.t32.png").exists());
}
