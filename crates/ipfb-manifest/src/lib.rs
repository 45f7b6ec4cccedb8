//! The sidecar manifest (`list.xml`).
//!
//! Editable sidecar files carry no format-specific headers of their own -
//! a texture becomes a plain PNG, a font atlas becomes a folder of PNGs.
//! The manifest is the ledger of structural facts extraction learned and
//! repacking needs: texture header words, container entry ordering, which
//! images belong to which packed entry.
//!
//! Records are flat, ordered attribute maps. Every record carries a `kind`
//! discriminator and a `container` back-reference so the records belonging
//! to one packed entry can be regrouped, plus an `index`/`set` ordinal so
//! siblings can be re-sorted into original order - under concurrent
//! extraction they arrive in whatever order the workers finish.

mod record;
mod xml;

use std::path::Path;

use parking_lot::Mutex;
use thiserror::Error;

pub use record::Record;

/// Manifest error type.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML syntax or structure error.
    #[error("manifest XML error: {0}")]
    Xml(String),
}

/// Result type for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;

/// The manifest sections, one per composite-asset family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Standalone and embedded texture header records.
    Textures,
    /// Font/atlas container records.
    Atlases,
    /// Particle-effect container records.
    Effects,
}

impl Section {
    /// All sections, in serialization order.
    pub const ALL: [Section; 3] = [Section::Textures, Section::Atlases, Section::Effects];

    /// The XML element name of this section.
    pub const fn tag(self) -> &'static str {
        match self {
            Section::Textures => "textures",
            Section::Atlases => "atlases",
            Section::Effects => "effects",
        }
    }

    /// Parse a section from its element name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Section::ALL.iter().copied().find(|s| s.tag() == tag)
    }
}

/// The in-memory manifest: ordered records grouped into named sections.
#[derive(Debug, Default)]
pub struct Manifest {
    textures: Vec<Record>,
    atlases: Vec<Record>,
    effects: Vec<Record>,
}

impl Manifest {
    /// An empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of one section, in append order.
    pub fn section(&self, section: Section) -> &[Record] {
        match section {
            Section::Textures => &self.textures,
            Section::Atlases => &self.atlases,
            Section::Effects => &self.effects,
        }
    }

    /// Append a record to a section.
    pub fn push(&mut self, section: Section, record: Record) {
        match section {
            Section::Textures => self.textures.push(record),
            Section::Atlases => self.atlases.push(record),
            Section::Effects => self.effects.push(record),
        }
    }

    /// Whether no section holds any record.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.atlases.is_empty() && self.effects.is_empty()
    }

    /// Total record count across sections.
    pub fn len(&self) -> usize {
        self.textures.len() + self.atlases.len() + self.effects.len()
    }

    /// Load a manifest from disk. A missing file is an empty manifest; a
    /// present but malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => xml::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the manifest to disk as indented XML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = xml::serialize(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Concurrent append access to a manifest under construction.
///
/// Extraction workers push records from many threads; serialization only
/// happens after every worker has joined, through [`ManifestSink::into_inner`].
#[derive(Debug, Default)]
pub struct ManifestSink {
    inner: Mutex<Manifest>,
}

impl ManifestSink {
    /// Start a sink from an existing (usually empty) manifest.
    pub fn new(manifest: Manifest) -> Self {
        Self {
            inner: Mutex::new(manifest),
        }
    }

    /// Append one record.
    pub fn push(&self, section: Section, record: Record) {
        self.inner.lock().push(section, record);
    }

    /// Take the accumulated manifest. Call only after workers have joined.
    pub fn into_inner(self) -> Manifest {
        self.inner.into_inner()
    }
}
