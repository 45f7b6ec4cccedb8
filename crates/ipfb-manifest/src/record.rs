//! Manifest records: flat, ordered attribute maps.

/// One manifest record.
///
/// Attributes keep their insertion order so a saved manifest diffs cleanly
/// against a re-extracted one. `kind` and `container` are set at
/// construction; everything else is free-form string attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    attrs: Vec<(String, String)>,
}

impl Record {
    /// Create a record with its `kind` discriminator and `container`
    /// back-reference already set.
    pub fn new(kind: &str, container: &str) -> Self {
        let mut record = Self::default();
        record.set("kind", kind);
        record.set("container", container);
        record
    }

    /// Create a record from raw attributes (used by the XML loader).
    pub fn from_attrs(attrs: Vec<(String, String)>) -> Self {
        Self { attrs }
    }

    /// Set an attribute, replacing any previous value in place.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key.to_string(), value)),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Get an attribute value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get an attribute parsed as `u32` (decimal).
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)?.trim().parse().ok()
    }

    /// Get an attribute parsed as `i32` (decimal).
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key)?.trim().parse().ok()
    }

    /// The `kind` discriminator.
    pub fn kind(&self) -> &str {
        self.get("kind").unwrap_or("")
    }

    /// The `container` back-reference: which packed entry this record
    /// belongs to.
    pub fn container(&self) -> &str {
        self.get("container").unwrap_or("")
    }

    /// The sibling ordinal, from either an `index` or a `set` attribute.
    ///
    /// Records may arrive out of order under concurrent extraction; rebuild
    /// sorts siblings by this before serializing.
    pub fn ordinal(&self) -> Option<u32> {
        self.get_u32("index").or_else(|| self.get_u32("set"))
    }

    /// All attributes, in insertion order.
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }
}
