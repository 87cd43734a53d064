//! # Index Catalog Entries
//!
//! Descriptors for the indexes the enumerator may assign predicates to.
//! The planner receives a slice of [`IndexEntry`] values; index tags refer
//! to entries by their ordinal in that slice.
//!
//! A key pattern is an ordered list of key fields. Regular fields are
//! ascending or descending; special fields mark geo and full-text columns,
//! which change which scan leaf the planner emits for predicates assigned
//! to them.

use std::fmt;

/// Kind of a single key field inside a compound index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Ascending,
    Descending,
    Geo2d,
    Geo2dSphere,
    Text,
}

impl KeyKind {
    /// True for the plain ordered kinds that carry interval bounds.
    pub fn is_ordered(&self) -> bool {
        matches!(self, KeyKind::Ascending | KeyKind::Descending)
    }
}

/// One `(field, kind)` component of a key pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComponent {
    name: String,
    kind: KeyKind,
}

impl KeyComponent {
    pub fn new(name: impl Into<String>, kind: KeyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn asc(name: impl Into<String>) -> Self {
        Self::new(name, KeyKind::Ascending)
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self::new(name, KeyKind::Descending)
    }

    pub fn geo_2d(name: impl Into<String>) -> Self {
        Self::new(name, KeyKind::Geo2d)
    }

    pub fn geo_2dsphere(name: impl Into<String>) -> Self {
        Self::new(name, KeyKind::Geo2dSphere)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, KeyKind::Text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }
}

impl fmt::Display for KeyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            KeyKind::Ascending => write!(f, "{}: 1", self.name),
            KeyKind::Descending => write!(f, "{}: -1", self.name),
            KeyKind::Geo2d => write!(f, "{}: \"2d\"", self.name),
            KeyKind::Geo2dSphere => write!(f, "{}: \"2dsphere\"", self.name),
            KeyKind::Text => write!(f, "{}: \"text\"", self.name),
        }
    }
}

/// Ordered key fields of a compound index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    components: Vec<KeyComponent>,
}

impl KeyPattern {
    pub fn new(components: Vec<KeyComponent>) -> Self {
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component(&self, index: usize) -> Option<&KeyComponent> {
        self.components.get(index)
    }

    pub fn first(&self) -> Option<&KeyComponent> {
        self.components.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyComponent> {
        self.components.iter()
    }

    /// Offset of the text column, i.e. the number of leading prefix fields
    /// of a text index. `None` for non-text patterns.
    pub fn text_position(&self) -> Option<usize> {
        self.components.iter().position(|c| c.kind() == KeyKind::Text)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", component)?;
        }
        write!(f, " }}")
    }
}

/// Broad index families the planner treats differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Regular,
    Text,
    Geo2d,
    Geo2dSphere,
}

/// A catalog index descriptor as handed to the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    name: String,
    key_pattern: KeyPattern,
    multikey: bool,
    index_type: IndexType,
}

impl IndexEntry {
    /// Builds an entry, deriving the index family from the key pattern:
    /// a leading 2d field makes a 2d index, any text field a text index,
    /// any 2dsphere field a 2dsphere index.
    pub fn new(name: impl Into<String>, key_pattern: KeyPattern) -> Self {
        let index_type = Self::infer_type(&key_pattern);
        Self {
            name: name.into(),
            key_pattern,
            multikey: false,
            index_type,
        }
    }

    /// Marks whether any indexed field has ever held an array value.
    pub fn with_multikey(mut self, multikey: bool) -> Self {
        self.multikey = multikey;
        self
    }

    fn infer_type(key_pattern: &KeyPattern) -> IndexType {
        if key_pattern.first().map(|c| c.kind()) == Some(KeyKind::Geo2d) {
            return IndexType::Geo2d;
        }
        for component in key_pattern.iter() {
            match component.kind() {
                KeyKind::Text => return IndexType::Text,
                KeyKind::Geo2dSphere => return IndexType::Geo2dSphere,
                _ => {}
            }
        }
        IndexType::Regular
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_pattern(&self) -> &KeyPattern {
        &self.key_pattern
    }

    pub fn multikey(&self) -> bool {
        self.multikey
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }
}
