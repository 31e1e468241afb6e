// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named key/value archives used to persist cells, nodes and graphs.
//!
//! Persistent state is written through the object-safe [`Serializer`] trait.
//! The same `serialize` function both writes and reads: [`ArchiveWriter`]
//! records every named value into an [`Archive`] tree, [`ArchiveReader`]
//! assigns them back. Archives are stored as RON text or bincode binary.

use crate::value::Vec3;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Symmetric named value stream with nested groups.
///
/// When writing, every method records the current value of its argument.
/// When reading, every method overwrites its argument with the stored value
/// and leaves it untouched if the value is missing.
pub trait Serializer {
    /// Whether values flow from the archive into the arguments
    fn is_reading(&self) -> bool;
    /// Integer value
    fn value_i32(&mut self, name: &str, value: &mut i32);
    /// Unsigned 64-bit value
    fn value_u64(&mut self, name: &str, value: &mut u64);
    /// Float value
    fn value_f32(&mut self, name: &str, value: &mut f32);
    /// Double value
    fn value_f64(&mut self, name: &str, value: &mut f64);
    /// Boolean value
    fn value_bool(&mut self, name: &str, value: &mut bool);
    /// String value
    fn value_string(&mut self, name: &str, value: &mut String);
    /// Vector value
    fn value_vec3(&mut self, name: &str, value: &mut Vec3);
    /// Enter a named group
    fn begin_group(&mut self, name: &str);
    /// Leave the innermost group
    fn end_group(&mut self);
    /// Whether the current group holds `name`; writers hold everything
    fn contains(&self, _name: &str) -> bool {
        true
    }
}

/// One stored value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArchiveValue {
    /// Integer
    I32(i32),
    /// Unsigned 64-bit integer
    U64(u64),
    /// Float
    F32(f32),
    /// Double
    F64(f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(String),
    /// Vector
    Vec3(Vec3),
    /// Nested group
    Group(Archive),
}

impl ArchiveValue {
    /// Short name of the stored kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::I32(_) => "i32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Vec3(_) => "vec3",
            Self::Group(_) => "group",
        }
    }
}

/// On-disk encoding of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Human readable RON
    #[default]
    Ron,
    /// Compact bincode
    Binary,
}

/// Ordered tree of named values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    entries: IndexMap<String, ArchiveValue>,
}

impl Archive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value
    pub fn get(&self, name: &str) -> Option<&ArchiveValue> {
        self.entries.get(name)
    }

    /// Look up a nested group
    pub fn group(&self, name: &str) -> Option<&Archive> {
        match self.entries.get(name) {
            Some(ArchiveValue::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Mutable access to a nested group
    pub fn group_mut(&mut self, name: &str) -> Option<&mut Archive> {
        match self.entries.get_mut(name) {
            Some(ArchiveValue::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Store a value, replacing any previous value of the same name
    pub fn insert(&mut self, name: impl Into<String>, value: ArchiveValue) {
        self.entries.insert(name.into(), value);
    }

    /// Number of entries at this level
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this level is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArchiveValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Encode as pretty RON
    pub fn to_ron(&self) -> Result<String, ArchiveError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Decode from RON
    pub fn from_ron(text: &str) -> Result<Self, ArchiveError> {
        Ok(ron::from_str(text)?)
    }

    /// Encode as bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Write to a file
    pub fn save(&self, path: impl AsRef<Path>, format: ArchiveFormat) -> Result<(), ArchiveError> {
        match format {
            ArchiveFormat::Ron => std::fs::write(path, self.to_ron()?)?,
            ArchiveFormat::Binary => std::fs::write(path, self.to_bytes()?)?,
        }
        Ok(())
    }

    /// Read from a file
    pub fn load(path: impl AsRef<Path>, format: ArchiveFormat) -> Result<Self, ArchiveError> {
        match format {
            ArchiveFormat::Ron => Self::from_ron(&std::fs::read_to_string(path)?),
            ArchiveFormat::Binary => Self::from_bytes(&std::fs::read(path)?),
        }
    }
}

/// Serializer that records values into an [`Archive`]
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    root: Archive,
    open: Vec<(String, Archive)>,
}

impl ArchiveWriter {
    /// Create a writer with an empty root
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> &mut Archive {
        match self.open.last_mut() {
            Some((_, group)) => group,
            None => &mut self.root,
        }
    }

    fn put(&mut self, name: &str, value: ArchiveValue) {
        self.current().insert(name, value);
    }

    /// Close any dangling groups and return the finished archive
    pub fn finish(mut self) -> Archive {
        if !self.open.is_empty() {
            tracing::warn!(open = self.open.len(), "archive finished with open groups");
        }
        while !self.open.is_empty() {
            self.end_group();
        }
        self.root
    }
}

impl Serializer for ArchiveWriter {
    fn is_reading(&self) -> bool {
        false
    }

    fn value_i32(&mut self, name: &str, value: &mut i32) {
        self.put(name, ArchiveValue::I32(*value));
    }

    fn value_u64(&mut self, name: &str, value: &mut u64) {
        self.put(name, ArchiveValue::U64(*value));
    }

    fn value_f32(&mut self, name: &str, value: &mut f32) {
        self.put(name, ArchiveValue::F32(*value));
    }

    fn value_f64(&mut self, name: &str, value: &mut f64) {
        self.put(name, ArchiveValue::F64(*value));
    }

    fn value_bool(&mut self, name: &str, value: &mut bool) {
        self.put(name, ArchiveValue::Bool(*value));
    }

    fn value_string(&mut self, name: &str, value: &mut String) {
        self.put(name, ArchiveValue::Str(value.clone()));
    }

    fn value_vec3(&mut self, name: &str, value: &mut Vec3) {
        self.put(name, ArchiveValue::Vec3(*value));
    }

    fn begin_group(&mut self, name: &str) {
        self.open.push((name.to_owned(), Archive::new()));
    }

    fn end_group(&mut self) {
        match self.open.pop() {
            Some((name, group)) => self.current().insert(name, ArchiveValue::Group(group)),
            None => tracing::warn!("end_group without matching begin_group"),
        }
    }
}

/// Serializer that assigns values from an [`Archive`]
///
/// The first missing key or kind mismatch is kept and reported by
/// [`ArchiveReader::finish`]; reading continues so that as much state as
/// possible is restored.
#[derive(Debug)]
pub struct ArchiveReader<'a> {
    root: &'a Archive,
    open: Vec<Option<&'a Archive>>,
    error: Option<ArchiveError>,
}

impl<'a> ArchiveReader<'a> {
    /// Read from `root`
    pub fn new(root: &'a Archive) -> Self {
        Self {
            root,
            open: Vec::new(),
            error: None,
        }
    }

    fn current(&self) -> Option<&'a Archive> {
        match self.open.last() {
            Some(group) => *group,
            None => Some(self.root),
        }
    }

    fn fail(&mut self, error: ArchiveError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn lookup(&mut self, name: &str) -> Option<&'a ArchiveValue> {
        // A missing enclosing group has already been reported.
        let archive = self.current()?;
        let value = archive.get(name);
        if value.is_none() {
            self.fail(ArchiveError::MissingKey(name.to_owned()));
        }
        value
    }

    fn mismatch(&mut self, name: &str, expected: &'static str, found: &ArchiveValue) {
        self.fail(ArchiveError::KindMismatch {
            name: name.to_owned(),
            expected,
            found: found.kind(),
        });
    }

    /// Report the first error encountered while reading
    pub fn finish(self) -> Result<(), ArchiveError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

macro_rules! read_scalar {
    ($self:ident, $name:ident, $value:ident, $variant:ident, $kind:literal) => {
        match $self.lookup($name) {
            Some(ArchiveValue::$variant(stored)) => *$value = stored.clone(),
            Some(other) => $self.mismatch($name, $kind, other),
            None => {}
        }
    };
}

impl Serializer for ArchiveReader<'_> {
    fn is_reading(&self) -> bool {
        true
    }

    fn value_i32(&mut self, name: &str, value: &mut i32) {
        read_scalar!(self, name, value, I32, "i32");
    }

    fn value_u64(&mut self, name: &str, value: &mut u64) {
        read_scalar!(self, name, value, U64, "u64");
    }

    fn value_f32(&mut self, name: &str, value: &mut f32) {
        read_scalar!(self, name, value, F32, "f32");
    }

    fn value_f64(&mut self, name: &str, value: &mut f64) {
        read_scalar!(self, name, value, F64, "f64");
    }

    fn value_bool(&mut self, name: &str, value: &mut bool) {
        read_scalar!(self, name, value, Bool, "bool");
    }

    fn value_string(&mut self, name: &str, value: &mut String) {
        read_scalar!(self, name, value, Str, "string");
    }

    fn value_vec3(&mut self, name: &str, value: &mut Vec3) {
        read_scalar!(self, name, value, Vec3, "vec3");
    }

    fn begin_group(&mut self, name: &str) {
        let group = match self.lookup(name) {
            Some(ArchiveValue::Group(group)) => Some(group),
            Some(other) => {
                self.mismatch(name, "group", other);
                None
            }
            None => None,
        };
        self.open.push(group);
    }

    fn end_group(&mut self) {
        if self.open.pop().is_none() {
            tracing::warn!("end_group without matching begin_group");
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.current().is_some_and(|archive| archive.get(name).is_some())
    }
}

/// Error while reading or storing an archive
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// A named value was not present
    #[error("Missing archive key: {0}")]
    MissingKey(String),

    /// A named value had another kind than requested
    #[error("Archive key {name} holds {found}, expected {expected}")]
    KindMismatch {
        /// Key name
        name: String,
        /// Requested kind
        expected: &'static str,
        /// Stored kind
        found: &'static str,
    },

    /// RON encoding failed
    #[error("RON encoding failed: {0}")]
    RonEncode(#[from] ron::Error),

    /// RON decoding failed
    #[error("RON decoding failed: {0}")]
    RonDecode(#[from] ron::error::SpannedError),

    /// Binary encoding or decoding failed
    #[error("Binary archive error: {0}")]
    Binary(#[from] bincode::Error),

    /// File access failed
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}
