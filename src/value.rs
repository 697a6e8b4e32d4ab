//! Tagged value model for merged configuration trees.
//!
//! Configuration data is held as an explicit variant type rather than raw
//! JSON: a tree position is a scalar, an array, a [`Table`], or a pending
//! [`Reference`] to an external file. Metadata that the default serializer
//! must not emit (where a table was loaded from, whether the load failed)
//! lives in dedicated `Table` fields instead of hidden map entries.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A single position in a configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Table(Table),
    /// A `conf:`-flagged string awaiting resolution into file contents.
    Reference(Reference),
}

impl Value {
    /// JavaScript-style truthiness: `null`, `false`, `0` and `""` are falsy,
    /// everything else (including empty tables and arrays) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Table(_) | Value::Reference(_) => true,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_))
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a nested value by dotted path (`"server.port"`). Numeric
    /// segments index into arrays. Returns `None` when any segment is
    /// missing or lands on a non-container.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Value::Table(t) => t.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable counterpart of [`Value::get_path`].
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Value::Table(t) => t.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a nested value by dotted path. A single-segment path inserts into
    /// a table directly; for longer paths every intermediate segment must
    /// already exist, otherwise the set silently aborts (no auto-vivification).
    pub fn set_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => match self {
                Value::Table(t) => {
                    t.insert(path.to_string(), value);
                }
                Value::Array(items) => {
                    if let Ok(index) = path.parse::<usize>()
                        && index < items.len()
                    {
                        items[index] = value;
                    }
                }
                _ => {}
            },
            Some((head, rest)) => {
                let next = match self {
                    Value::Table(t) => t.get_mut(head),
                    Value::Array(items) => {
                        head.parse::<usize>().ok().and_then(|i| items.get_mut(i))
                    }
                    _ => None,
                };
                if let Some(next) = next {
                    next.set_path(rest, value);
                }
            }
        }
    }

    /// Convert to plain JSON. Pending references render as their original
    /// `conf:` string; table metadata is not exported.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Table(t) => t.to_json(),
            Value::Reference(r) => serde_json::Value::String(r.original.clone()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Table(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Table(t) => t.serialize(serializer),
            Value::Reference(r) => serializer.serialize_str(&r.original),
        }
    }
}

/// An ordered string-keyed mapping of configuration entries.
///
/// Equality compares entries only; the metadata fields are carriers for
/// resolution bookkeeping and never participate in merge decisions or
/// serialized output.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: BTreeMap<String, Value>,
    origin: Option<PathBuf>,
    load_failed: Option<String>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.entries.iter_mut()
    }

    /// Dotted-path lookup rooted at this table.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        match path.split_once('.') {
            None => self.get(path),
            Some((head, rest)) => self.get(head)?.get_path(rest),
        }
    }

    /// Mutable dotted-path lookup rooted at this table.
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        match path.split_once('.') {
            None => self.get_mut(path),
            Some((head, rest)) => self.get_mut(head)?.get_path_mut(rest),
        }
    }

    /// Dotted-path set rooted at this table; same no-auto-vivification rule
    /// as [`Value::set_path`].
    pub fn set_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => {
                self.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                if let Some(next) = self.get_mut(head) {
                    next.set_path(rest, value);
                }
            }
        }
    }

    /// Path of the file this table was resolved from, when it was produced
    /// by external-reference resolution.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub(crate) fn set_origin(&mut self, path: PathBuf) {
        self.origin = Some(path);
    }

    /// Error text recorded when resolving an external reference failed and
    /// the table degraded to an empty placeholder.
    pub fn load_failed(&self) -> Option<&str> {
        self.load_failed.as_deref()
    }

    pub(crate) fn set_load_failed(&mut self, reason: String) {
        self.load_failed = Some(reason);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl FromIterator<(String, Value)> for Table {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            origin: None,
            load_failed: None,
        }
    }
}

impl IntoIterator for Table {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A pending external reference, standing in for a `conf:`-flagged string
/// until the final resolution pass replaces it with the loaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    path: String,
    base_dir: PathBuf,
    overrides: Table,
    original: String,
}

impl Reference {
    pub fn new(path: String, base_dir: PathBuf, original: String) -> Self {
        Self {
            path,
            base_dir,
            overrides: Table::new(),
            original,
        }
    }

    /// The referenced file, as written after the flag (trimmed).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    /// Directory relative references resolve against: the directory of the
    /// source that introduced the reference.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Values captured from later-merged sources that targeted the same key
    /// path; merged onto the loaded file during resolution.
    pub fn overrides(&self) -> &Table {
        &self.overrides
    }

    pub(crate) fn overrides_mut(&mut self) -> &mut Table {
        &mut self.overrides
    }

    pub(crate) fn take_overrides(&mut self) -> Table {
        std::mem::take(&mut self.overrides)
    }

    /// The full original string, used to roll nested references back to
    /// text and to serialize a marker that is still pending.
    pub fn original(&self) -> &str {
        &self.original
    }
}
