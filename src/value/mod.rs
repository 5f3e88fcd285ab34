//! Host-side values returned by queries and accepted as parameters.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

mod graph;
pub(crate) mod marshal;
pub mod temporal;

pub use graph::{Node, RecursiveRel, Rel};

/// Engine record identifier: owning table and offset within it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InternalId {
    /// Table the record lives in.
    pub table_id: u64,
    /// Position within the table.
    pub offset: u64,
}

impl InternalId {
    /// Identifier of record `offset` in table `table_id`.
    pub fn new(table_id: u64, offset: u64) -> Self {
        Self { table_id, offset }
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.offset)
    }
}

/// Dynamically typed value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Every engine integer width, signed or unsigned.
    Int(i128),
    /// Either float width, and decimals.
    Float(f64),
    /// UTF-8 text. UUIDs arrive here in lower case.
    String(String),
    /// Binary value (base64-encoded when serialized).
    Blob(#[serde(serialize_with = "serialize_blob")] Vec<u8>),
    /// Calendar date.
    Date(#[serde(serialize_with = "serialize_date")] Date),
    /// Instant in UTC, whatever unit the engine used.
    Timestamp(#[serde(serialize_with = "serialize_timestamp")] OffsetDateTime),
    /// Duration in seconds.
    Interval(f64),
    /// Record identifier.
    InternalId(InternalId),
    /// Lists and fixed-size arrays.
    List(Vec<Value>),
    /// Named fields in engine order.
    Struct(Fields),
    /// Key/value pairs in engine order.
    Map(Vec<(Value, Value)>),
    /// Graph node.
    Node(Node),
    /// Graph relationship.
    Rel(Rel),
    /// Variable-length path.
    RecursiveRel(RecursiveRel),
}

fn serialize_blob<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
}

fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(date)
}

fn serialize_timestamp<S: Serializer>(
    ts: &OffsetDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let text = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

impl Value {
    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if it fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Float payload. Intervals report their seconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) | Value::Interval(f) => Some(*f),
            _ => None,
        }
    }

    /// Text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// List items.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Struct fields.
    pub fn as_struct(&self) -> Option<&Fields> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Node payload.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Relationship payload.
    pub fn as_rel(&self) -> Option<&Rel> {
        match self {
            Value::Rel(rel) => Some(rel),
            _ => None,
        }
    }

    /// Path payload.
    pub fn as_recursive_rel(&self) -> Option<&RecursiveRel> {
        match self {
            Value::RecursiveRel(path) => Some(path),
            _ => None,
        }
    }
}

fn write_list<'a, T: fmt::Display + 'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = &'a T>,
) -> fmt::Result {
    f.write_str("[")?;
    for (idx, item) in items.into_iter().enumerate() {
        if idx > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Blob(bytes) => bytes.iter().try_for_each(|b| write!(f, "\\x{b:02X}")),
            Value::Date(d) => write!(f, "{d}"),
            Value::Timestamp(ts) => match ts.format(&Rfc3339) {
                Ok(text) => f.write_str(&text),
                Err(_) => write!(f, "{ts}"),
            },
            Value::Interval(secs) => write!(f, "{secs}s"),
            Value::InternalId(id) => write!(f, "{id}"),
            Value::List(items) => write_list(f, items),
            Value::Struct(fields) => write!(f, "{fields}"),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str("}")
            }
            Value::Node(node) => write!(f, "{node}"),
            Value::Rel(rel) => write!(f, "{rel}"),
            Value::RecursiveRel(path) => {
                f.write_str("{_NODES: ")?;
                write_list(f, path.nodes())?;
                f.write_str(", _RELS: ")?;
                write_list(f, path.rels())?;
                f.write_str("}")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(i128::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(v: OffsetDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Value::Struct(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Ordered name-to-value map with unique keys. Struct values keep the field
/// order the engine reports.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    /// Empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty field map with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts or replaces `name`. A replaced field keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Value of field `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Whether field `name` is present.
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Name and value pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (key, value)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

/// One row of a result set, keyed by column name.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Tuple {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Value of column `name`. The first column wins when names repeat.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|column| column == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value at column position `idx`.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Column names shared by every row of the set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Name and value pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Drops the column names.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Serialize for Tuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
