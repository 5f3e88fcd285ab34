//! Conversion between engine [`RawValue`]s and host [`Value`]s.

use time::UtcOffset;

use super::temporal;
use super::{Fields, InternalId, Node, RecursiveRel, Rel, Value};
use crate::engine::{LogicalKind, RawInternalId, RawNode, RawRel, RawValue};
use crate::error::{Error, Result};

impl From<RawInternalId> for InternalId {
    fn from(id: RawInternalId) -> Self {
        InternalId::new(id.table_id, id.offset)
    }
}

impl From<InternalId> for RawInternalId {
    fn from(id: InternalId) -> Self {
        RawInternalId {
            table_id: id.table_id,
            offset: id.offset,
        }
    }
}

fn properties(raw: &[(String, RawValue)]) -> Result<Fields> {
    let mut fields = Fields::with_capacity(raw.len());
    for (name, value) in raw {
        fields.insert(name.clone(), to_value(value)?);
    }
    Ok(fields)
}

fn node(raw: &RawNode) -> Result<Node> {
    Ok(Node::new(raw.id.into(), raw.label.clone(), properties(&raw.properties)?))
}

fn rel(raw: &RawRel) -> Result<Rel> {
    Ok(Rel::new(
        raw.src_id.into(),
        raw.dst_id.into(),
        raw.label.clone(),
        properties(&raw.properties)?,
    ))
}

fn expect_node(raw: &RawValue) -> Result<Node> {
    match raw {
        RawValue::Node(n) => node(n),
        other => Err(Error::Conversion(format!(
            "recursive rel node list holds {}",
            other.kind()
        ))),
    }
}

fn expect_rel(raw: &RawValue) -> Result<Rel> {
    match raw {
        RawValue::Rel(r) => rel(r),
        other => Err(Error::Conversion(format!(
            "recursive rel rel list holds {}",
            other.kind()
        ))),
    }
}

fn decimal(text: &str) -> Result<Value> {
    text.trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| Error::Conversion(format!("invalid decimal text '{text}'")))
}

/// Converts an engine value into its host representation.
pub(crate) fn to_value(raw: &RawValue) -> Result<Value> {
    Ok(match raw {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Serial(v) | RawValue::Int64(v) => Value::Int(i128::from(*v)),
        RawValue::Int8(v) => Value::Int(i128::from(*v)),
        RawValue::Int16(v) => Value::Int(i128::from(*v)),
        RawValue::Int32(v) => Value::Int(i128::from(*v)),
        RawValue::Int128(v) => Value::Int(*v),
        RawValue::UInt8(v) => Value::Int(i128::from(*v)),
        RawValue::UInt16(v) => Value::Int(i128::from(*v)),
        RawValue::UInt32(v) => Value::Int(i128::from(*v)),
        RawValue::UInt64(v) => Value::Int(i128::from(*v)),
        RawValue::Float(v) => Value::Float(f64::from(*v)),
        RawValue::Double(v) => Value::Float(*v),
        RawValue::Decimal(text) => decimal(text)?,
        RawValue::Date(days) => Value::Date(temporal::date_from_days(*days)?),
        RawValue::Timestamp(us) => Value::Timestamp(temporal::timestamp_from_us(*us, None)?),
        RawValue::TimestampTz(us) => {
            Value::Timestamp(temporal::timestamp_from_us(*us, Some(UtcOffset::UTC))?)
        }
        RawValue::TimestampSec(secs) => Value::Timestamp(temporal::timestamp_from_secs(*secs)?),
        RawValue::TimestampMs(ms) => Value::Timestamp(temporal::timestamp_from_ms(*ms)?),
        RawValue::TimestampNs(ns) => Value::Timestamp(temporal::timestamp_from_ns(*ns)?),
        RawValue::Interval {
            months,
            days,
            micros,
        } => Value::Interval(temporal::interval_seconds(*months, *days, *micros)),
        RawValue::InternalId(id) => Value::InternalId((*id).into()),
        RawValue::String(s) => Value::String(s.clone()),
        RawValue::Uuid(s) => Value::String(s.to_ascii_lowercase()),
        RawValue::Blob(bytes) => Value::Blob(bytes.clone()),
        RawValue::List(items) | RawValue::Array(items) => Value::List(
            items
                .iter()
                .map(to_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        RawValue::Struct(fields) => Value::Struct(properties(fields)?),
        RawValue::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| Ok((to_value(k)?, to_value(v)?)))
                .collect::<Result<Vec<_>>>()?,
        ),
        RawValue::Node(n) => Value::Node(node(n)?),
        RawValue::Rel(r) => Value::Rel(rel(r)?),
        RawValue::RecursiveRel { nodes, rels } => Value::RecursiveRel(RecursiveRel::new(
            nodes.iter().map(expect_node).collect::<Result<_>>()?,
            rels.iter().map(expect_rel).collect::<Result<_>>()?,
        )?),
        RawValue::Union { .. } | RawValue::Pointer(_) => {
            return Err(Error::UnsupportedType(raw.kind()))
        }
    })
}

/// Checks that every non-null value has the same kind.
fn uniform_kind<'a>(values: impl IntoIterator<Item = &'a RawValue>) -> std::result::Result<(), String> {
    let mut seen: Option<LogicalKind> = None;
    for value in values {
        if matches!(value, RawValue::Null) {
            continue;
        }
        match seen {
            None => seen = Some(value.kind()),
            Some(kind) if kind == value.kind() => {}
            Some(kind) => return Err(format!("mixes {kind} and {}", value.kind())),
        }
    }
    Ok(())
}

/// Converts a host value into the engine encoding for parameter binding.
pub(crate) fn to_raw(name: &str, value: &Value) -> Result<RawValue> {
    Ok(match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Bool(*b),
        Value::Int(i) => {
            if let Ok(v) = i64::try_from(*i) {
                RawValue::Int64(v)
            } else if let Ok(v) = u64::try_from(*i) {
                RawValue::UInt64(v)
            } else {
                RawValue::Int128(*i)
            }
        }
        Value::Float(f) => RawValue::Double(*f),
        Value::String(s) => RawValue::String(s.clone()),
        Value::Blob(bytes) => RawValue::Blob(bytes.clone()),
        Value::Date(date) => RawValue::Date(temporal::days_from_date(*date)),
        Value::Timestamp(ts) => {
            let micros = temporal::micros_from_timestamp(*ts)
                .map_err(|err| Error::parameter(name, err.to_string()))?;
            if ts.offset().is_utc() {
                RawValue::Timestamp(micros)
            } else {
                RawValue::TimestampTz(micros)
            }
        }
        Value::Interval(secs) => RawValue::Interval {
            months: 0,
            days: 0,
            micros: temporal::interval_micros(*secs)
                .map_err(|err| Error::parameter(name, err.to_string()))?,
        },
        Value::InternalId(id) => RawValue::InternalId((*id).into()),
        Value::List(items) => {
            let raw = items
                .iter()
                .map(|item| to_raw(name, item))
                .collect::<Result<Vec<_>>>()?;
            uniform_kind(&raw).map_err(|clash| {
                Error::parameter(name, format!("list elements must share one type, list {clash}"))
            })?;
            RawValue::List(raw)
        }
        Value::Struct(fields) => RawValue::Struct(
            fields
                .iter()
                .map(|(key, value)| Ok((key.to_string(), to_raw(name, value)?)))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(entries) => {
            let raw = entries
                .iter()
                .map(|(k, v)| Ok((to_raw(name, k)?, to_raw(name, v)?)))
                .collect::<Result<Vec<_>>>()?;
            uniform_kind(raw.iter().map(|(k, _)| k)).map_err(|clash| {
                Error::parameter(name, format!("map keys must share one type, keys {clash}"))
            })?;
            uniform_kind(raw.iter().map(|(_, v)| v)).map_err(|clash| {
                Error::parameter(name, format!("map values must share one type, values {clash}"))
            })?;
            RawValue::Map(raw)
        }
        Value::Node(_) | Value::Rel(_) | Value::RecursiveRel(_) => {
            return Err(Error::parameter(
                name,
                "graph elements cannot be bound as parameters",
            ))
        }
    })
}
