use std::fmt;

use serde::Serialize;

use super::{Fields, InternalId, Value};
use crate::error::{Error, Result};

/// A graph node. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    id: InternalId,
    label: String,
    properties: Fields,
}

impl Node {
    /// Builds a node from its parts.
    pub fn new(id: InternalId, label: impl Into<String>, properties: Fields) -> Self {
        Self {
            id,
            label: label.into(),
            properties,
        }
    }

    /// Record identifier.
    pub fn id(&self) -> InternalId {
        self.id
    }

    /// Table name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// All properties in schema order.
    pub fn properties(&self) -> &Fields {
        &self.properties
    }

    /// Property `name`, if the table has it.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{_ID: {}, _LABEL: {}", self.id, self.label)?;
        for (key, value) in self.properties.iter() {
            write!(f, ", {key}: {value}")?;
        }
        f.write_str("}")
    }
}

/// A directed relationship between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rel {
    src_id: InternalId,
    dst_id: InternalId,
    label: String,
    properties: Fields,
}

impl Rel {
    /// Builds a relationship from its parts.
    pub fn new(
        src_id: InternalId,
        dst_id: InternalId,
        label: impl Into<String>,
        properties: Fields,
    ) -> Self {
        Self {
            src_id,
            dst_id,
            label: label.into(),
            properties,
        }
    }

    /// Node the relationship leaves.
    pub fn src_id(&self) -> InternalId {
        self.src_id
    }

    /// Node the relationship enters.
    pub fn dst_id(&self) -> InternalId {
        self.dst_id
    }

    /// Table name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// All properties in schema order.
    pub fn properties(&self) -> &Fields {
        &self.properties
    }

    /// Property `name`, if the table has it.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl fmt::Display for Rel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-{{_LABEL: {}", self.src_id, self.label)?;
        for (key, value) in self.properties.iter() {
            write!(f, ", {key}: {value}")?;
        }
        write!(f, "}}->({})", self.dst_id)
    }
}

/// A variable-length path: `nodes` joined by `rels`, with exactly one fewer
/// rel than nodes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecursiveRel {
    nodes: Vec<Node>,
    rels: Vec<Rel>,
}

impl RecursiveRel {
    /// Fails with [`Error::Conversion`] unless there is exactly one more
    /// node than rels.
    pub fn new(nodes: Vec<Node>, rels: Vec<Rel>) -> Result<Self> {
        if nodes.is_empty() || rels.len() + 1 != nodes.len() {
            return Err(Error::Conversion(format!(
                "recursive rel with {} nodes cannot have {} rels",
                nodes.len(),
                rels.len()
            )));
        }
        Ok(Self { nodes, rels })
    }

    /// Nodes from start to end.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Relationships between consecutive nodes.
    pub fn rels(&self) -> &[Rel] {
        &self.rels
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Whether the path has no hops.
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}
