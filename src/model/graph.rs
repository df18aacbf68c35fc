use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::model::asset::AssetKind;
use crate::model::relationship::AssetRef;

/// Property map of a stored node or relationship.
pub type PropertyMap = Map<String, Value>;

// ---------------------------------------------------------------------------
// Stored graph elements as read back from either channel
// ---------------------------------------------------------------------------

/// A node read back from the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Store-assigned identifier, only meaningful within one channel.
    pub id: String,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl GraphNode {
    /// String property, if present and a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.property_str("name")
    }

    /// Kind recorded in the uniform `type` property.
    pub fn kind(&self) -> Option<AssetKind> {
        self.property_str("type").and_then(|t| t.parse().ok())
    }

    /// Identity key of the asset this node was created from.
    pub fn identity(&self) -> Option<AssetRef> {
        Some(AssetRef::new(
            self.kind()?,
            self.name()?,
            self.property_str("namespace"),
        ))
    }

    /// Parse a property that was stored as a serialized JSON string.
    ///
    /// Returns `None` when the property is absent or not valid JSON.
    pub fn structured(&self, key: &str) -> Option<Value> {
        match self.properties.get(key)? {
            Value::String(raw) => serde_json::from_str(raw).ok(),
            other => Some(other.clone()),
        }
    }
}

/// A relationship read back from the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Id of the node the relationship starts at.
    pub start: String,
    /// Id of the node the relationship ends at.
    pub end: String,
    pub properties: PropertyMap,
}

/// One hop of a path, in traversal order. `relationship` may point either
/// way between `start` and `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub start: GraphNode,
    pub relationship: GraphEdge,
    pub end: GraphNode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub segments: Vec<PathSegment>,
}

impl GraphPath {
    /// Number of hops.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Node names along the path, start to end.
    pub fn node_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.segments.len() + 1);
        if let Some(first) = self.segments.first() {
            names.push(first.start.name().unwrap_or_default().to_string());
        }
        for segment in &self.segments {
            names.push(segment.end.name().unwrap_or_default().to_string());
        }
        names
    }
}

// ---------------------------------------------------------------------------
// GraphValue: structural kind of a returned value, decided once at decode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum GraphValue {
    Node(GraphNode),
    #[serde(rename = "relationship")]
    Edge(GraphEdge),
    Path(GraphPath),
    Scalar(Value),
}

impl GraphValue {
    pub fn as_node(&self) -> Option<&GraphNode> {
        match self {
            GraphValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&GraphEdge> {
        match self {
            GraphValue::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            GraphValue::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// One result row: column names paired with decoded values.
///
/// Columns are held sorted by name. The Bolt protocol hands rows back as
/// maps, so the statement's own column order is not available on every
/// channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub columns: Vec<String>,
    pub values: Vec<GraphValue>,
}

impl Record {
    pub fn new(columns: Vec<String>, values: Vec<GraphValue>) -> Self {
        let mut pairs: Vec<(String, GraphValue)> = columns.into_iter().zip(values).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let (columns, values) = pairs.into_iter().unzip();
        Self { columns, values }
    }

    /// Value of a named column.
    pub fn get(&self, column: &str) -> Option<&GraphValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    /// Integer value of a named scalar column.
    pub fn get_u64(&self, column: &str) -> Option<u64> {
        self.get(column)?.as_scalar()?.as_u64()
    }
}

// ---------------------------------------------------------------------------
// GraphSlice: nodes and relationships separated out of a result set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSlice {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphEdge>,
}

impl GraphSlice {
    /// Partition every returned value by structural kind. Paths and scalars
    /// are dropped.
    pub fn from_records(records: &[Record]) -> Self {
        let mut slice = GraphSlice::default();
        for value in records.iter().flat_map(|record| record.values.iter()) {
            match value {
                GraphValue::Node(node) => slice.nodes.push(node.clone()),
                GraphValue::Edge(edge) => slice.relationships.push(edge.clone()),
                GraphValue::Path(_) | GraphValue::Scalar(_) => {}
            }
        }
        slice
    }
}

/// Node counts per kind plus the total relationship count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub nodes: BTreeMap<AssetKind, u64>,
    pub relationships: u64,
}

impl GraphStats {
    pub fn total_nodes(&self) -> u64 {
        self.nodes.values().sum()
    }
}
