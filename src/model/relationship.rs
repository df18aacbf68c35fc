use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::asset::AssetKind;

// ---------------------------------------------------------------------------
// AssetRef: identity of an asset used as a relationship endpoint
// ---------------------------------------------------------------------------

/// Identity key of an asset: (kind, namespace, name). Cluster-scoped kinds
/// carry no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl AssetRef {
    pub fn new(kind: AssetKind, name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: if kind.is_cluster_scoped() {
                None
            } else {
                namespace.map(str::to_string)
            },
        }
    }

    /// Namespace as matched in the graph; absent compares as empty.
    pub fn namespace_key(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// RelationKind: categories of inferred relationships
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// A pod lives in a namespace.
    BelongsTo,
    /// A service's selector targets a pod.
    Selects,
    /// A deployment's selector targets a pod.
    Manages,
    /// A service account is the identity a pod runs as.
    ProvidesIdentity,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::BelongsTo,
        RelationKind::Selects,
        RelationKind::Manages,
        RelationKind::ProvidesIdentity,
    ];

    /// Relationship type name in the graph.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "BELONGS_TO",
            RelationKind::Selects => "SELECTS",
            RelationKind::Manages => "MANAGES",
            RelationKind::ProvidesIdentity => "PROVIDES_IDENTITY",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Relationship: a derived, directed edge between two assets
// ---------------------------------------------------------------------------

/// A directed, typed edge derived from a collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source: AssetRef,
    pub target: AssetRef,
    #[serde(rename = "type")]
    pub relation: RelationKind,
}

impl Relationship {
    pub fn new(source: AssetRef, relation: RelationKind, target: AssetRef) -> Self {
        Self {
            source,
            target,
            relation,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.source, self.relation, self.target)
    }
}
