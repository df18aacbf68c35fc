//! Statement texts and the translation of assets and relationships into
//! parameterized write batches. Both channels send exactly these statements.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::warn;

use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::asset::{Asset, AssetAttributes, AssetInventory, AssetKind};
use crate::model::graph::PropertyMap;
use crate::model::relationship::{AssetRef, RelationKind, Relationship};

pub const PING: &str = "RETURN 1 AS ok";

pub const CLEAR_GRAPH: &str = "MATCH (n) DETACH DELETE n";

pub const ALL_NODES: &str = "MATCH (n) RETURN n";

pub const ALL_RELATIONSHIPS: &str = "MATCH ()-[r]->() RETURN r";

pub const COUNT_RELATIONSHIPS: &str = "MATCH ()-[r]->() RETURN count(r) AS count";

/// Endpoints are bound and filtered first: `shortestPath` fails outright
/// when both ends are the same node.
pub const SHORTEST_PATH: &str = "MATCH (start {name: $startName}), (end {name: $endName}) \
WHERE start <> end \
MATCH path = shortestPath((start)-[*..5]-(end)) \
RETURN path";

pub const VULNERABILITY_PATTERN: &str = "MATCH (a:Pod)-[:CONNECTS_TO]->(b:Service) \
MATCH (c:Pod)-[:RUNS_AS]->(d:ServiceAccount) \
WHERE d.name = 'default' \
RETURN a, b, c, d";

// ---------------------------------------------------------------------------
// Statement
// ---------------------------------------------------------------------------

/// A statement plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    pub parameters: PropertyMap,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: PropertyMap::new(),
        }
    }

    pub fn with_parameters(text: impl Into<String>, parameters: PropertyMap) -> Self {
        Self {
            text: text.into(),
            parameters,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// `ClusterRole` -> `cluster_role`.
fn snake_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len() + 4);
    for (i, ch) in label.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn index_name(kind: AssetKind) -> String {
    format!("{}_name_index", snake_case(kind.label()))
}

pub fn create_index(kind: AssetKind) -> String {
    format!(
        "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.name)",
        index_name(kind),
        kind.label()
    )
}

/// Create one labeled node per row of `$rows`.
pub fn create_nodes(kind: AssetKind) -> String {
    format!("UNWIND $rows AS props CREATE (n:{}) SET n = props", kind.label())
}

/// Merge one typed edge per row of `$rows` between nodes matched on
/// (name, type, namespace). Rows whose endpoints are missing produce
/// nothing; `merged` counts the rows that did.
pub fn merge_relationships(relation: RelationKind) -> String {
    format!(
        "UNWIND $rows AS rel \
MATCH (a {{name: rel.sourceName, type: rel.sourceType}}) \
WHERE coalesce(a.namespace, '') = rel.sourceNamespace \
MATCH (b {{name: rel.targetName, type: rel.targetType}}) \
WHERE coalesce(b.namespace, '') = rel.targetNamespace \
MERGE (a)-[r:{}]->(b) \
RETURN count(r) AS merged",
        relation.as_str()
    )
}

pub fn count_nodes(kind: AssetKind) -> String {
    format!("MATCH (n:{}) RETURN count(n) AS count", kind.label())
}

// ---------------------------------------------------------------------------
// Node property flattening
// ---------------------------------------------------------------------------

fn put_str(props: &mut PropertyMap, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        props.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// Store a structured value as its JSON text.
fn put_json<T: Serialize>(props: &mut PropertyMap, key: &str, value: &T) -> KubeGraphResult<()> {
    props.insert(key.to_string(), Value::String(serde_json::to_string(value)?));
    Ok(())
}

/// Flatten an asset into storable node properties.
///
/// Scalars are stored as-is and maps/lists as JSON strings. `type` always
/// holds the kind, so a Service's own type is stored as `serviceType`.
pub fn node_properties(asset: &Asset) -> KubeGraphResult<PropertyMap> {
    let mut props = PropertyMap::new();
    props.insert("name".into(), json!(asset.name));
    props.insert("type".into(), json!(asset.kind().label()));
    put_str(&mut props, "namespace", asset.namespace.as_deref());
    if let Some(created) = &asset.creation_time {
        props.insert("creationTime".into(), json!(created.to_rfc3339()));
    }
    put_json(&mut props, "labels", &asset.labels)?;

    match &asset.attributes {
        AssetAttributes::Namespace(ns) => {
            put_str(&mut props, "status", ns.status.as_deref());
            put_json(&mut props, "annotations", &ns.annotations)?;
        }
        AssetAttributes::Pod(pod) => {
            put_str(&mut props, "status", pod.status.as_deref());
            put_str(&mut props, "podIP", pod.pod_ip.as_deref());
            put_str(&mut props, "hostIP", pod.host_ip.as_deref());
            put_str(&mut props, "nodeName", pod.node_name.as_deref());
            put_str(&mut props, "serviceAccount", pod.service_account.as_deref());
            put_json(&mut props, "containers", &pod.containers)?;
        }
        AssetAttributes::Service(svc) => {
            put_str(&mut props, "serviceType", svc.service_type.as_deref());
            put_str(&mut props, "clusterIP", svc.cluster_ip.as_deref());
            put_json(&mut props, "externalIPs", &svc.external_ips)?;
            put_json(&mut props, "ports", &svc.ports)?;
            if let Some(selector) = &svc.selector {
                put_json(&mut props, "selector", selector)?;
            }
        }
        AssetAttributes::Deployment(dep) => {
            if let Some(replicas) = dep.replicas {
                props.insert("replicas".into(), json!(replicas));
            }
            props.insert("readyReplicas".into(), json!(dep.ready_replicas));
            if let Some(selector) = &dep.selector {
                put_json(&mut props, "selector", selector)?;
            }
            put_json(&mut props, "template", &dep.template)?;
        }
        AssetAttributes::Ingress(ing) => {
            put_json(&mut props, "rules", &ing.rules)?;
            put_json(&mut props, "tls", &ing.tls)?;
            put_json(&mut props, "annotations", &ing.annotations)?;
        }
        AssetAttributes::Role(role) | AssetAttributes::ClusterRole(role) => {
            put_json(&mut props, "rules", &role.rules)?;
        }
        AssetAttributes::ServiceAccount(sa) => {
            put_json(&mut props, "secrets", &sa.secrets)?;
        }
    }
    Ok(props)
}

fn relationship_row(rel: &Relationship) -> Value {
    json!({
        "sourceName": rel.source.name,
        "sourceType": rel.source.kind.label(),
        "sourceNamespace": rel.source.namespace_key(),
        "targetName": rel.target.name,
        "targetType": rel.target.kind.label(),
        "targetNamespace": rel.target.namespace_key(),
    })
}

// ---------------------------------------------------------------------------
// ImportPlan: validated write batches for one full-replace import
// ---------------------------------------------------------------------------

/// A write statement and the number of rows it carries.
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    pub statement: Statement,
    pub rows: usize,
}

/// Node batches (per kind) and relationship batches (per relation kind),
/// built before anything is written.
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub node_batches: Vec<PlannedBatch>,
    pub relationship_batches: Vec<PlannedBatch>,
    pub node_count: usize,
    pub relationship_count: usize,
    /// Relationships referencing an asset absent from the inventory.
    pub dangling: usize,
}

impl ImportPlan {
    /// Validate identities and split the snapshot into batches of at most
    /// `batch_size` rows.
    pub fn build(
        inventory: &AssetInventory,
        relationships: &[Relationship],
        batch_size: usize,
    ) -> KubeGraphResult<Self> {
        let batch_size = batch_size.max(1);
        let mut plan = ImportPlan::default();
        let mut identities: HashSet<AssetRef> = HashSet::with_capacity(inventory.len());

        for kind in AssetKind::ALL {
            let assets = inventory.of_kind(kind);
            let mut rows = Vec::with_capacity(assets.len());
            for asset in assets {
                let identity = asset.reference();
                if !identities.insert(identity.clone()) {
                    return Err(KubeGraphError::DuplicateIdentity(identity.to_string()));
                }
                rows.push(Value::Object(node_properties(asset)?));
            }
            plan.node_count += rows.len();
            for chunk in rows.chunks(batch_size) {
                plan.node_batches.push(PlannedBatch {
                    statement: Statement::new(create_nodes(kind))
                        .with_param("rows", Value::Array(chunk.to_vec())),
                    rows: chunk.len(),
                });
            }
        }

        for relation in RelationKind::ALL {
            let rows: Vec<Value> = relationships
                .iter()
                .filter(|rel| rel.relation == relation)
                .map(relationship_row)
                .collect();
            plan.relationship_count += rows.len();
            for chunk in rows.chunks(batch_size) {
                plan.relationship_batches.push(PlannedBatch {
                    statement: Statement::new(merge_relationships(relation))
                        .with_param("rows", Value::Array(chunk.to_vec())),
                    rows: chunk.len(),
                });
            }
        }

        plan.dangling = relationships
            .iter()
            .filter(|rel| !identities.contains(&rel.source) || !identities.contains(&rel.target))
            .count();
        if plan.dangling > 0 {
            warn!(
                dangling = plan.dangling,
                "Relationships reference assets missing from the snapshot"
            );
        }

        Ok(plan)
    }
}
