//! Stateless channel over the Neo4j HTTP transactional endpoint.
//!
//! Each statement is its own `POST {uri}/db/{database}/tx/commit`, so there
//! is no transaction spanning an import. A failure partway through an import
//! leaves the graph partially rebuilt and is reported as
//! [`KubeGraphError::PartialImport`] with the counts written so far.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use crate::config::StoreConfig;
use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::asset::AssetInventory;
use crate::model::graph::{
    GraphEdge, GraphNode, GraphPath, GraphValue, PathSegment, PropertyMap, Record,
};
use crate::model::relationship::Relationship;
use crate::store::cypher::{ImportPlan, Statement};
use crate::store::{merged_count, Channel, GraphStore, ImportReport};

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<ResultRow>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultRow {
    #[serde(default)]
    row: Vec<Value>,
    #[serde(default)]
    meta: Vec<Value>,
    #[serde(default)]
    graph: ResultGraph,
}

#[derive(Debug, Default, Deserialize)]
struct ResultGraph {
    #[serde(default)]
    nodes: Vec<WireNode>,
    #[serde(default)]
    relationships: Vec<WireRelationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNode {
    #[serde(default)]
    id: Value,
    element_id: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    properties: PropertyMap,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelationship {
    #[serde(default)]
    id: Value,
    element_id: Option<String>,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    start_node: Value,
    #[serde(default)]
    end_node: Value,
    start_node_element_id: Option<String>,
    end_node_element_id: Option<String>,
    #[serde(default)]
    properties: PropertyMap,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

/// Stable key for an element: `elementId` when the server sends one,
/// otherwise the legacy numeric id.
fn element_key(element_id: Option<&str>, id: &Value) -> Option<String> {
    if let Some(element_id) = element_id {
        return Some(element_id.to_string());
    }
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn meta_key(meta: &Value) -> Option<String> {
    element_key(
        meta.get("elementId").and_then(Value::as_str),
        meta.get("id").unwrap_or(&Value::Null),
    )
}

fn meta_type(meta: &Value) -> Option<&str> {
    meta.get("type").and_then(Value::as_str)
}

/// Nodes and relationships of one result row, keyed for meta lookup.
struct GraphIndex {
    nodes: HashMap<String, GraphNode>,
    edges: HashMap<String, GraphEdge>,
}

impl GraphIndex {
    fn new(graph: ResultGraph) -> Self {
        let mut nodes = HashMap::with_capacity(graph.nodes.len());
        for node in graph.nodes {
            if let Some(key) = element_key(node.element_id.as_deref(), &node.id) {
                nodes.insert(
                    key.clone(),
                    GraphNode {
                        id: key,
                        labels: node.labels,
                        properties: node.properties,
                    },
                );
            }
        }
        let mut edges = HashMap::with_capacity(graph.relationships.len());
        for rel in graph.relationships {
            let key = element_key(rel.element_id.as_deref(), &rel.id);
            let start = element_key(rel.start_node_element_id.as_deref(), &rel.start_node);
            let end = element_key(rel.end_node_element_id.as_deref(), &rel.end_node);
            if let (Some(key), Some(start), Some(end)) = (key, start, end) {
                edges.insert(
                    key.clone(),
                    GraphEdge {
                        id: key,
                        rel_type: rel.rel_type,
                        start,
                        end,
                        properties: rel.properties,
                    },
                );
            }
        }
        Self { nodes, edges }
    }

    fn node(&self, meta: &Value) -> Option<GraphNode> {
        self.nodes.get(&meta_key(meta)?).cloned()
    }

    fn edge(&self, meta: &Value) -> Option<GraphEdge> {
        self.edges.get(&meta_key(meta)?).cloned()
    }

    /// A path's meta alternates node, relationship, node, ...
    fn path(&self, metas: &[Value]) -> Option<GraphPath> {
        if metas.len() < 3 || metas.len() % 2 == 0 {
            return None;
        }
        let mut segments = Vec::with_capacity(metas.len() / 2);
        let mut start = self.node(&metas[0])?;
        for pair in metas[1..].chunks(2) {
            if meta_type(&pair[0]) != Some("relationship") || meta_type(&pair[1]) != Some("node") {
                return None;
            }
            let relationship = self.edge(&pair[0])?;
            let end = self.node(&pair[1])?;
            segments.push(PathSegment {
                start: start.clone(),
                relationship,
                end: end.clone(),
            });
            start = end;
        }
        Some(GraphPath { segments })
    }

    /// Decide a value's structural kind from its meta entry.
    fn decode(&self, value: Value, meta: &Value) -> GraphValue {
        let decoded = match meta {
            Value::Object(_) => match meta_type(meta) {
                Some("node") => self.node(meta).map(GraphValue::Node),
                Some("relationship") => self.edge(meta).map(GraphValue::Edge),
                _ => None,
            },
            Value::Array(metas) if meta_type(metas.first().unwrap_or(&Value::Null)) == Some("node") => {
                self.path(metas).map(GraphValue::Path)
            }
            _ => None,
        };
        decoded.unwrap_or(GraphValue::Scalar(value))
    }
}

fn decode_result(result: StatementResult) -> Vec<Record> {
    let columns = result.columns;
    result
        .data
        .into_iter()
        .map(|row| {
            let index = GraphIndex::new(row.graph);
            let values = row
                .row
                .into_iter()
                .enumerate()
                .map(|(i, value)| index.decode(value, row.meta.get(i).unwrap_or(&Value::Null)))
                .collect();
            Record::new(columns.clone(), values)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// RestGraphStore
// ---------------------------------------------------------------------------

/// Graph store reached through one HTTP request per statement.
#[derive(Debug, Clone)]
pub struct RestGraphStore {
    http: reqwest::Client,
    commit_url: Url,
    user: String,
    password: String,
    request_timeout: Duration,
    batch_size: usize,
}

impl RestGraphStore {
    pub fn new(config: &StoreConfig) -> KubeGraphResult<Self> {
        let mut base = Url::parse(&config.http_uri).map_err(|err| {
            KubeGraphError::ConfigError(format!("invalid store.http_uri '{}': {err}", config.http_uri))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let commit_url = base
            .join(&format!("db/{}/tx/commit", config.database))
            .map_err(|err| KubeGraphError::ConfigError(format!("invalid database name: {err}")))?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.acquire_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| KubeGraphError::Internal(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            commit_url,
            user: config.user.clone(),
            password: config.password.clone(),
            request_timeout: config.request_timeout(),
            batch_size: config.batch_size,
        })
    }

    /// Endpoint every statement is posted to.
    pub fn commit_url(&self) -> &Url {
        &self.commit_url
    }

    fn transport_error(&self, err: reqwest::Error) -> KubeGraphError {
        if err.is_timeout() {
            KubeGraphError::Timeout {
                channel: Channel::Rest,
                operation: "http request",
                elapsed_ms: self.request_timeout.as_millis() as u64,
            }
        } else if err.is_decode() {
            KubeGraphError::Internal(format!("malformed response from graph store: {err}"))
        } else {
            KubeGraphError::unavailable(Channel::Rest, err.to_string())
        }
    }

    fn server_error(err: ServerError) -> KubeGraphError {
        if err.code.starts_with("Neo.ClientError.Security.")
            || err.code.starts_with("Neo.TransientError.")
        {
            KubeGraphError::unavailable(Channel::Rest, format!("{}: {}", err.code, err.message))
        } else {
            KubeGraphError::query(Some(err.code), err.message)
        }
    }

    async fn post(&self, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        let body = json!({
            "statements": [{
                "statement": statement.text,
                "parameters": statement.parameters,
                "resultDataContents": ["row", "graph"],
            }]
        });

        let resp = self
            .http
            .post(self.commit_url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(KubeGraphError::unavailable(
                Channel::Rest,
                format!("authentication failed ({status})"),
            ));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                KubeGraphError::unavailable(Channel::Rest, format!("{status}: {message}"))
            } else {
                KubeGraphError::query(None, format!("{status}: {message}"))
            });
        }

        let payload: CommitResponse = resp
            .json()
            .await
            .map_err(|err| self.transport_error(err))?;
        if let Some(err) = payload.errors.into_iter().next() {
            return Err(Self::server_error(err));
        }
        Ok(payload
            .results
            .into_iter()
            .next()
            .map(decode_result)
            .unwrap_or_default())
    }

    fn partial(
        nodes_written: usize,
        relationships_written: usize,
        cause: KubeGraphError,
    ) -> KubeGraphError {
        error!(
            channel = %Channel::Rest,
            nodes_written,
            relationships_written,
            error = %cause,
            "Import stopped partway; graph is partially rebuilt"
        );
        KubeGraphError::PartialImport {
            channel: Channel::Rest,
            nodes_written,
            relationships_written,
            message: cause.to_string(),
        }
    }
}

#[async_trait]
impl GraphStore for RestGraphStore {
    fn channel(&self) -> Channel {
        Channel::Rest
    }

    async fn run(&self, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        debug!(channel = %Channel::Rest, statement = %statement.text, "Running statement");
        self.post(statement).await
    }

    async fn import_assets(
        &self,
        inventory: &AssetInventory,
        relationships: &[Relationship],
    ) -> KubeGraphResult<ImportReport> {
        let plan = ImportPlan::build(inventory, relationships, self.batch_size)?;
        info!(
            channel = %Channel::Rest,
            nodes = plan.node_count,
            relationships = plan.relationship_count,
            "Starting import"
        );

        self.clear_graph().await?;

        let mut nodes_written = 0;
        for batch in &plan.node_batches {
            if let Err(err) = self.post(&batch.statement).await {
                return Err(Self::partial(nodes_written, 0, err));
            }
            nodes_written += batch.rows;
        }

        let mut merged = 0;
        for batch in &plan.relationship_batches {
            match self.post(&batch.statement).await {
                Ok(records) => merged += merged_count(&records),
                Err(err) => return Err(Self::partial(nodes_written, merged, err)),
            }
        }

        Ok(ImportReport::completed(Channel::Rest, &plan, merged))
    }
}
