//! [`SessionPool`] over a Bolt connection pool.
//!
//! The pool connects on first use so an unreachable server only fails the
//! session channel, not process start-up. Checking a session out opens a
//! transaction, which is what makes the driver hand over a connection.

use async_trait::async_trait;
use neo4rs::{
    BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Node, Path, Query,
    Relation, Row, Txn, UnboundedRelation,
};
use serde::de::IgnoredAny;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::graph::{GraphEdge, GraphNode, GraphPath, GraphValue, PathSegment, PropertyMap, Record};
use crate::store::cypher::Statement;
use crate::store::session::{Session, SessionPool};
use crate::store::Channel;

fn bolt_error(err: neo4rs::Error) -> KubeGraphError {
    match &err {
        neo4rs::Error::IOError { .. }
        | neo4rs::Error::ConnectionError
        | neo4rs::Error::AuthenticationError(_) => {
            KubeGraphError::unavailable(Channel::Session, err.to_string())
        }
        _ => KubeGraphError::query(None, err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parameter and result conversion
// ---------------------------------------------------------------------------

fn bolt_value(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => BoltType::List(BoltList {
            value: items.iter().map(bolt_value).collect(),
        }),
        Value::Object(map) => BoltType::Map(BoltMap {
            value: map
                .iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), bolt_value(v)))
                .collect(),
        }),
    }
}

fn to_query(statement: &Statement) -> Query {
    statement
        .parameters
        .iter()
        .fold(neo4rs::query(&statement.text), |q, (key, value)| {
            q.param(key, bolt_value(value))
        })
}

fn node_value(node: &Node) -> GraphNode {
    let mut properties = PropertyMap::new();
    for key in node.keys() {
        if let Ok(value) = node.get::<Value>(key) {
            properties.insert(key.to_string(), value);
        }
    }
    GraphNode {
        id: node.id().to_string(),
        labels: node.labels().into_iter().map(str::to_string).collect(),
        properties,
    }
}

fn relation_value(rel: &Relation) -> GraphEdge {
    let mut properties = PropertyMap::new();
    for key in rel.keys() {
        if let Ok(value) = rel.get::<Value>(key) {
            properties.insert(key.to_string(), value);
        }
    }
    GraphEdge {
        id: rel.id().to_string(),
        rel_type: rel.typ().to_string(),
        start: rel.start_node_id().to_string(),
        end: rel.end_node_id().to_string(),
        properties,
    }
}

fn unbounded_value(rel: &UnboundedRelation, start: i64, end: i64) -> GraphEdge {
    let mut properties = PropertyMap::new();
    for key in rel.keys() {
        if let Ok(value) = rel.get::<Value>(key) {
            properties.insert(key.to_string(), value);
        }
    }
    GraphEdge {
        id: rel.id().to_string(),
        rel_type: rel.typ().to_string(),
        start: start.to_string(),
        end: end.to_string(),
        properties,
    }
}

/// Walk a Bolt path. `indices` alternates a 1-based relationship index
/// (negative when traversed against its direction) and a node index.
fn path_value(path: &Path) -> Option<GraphPath> {
    let nodes = path.nodes();
    let rels = path.rels();
    let indices = path.indices();

    let mut current = nodes.first()?;
    let mut segments = Vec::with_capacity(indices.len() / 2);
    for pair in indices.chunks(2) {
        let &[rel_index, node_index] = pair else {
            return None;
        };
        let rel = rels.get((rel_index.unsigned_abs() as usize).checked_sub(1)?)?;
        let next = nodes.get(usize::try_from(node_index).ok()?)?;
        let (start, end) = if rel_index > 0 {
            (current.id(), next.id())
        } else {
            (next.id(), current.id())
        };
        segments.push(PathSegment {
            start: node_value(current),
            relationship: unbounded_value(rel, start, end),
            end: node_value(next),
        });
        current = next;
    }
    Some(GraphPath { segments })
}

fn column_value(row: &Row, key: &str) -> GraphValue {
    if let Ok(node) = row.get::<Node>(key) {
        return GraphValue::Node(node_value(&node));
    }
    if let Ok(rel) = row.get::<Relation>(key) {
        return GraphValue::Edge(relation_value(&rel));
    }
    if let Ok(path) = row.get::<Path>(key) {
        if let Some(path) = path_value(&path) {
            return GraphValue::Path(path);
        }
    }
    GraphValue::Scalar(row.get::<Value>(key).unwrap_or(Value::Null))
}

fn decode_row(row: &Row) -> Record {
    let columns: Vec<String> = row
        .to_strict::<HashMap<String, IgnoredAny>>()
        .map(|fields| fields.into_keys().collect())
        .unwrap_or_default();
    let values = columns.iter().map(|key| column_value(row, key)).collect();
    Record::new(columns, values)
}

// ---------------------------------------------------------------------------
// BoltPool / BoltSession
// ---------------------------------------------------------------------------

/// Lazily connected Bolt pool.
pub struct BoltPool {
    config: StoreConfig,
    graph: OnceCell<Graph>,
}

impl BoltPool {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            config: config.clone(),
            graph: OnceCell::new(),
        }
    }

    async fn connect(&self) -> KubeGraphResult<Graph> {
        let config = ConfigBuilder::default()
            .uri(self.config.bolt_uri.as_str())
            .user(self.config.user.as_str())
            .password(self.config.password.as_str())
            .db(self.config.database.as_str())
            .max_connections(self.config.max_connections)
            .build()
            .map_err(|err| KubeGraphError::ConfigError(err.to_string()))?;
        let graph = Graph::connect(config).await.map_err(bolt_error)?;
        info!(
            uri = %self.config.bolt_uri,
            max_connections = self.config.max_connections,
            "Bolt pool connected"
        );
        Ok(graph)
    }

    async fn graph(&self) -> KubeGraphResult<Graph> {
        let graph = self.graph.get_or_try_init(|| self.connect()).await?;
        Ok(graph.clone())
    }
}

#[async_trait]
impl SessionPool for BoltPool {
    /// Checks a connection out of the driver pool by opening a transaction
    /// on it. The driver connects lazily, so this is where a slow or silent
    /// server blocks.
    async fn acquire(&self) -> KubeGraphResult<Box<dyn Session>> {
        let graph = self.graph().await?;
        let txn = graph.start_txn().await.map_err(bolt_error)?;
        Ok(Box::new(BoltSession {
            graph,
            held: Some(txn),
            txn: None,
        }))
    }
}

/// Every statement runs inside a driver transaction. `held` is the
/// transaction opened at checkout and is spent by the first `run` or
/// `begin`.
struct BoltSession {
    graph: Graph,
    held: Option<Txn>,
    txn: Option<Txn>,
}

impl BoltSession {
    fn no_transaction() -> KubeGraphError {
        KubeGraphError::Internal("no open transaction on session".into())
    }

    async fn next_txn(&mut self) -> KubeGraphResult<Txn> {
        match self.held.take() {
            Some(txn) => Ok(txn),
            None => self.graph.start_txn().await.map_err(bolt_error),
        }
    }
}

async fn collect_rows(txn: &mut Txn, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
    let mut stream = txn.execute(to_query(statement)).await.map_err(bolt_error)?;
    let mut records = Vec::new();
    while let Some(row) = stream.next(txn.handle()).await.map_err(bolt_error)? {
        records.push(decode_row(&row));
    }
    Ok(records)
}

#[async_trait]
impl Session for BoltSession {
    async fn run(&mut self, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        let mut txn = self.next_txn().await?;
        match collect_rows(&mut txn, statement).await {
            Ok(records) => {
                txn.commit().await.map_err(bolt_error)?;
                Ok(records)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback after failed statement failed");
                }
                Err(err)
            }
        }
    }

    async fn begin(&mut self) -> KubeGraphResult<()> {
        if self.txn.is_some() {
            return Err(KubeGraphError::Internal(
                "transaction already open on session".into(),
            ));
        }
        self.txn = Some(self.next_txn().await?);
        Ok(())
    }

    async fn run_in_transaction(&mut self, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        let txn = self.txn.as_mut().ok_or_else(Self::no_transaction)?;
        collect_rows(txn, statement).await
    }

    async fn commit(&mut self) -> KubeGraphResult<()> {
        let txn = self.txn.take().ok_or_else(Self::no_transaction)?;
        txn.commit().await.map_err(bolt_error)
    }

    async fn rollback(&mut self) -> KubeGraphResult<()> {
        match self.txn.take() {
            Some(txn) => txn.rollback().await.map_err(bolt_error),
            None => Ok(()),
        }
    }

    async fn close(&mut self) {
        for txn in [self.txn.take(), self.held.take()].into_iter().flatten() {
            if let Err(err) = txn.rollback().await {
                warn!(error = %err, "Rollback on session close failed");
            }
        }
    }
}
