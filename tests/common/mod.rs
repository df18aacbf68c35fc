//! In-memory graph backing both channels in integration tests.
//!
//! `MemoryGraph` understands exactly the statements the stores emit. The
//! REST channel reaches it through a wiremock responder that renders the
//! Neo4j transactional JSON format; the session channel reaches it through
//! `MemorySessionPool`, which gives each explicit transaction a private copy
//! of the graph that only replaces the shared one on commit.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use kubegraph::config::StoreConfig;
use kubegraph::error::{KubeGraphError, KubeGraphResult};
use kubegraph::model::asset::AssetKind;
use kubegraph::model::graph::{
    GraphEdge, GraphNode, GraphPath, GraphValue, PathSegment, PropertyMap, Record,
};
use kubegraph::model::relationship::RelationKind;
use kubegraph::store::cypher::{self, Statement};
use kubegraph::store::{GraphStore, RestGraphStore, Session, SessionGraphStore, SessionPool};

pub const SYNTAX_ERROR: &str = "Neo.ClientError.Statement.SyntaxError";

// ---------------------------------------------------------------------------
// Graph state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemNode {
    pub id: u64,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl MemNode {
    fn prop(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// `(type, namespace, name)`.
    pub fn identity(&self) -> (String, String, String) {
        (
            self.prop("type").unwrap_or_default().to_string(),
            self.prop("namespace").unwrap_or_default().to_string(),
            self.prop("name").unwrap_or_default().to_string(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct MemEdge {
    pub id: u64,
    pub rel_type: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GraphState {
    next_id: u64,
    nodes: BTreeMap<u64, MemNode>,
    edges: BTreeMap<u64, MemEdge>,
}

impl GraphState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_node(&mut self, label: &str, properties: PropertyMap) -> u64 {
        let id = self.allocate();
        self.nodes.insert(
            id,
            MemNode {
                id,
                labels: vec![label.to_string()],
                properties,
            },
        );
        id
    }

    fn merge_edge(&mut self, start: u64, rel_type: &str, end: u64) -> u64 {
        if let Some(existing) = self
            .edges
            .values()
            .find(|e| e.start == start && e.end == end && e.rel_type == rel_type)
        {
            return existing.id;
        }
        let id = self.allocate();
        self.edges.insert(
            id,
            MemEdge {
                id,
                rel_type: rel_type.to_string(),
                start,
                end,
            },
        );
        id
    }

    fn find(&self, name: &str, kind: &str, namespace: &str) -> Vec<u64> {
        self.nodes
            .values()
            .filter(|n| {
                n.prop("name") == Some(name)
                    && n.prop("type") == Some(kind)
                    && n.prop("namespace").unwrap_or("") == namespace
            })
            .map(|n| n.id)
            .collect()
    }

    /// Breadth-first search ignoring direction, at most `max_hops` hops.
    fn shortest(&self, from: u64, to: u64, max_hops: usize) -> Option<(Vec<u64>, Vec<u64>)> {
        let mut previous: HashMap<u64, (u64, u64)> = HashMap::new();
        let mut depth: HashMap<u64, usize> = HashMap::from([(from, 0)]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                break;
            }
            let d = depth[&current];
            if d == max_hops {
                continue;
            }
            for edge in self.edges.values() {
                let next = if edge.start == current {
                    edge.end
                } else if edge.end == current {
                    edge.start
                } else {
                    continue;
                };
                if depth.contains_key(&next) {
                    continue;
                }
                depth.insert(next, d + 1);
                previous.insert(next, (current, edge.id));
                queue.push_back(next);
            }
        }
        if !depth.contains_key(&to) {
            return None;
        }
        let mut nodes = vec![to];
        let mut edges = Vec::new();
        let mut cursor = to;
        while let Some(&(prev, edge)) = previous.get(&cursor) {
            nodes.push(prev);
            edges.push(edge);
            cursor = prev;
        }
        nodes.reverse();
        edges.reverse();
        Some((nodes, edges))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum MemValue {
    Node(MemNode),
    Edge(MemEdge),
    Path { nodes: Vec<MemNode>, edges: Vec<MemEdge> },
    Scalar(Value),
}

#[derive(Debug, Clone, Default)]
pub struct MemResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<MemValue>>,
}

impl MemResult {
    fn empty() -> Self {
        Self::default()
    }

    fn scalar(column: &str, value: Value) -> Self {
        Self {
            columns: vec![column.to_string()],
            rows: vec![vec![MemValue::Scalar(value)]],
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreFailure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
struct FailRule {
    needle: String,
    code: String,
    message: String,
}

fn element_id(id: u64) -> String {
    format!("4:memory:{id}")
}

fn rows_param(statement: &Statement) -> Vec<Value> {
    statement
        .parameters
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn str_param<'a>(statement: &'a Statement, key: &str) -> &'a str {
    statement
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn row_str<'a>(row: &'a Value, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// MemoryGraph
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<GraphState>>,
    failures: Arc<Mutex<Vec<FailRule>>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement whose text contains `needle`.
    pub fn fail_when(&self, needle: &str, code: &str, message: &str) {
        self.failures.lock().unwrap().push(FailRule {
            needle: needle.to_string(),
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Execute against the shared graph.
    pub fn execute(&self, statement: &Statement) -> Result<MemResult, StoreFailure> {
        let mut state = self.state.lock().unwrap();
        self.execute_on(&mut state, statement)
    }

    /// Execute against a caller-held copy of the graph.
    pub fn execute_on(
        &self,
        state: &mut GraphState,
        statement: &Statement,
    ) -> Result<MemResult, StoreFailure> {
        if let Some(rule) = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|rule| statement.text.contains(&rule.needle))
        {
            return Err(StoreFailure {
                code: rule.code.clone(),
                message: rule.message.clone(),
            });
        }
        interpret(state, statement)
    }

    pub fn copy_state(&self) -> GraphState {
        self.state.lock().unwrap().clone()
    }

    pub fn replace_state(&self, state: GraphState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().unwrap().edges.len()
    }

    pub fn identities(&self) -> BTreeSet<(String, String, String)> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .values()
            .map(MemNode::identity)
            .collect()
    }

    /// Every edge as `(source identity, type, target identity)`.
    pub fn edge_triples(
        &self,
    ) -> BTreeSet<((String, String, String), String, (String, String, String))> {
        let state = self.state.lock().unwrap();
        state
            .edges
            .values()
            .map(|e| {
                (
                    state.nodes[&e.start].identity(),
                    e.rel_type.clone(),
                    state.nodes[&e.end].identity(),
                )
            })
            .collect()
    }

    pub fn node(&self, kind: &str, name: &str) -> Option<MemNode> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .values()
            .find(|n| n.prop("type") == Some(kind) && n.prop("name") == Some(name))
            .cloned()
    }

    /// Seed an edge the importer never creates. Returns false when either
    /// endpoint is missing.
    pub fn connect(&self, from: (&str, &str), rel_type: &str, to: (&str, &str)) -> bool {
        let (Some(start), Some(end)) = (self.node(from.0, from.1), self.node(to.0, to.1)) else {
            return false;
        };
        self.state
            .lock()
            .unwrap()
            .merge_edge(start.id, rel_type, end.id);
        true
    }
}

fn interpret(state: &mut GraphState, statement: &Statement) -> Result<MemResult, StoreFailure> {
    let text = statement.text.as_str();

    if text == cypher::PING {
        return Ok(MemResult::scalar("ok", json!(1)));
    }
    if text == cypher::CLEAR_GRAPH {
        state.nodes.clear();
        state.edges.clear();
        return Ok(MemResult::empty());
    }
    if text == cypher::ALL_NODES {
        return Ok(MemResult {
            columns: vec!["n".into()],
            rows: state
                .nodes
                .values()
                .map(|n| vec![MemValue::Node(n.clone())])
                .collect(),
        });
    }
    if text == cypher::ALL_RELATIONSHIPS {
        return Ok(MemResult {
            columns: vec!["r".into()],
            rows: state
                .edges
                .values()
                .map(|e| vec![MemValue::Edge(e.clone())])
                .collect(),
        });
    }
    if text == cypher::COUNT_RELATIONSHIPS {
        return Ok(MemResult::scalar("count", json!(state.edges.len())));
    }
    if text == cypher::SHORTEST_PATH {
        return Ok(shortest_paths(
            state,
            str_param(statement, "startName"),
            str_param(statement, "endName"),
        ));
    }
    if text == cypher::VULNERABILITY_PATTERN {
        return Ok(vulnerability_rows(state));
    }

    for kind in AssetKind::ALL {
        let label = kind.label();
        if text == cypher::create_index(kind) {
            return Ok(MemResult::empty());
        }
        if text == cypher::count_nodes(kind) {
            let count = state.nodes.values().filter(|n| n.has_label(label)).count();
            return Ok(MemResult::scalar("count", json!(count)));
        }
        if text == cypher::create_nodes(kind) {
            for row in rows_param(statement) {
                let properties = row.as_object().cloned().unwrap_or_default();
                state.add_node(label, properties);
            }
            return Ok(MemResult::empty());
        }
    }

    for relation in RelationKind::ALL {
        if text == cypher::merge_relationships(relation) {
            let mut merged = 0;
            for row in rows_param(statement) {
                let sources = state.find(
                    row_str(&row, "sourceName"),
                    row_str(&row, "sourceType"),
                    row_str(&row, "sourceNamespace"),
                );
                let targets = state.find(
                    row_str(&row, "targetName"),
                    row_str(&row, "targetType"),
                    row_str(&row, "targetNamespace"),
                );
                for &a in &sources {
                    for &b in &targets {
                        state.merge_edge(a, relation.as_str(), b);
                        merged += 1;
                    }
                }
            }
            return Ok(MemResult::scalar("merged", json!(merged)));
        }
    }

    Err(StoreFailure {
        code: SYNTAX_ERROR.into(),
        message: format!("Invalid input: {text}"),
    })
}

fn shortest_paths(state: &GraphState, start_name: &str, end_name: &str) -> MemResult {
    let named = |name: &str| -> Vec<u64> {
        state
            .nodes
            .values()
            .filter(|n| n.prop("name") == Some(name))
            .map(|n| n.id)
            .collect()
    };
    let mut rows = Vec::new();
    for from in named(start_name) {
        for to in named(end_name) {
            if from == to {
                continue;
            }
            if let Some((nodes, edges)) = state.shortest(from, to, 5) {
                rows.push(vec![MemValue::Path {
                    nodes: nodes.iter().map(|id| state.nodes[id].clone()).collect(),
                    edges: edges.iter().map(|id| state.edges[id].clone()).collect(),
                }]);
            }
        }
    }
    MemResult {
        columns: vec!["path".into()],
        rows,
    }
}

fn vulnerability_rows(state: &GraphState) -> MemResult {
    let pairs = |rel_type: &str, start_label: &str, end_label: &str| -> Vec<(MemNode, MemNode)> {
        state
            .edges
            .values()
            .filter(|e| e.rel_type == rel_type)
            .map(|e| (state.nodes[&e.start].clone(), state.nodes[&e.end].clone()))
            .filter(|(s, t)| s.has_label(start_label) && t.has_label(end_label))
            .collect()
    };
    let exposed = pairs("CONNECTS_TO", "Pod", "Service");
    let identities: Vec<_> = pairs("RUNS_AS", "Pod", "ServiceAccount")
        .into_iter()
        .filter(|(_, account)| account.prop("name") == Some("default"))
        .collect();

    let mut rows = Vec::new();
    for (a, b) in &exposed {
        for (c, d) in &identities {
            rows.push(vec![
                MemValue::Node(a.clone()),
                MemValue::Node(b.clone()),
                MemValue::Node(c.clone()),
                MemValue::Node(d.clone()),
            ]);
        }
    }
    MemResult {
        columns: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        rows,
    }
}

// ---------------------------------------------------------------------------
// Session channel rendering
// ---------------------------------------------------------------------------

fn graph_node(node: &MemNode) -> GraphNode {
    GraphNode {
        id: element_id(node.id),
        labels: node.labels.clone(),
        properties: node.properties.clone(),
    }
}

fn graph_edge(edge: &MemEdge) -> GraphEdge {
    GraphEdge {
        id: element_id(edge.id),
        rel_type: edge.rel_type.clone(),
        start: element_id(edge.start),
        end: element_id(edge.end),
        properties: PropertyMap::new(),
    }
}

fn graph_value(value: &MemValue) -> GraphValue {
    match value {
        MemValue::Node(node) => GraphValue::Node(graph_node(node)),
        MemValue::Edge(edge) => GraphValue::Edge(graph_edge(edge)),
        MemValue::Path { nodes, edges } => GraphValue::Path(GraphPath {
            segments: edges
                .iter()
                .enumerate()
                .map(|(i, edge)| PathSegment {
                    start: graph_node(&nodes[i]),
                    relationship: graph_edge(edge),
                    end: graph_node(&nodes[i + 1]),
                })
                .collect(),
        }),
        MemValue::Scalar(value) => GraphValue::Scalar(value.clone()),
    }
}

fn to_records(result: MemResult) -> Vec<Record> {
    result
        .rows
        .iter()
        .map(|row| Record::new(result.columns.clone(), row.iter().map(graph_value).collect()))
        .collect()
}

fn to_error(failure: StoreFailure) -> KubeGraphError {
    KubeGraphError::query(Some(failure.code), failure.message)
}

// ---------------------------------------------------------------------------
// MemorySessionPool
// ---------------------------------------------------------------------------

/// Session pool over a [`MemoryGraph`].
#[derive(Clone)]
pub struct MemorySessionPool {
    graph: MemoryGraph,
    acquire_delay: Duration,
    fail_after: Option<usize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MemorySessionPool {
    pub fn new(graph: MemoryGraph) -> Self {
        Self {
            graph,
            acquire_delay: Duration::ZERO,
            fail_after: None,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait this long before handing out a session.
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Let `n` statements succeed inside a transaction, then fail the rest.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionPool for MemorySessionPool {
    async fn acquire(&self) -> KubeGraphResult<Box<dyn Session>> {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            graph: self.graph.clone(),
            txn: None,
            fail_after: self.fail_after,
            statements_in_txn: 0,
            closed: self.closed.clone(),
        }))
    }
}

struct MemorySession {
    graph: MemoryGraph,
    txn: Option<GraphState>,
    fail_after: Option<usize>,
    statements_in_txn: usize,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Session for MemorySession {
    async fn run(&mut self, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        if self.txn.is_some() {
            return Err(KubeGraphError::Internal(
                "auto-commit statement while a transaction is open".into(),
            ));
        }
        self.graph.execute(statement).map(to_records).map_err(to_error)
    }

    async fn begin(&mut self) -> KubeGraphResult<()> {
        if self.txn.is_some() {
            return Err(KubeGraphError::Internal("transaction already open".into()));
        }
        self.txn = Some(self.graph.copy_state());
        Ok(())
    }

    async fn run_in_transaction(&mut self, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        if matches!(self.fail_after, Some(n) if self.statements_in_txn >= n) {
            return Err(KubeGraphError::query(
                Some("Neo.ClientError.Transaction.TransactionTerminated".into()),
                "terminated by test",
            ));
        }
        self.statements_in_txn += 1;
        let graph = self.graph.clone();
        let txn = self
            .txn
            .as_mut()
            .ok_or_else(|| KubeGraphError::Internal("no open transaction".into()))?;
        graph
            .execute_on(txn, statement)
            .map(to_records)
            .map_err(to_error)
    }

    async fn commit(&mut self) -> KubeGraphResult<()> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| KubeGraphError::Internal("no open transaction".into()))?;
        self.graph.replace_state(txn);
        Ok(())
    }

    async fn rollback(&mut self) -> KubeGraphResult<()> {
        self.txn = None;
        Ok(())
    }

    async fn close(&mut self) {
        self.txn = None;
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// REST channel: wiremock responder rendering Neo4j's transactional format
// ---------------------------------------------------------------------------

pub const COMMIT_PATH: &str = "/db/neo4j/tx/commit";

pub struct MemoryRestResponder {
    graph: MemoryGraph,
}

impl MemoryRestResponder {
    pub fn new(graph: MemoryGraph) -> Self {
        Self { graph }
    }
}

fn node_meta(node: &MemNode) -> Value {
    json!({ "id": node.id, "elementId": element_id(node.id), "type": "node", "deleted": false })
}

fn edge_meta(edge: &MemEdge) -> Value {
    json!({ "id": edge.id, "elementId": element_id(edge.id), "type": "relationship", "deleted": false })
}

fn wire_node(node: &MemNode) -> Value {
    json!({
        "id": node.id.to_string(),
        "elementId": element_id(node.id),
        "labels": node.labels,
        "properties": node.properties,
    })
}

fn wire_edge(edge: &MemEdge) -> Value {
    json!({
        "id": edge.id.to_string(),
        "elementId": element_id(edge.id),
        "type": edge.rel_type,
        "startNode": edge.start.to_string(),
        "endNode": edge.end.to_string(),
        "startNodeElementId": element_id(edge.start),
        "endNodeElementId": element_id(edge.end),
        "properties": {},
    })
}

fn wire_row(values: &[MemValue]) -> Value {
    let mut row = Vec::new();
    let mut meta = Vec::new();
    let mut nodes: BTreeMap<u64, Value> = BTreeMap::new();
    let mut relationships: BTreeMap<u64, Value> = BTreeMap::new();

    for value in values {
        match value {
            MemValue::Node(node) => {
                row.push(Value::Object(node.properties.clone()));
                meta.push(node_meta(node));
                nodes.insert(node.id, wire_node(node));
            }
            MemValue::Edge(edge) => {
                row.push(json!({}));
                meta.push(edge_meta(edge));
                relationships.insert(edge.id, wire_edge(edge));
            }
            MemValue::Path { nodes: path_nodes, edges } => {
                let mut path_row = Vec::new();
                let mut path_meta = Vec::new();
                for (i, node) in path_nodes.iter().enumerate() {
                    if i > 0 {
                        let edge = &edges[i - 1];
                        path_row.push(json!({}));
                        path_meta.push(edge_meta(edge));
                        relationships.insert(edge.id, wire_edge(edge));
                    }
                    path_row.push(Value::Object(node.properties.clone()));
                    path_meta.push(node_meta(node));
                    nodes.insert(node.id, wire_node(node));
                }
                row.push(Value::Array(path_row));
                meta.push(Value::Array(path_meta));
            }
            MemValue::Scalar(value) => {
                row.push(value.clone());
                meta.push(Value::Null);
            }
        }
    }

    json!({
        "row": row,
        "meta": meta,
        "graph": {
            "nodes": nodes.into_values().collect::<Vec<_>>(),
            "relationships": relationships.into_values().collect::<Vec<_>>(),
        }
    })
}

impl Respond for MemoryRestResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let Some(first) = body["statements"].get(0) else {
            return ResponseTemplate::new(200).set_body_json(json!({ "results": [], "errors": [] }));
        };
        let statement = Statement::with_parameters(
            first["statement"].as_str().unwrap_or_default(),
            first["parameters"].as_object().cloned().unwrap_or_default(),
        );

        match self.graph.execute(&statement) {
            Ok(result) => ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "columns": result.columns,
                    "data": result.rows.iter().map(|row| wire_row(row)).collect::<Vec<_>>(),
                }],
                "errors": [],
            })),
            Err(failure) => ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "errors": [{ "code": failure.code, "message": failure.message }],
            })),
        }
    }
}

// ---------------------------------------------------------------------------
// Harnesses
// ---------------------------------------------------------------------------

/// One store wired to its own in-memory graph. Keeps the mock server alive.
pub struct Harness {
    pub graph: MemoryGraph,
    pub store: Arc<dyn GraphStore>,
    pub pool: Option<MemorySessionPool>,
    pub server: Option<MockServer>,
}

pub fn store_config(http_uri: &str, batch_size: usize) -> StoreConfig {
    StoreConfig {
        http_uri: http_uri.to_string(),
        batch_size,
        request_timeout_secs: 5,
        acquire_timeout_secs: 5,
        ..StoreConfig::default()
    }
}

pub async fn mount_graph(server: &MockServer, graph: &MemoryGraph) {
    Mock::given(method("POST"))
        .and(path(COMMIT_PATH))
        .respond_with(MemoryRestResponder::new(graph.clone()))
        .mount(server)
        .await;
}

pub async fn rest_harness(batch_size: usize) -> Harness {
    let graph = MemoryGraph::new();
    let server = MockServer::start().await;
    mount_graph(&server, &graph).await;
    let store = RestGraphStore::new(&store_config(&server.uri(), batch_size))
        .expect("valid REST configuration");
    Harness {
        graph,
        store: Arc::new(store),
        pool: None,
        server: Some(server),
    }
}

pub fn session_harness_with(pool: MemorySessionPool, graph: MemoryGraph, batch_size: usize) -> Harness {
    let store = SessionGraphStore::with_limits(
        Arc::new(pool.clone()),
        Duration::from_secs(5),
        batch_size,
    );
    Harness {
        graph,
        store: Arc::new(store),
        pool: Some(pool),
        server: None,
    }
}

pub fn session_harness(batch_size: usize) -> Harness {
    let graph = MemoryGraph::new();
    session_harness_with(MemorySessionPool::new(graph.clone()), graph, batch_size)
}

/// One harness per channel, both with the same batch size.
pub async fn both_channels(batch_size: usize) -> Vec<Harness> {
    vec![rest_harness(batch_size).await, session_harness(batch_size)]
}
