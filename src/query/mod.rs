use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::collect::Snapshot;
use crate::config::StoreConfig;
use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::graph::{GraphPath, GraphSlice, GraphStats, PropertyMap, Record};
use crate::store::{
    BoltPool, Channel, GraphStore, ImportReport, RestGraphStore, SessionGraphStore,
};

// ---------------------------------------------------------------------------
// Requests: one operation against one channel
// ---------------------------------------------------------------------------

/// A read operation routed to one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum QueryRequest {
    /// Caller-supplied statement, split into nodes and relationships.
    Graph {
        statement: Option<String>,
        #[serde(default)]
        parameters: PropertyMap,
    },
    /// Caller-supplied statement, raw records.
    Execute {
        statement: Option<String>,
        #[serde(default)]
        parameters: PropertyMap,
    },
    #[serde(rename_all = "camelCase")]
    ShortestPath {
        start_node: Option<String>,
        end_node: Option<String>,
    },
    VulnerabilityPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Graph(GraphSlice),
    Records(Vec<Record>),
    Paths(Vec<GraphPath>),
}

/// Independent status of each channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelHealth {
    pub rest: ChannelStatus,
    pub session: ChannelStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelStatus {
    fn from_result(result: KubeGraphResult<()>) -> Self {
        match result {
            Ok(()) => Self {
                healthy: true,
                error: None,
            },
            Err(err) => Self {
                healthy: false,
                error: Some(err.to_string()),
            },
        }
    }
}

fn require_statement(statement: Option<&str>) -> KubeGraphResult<&str> {
    match statement.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(KubeGraphError::InvalidRequest(
            "Cypher query is required".into(),
        )),
    }
}

fn require_endpoints<'a>(
    start: Option<&'a str>,
    end: Option<&'a str>,
) -> KubeGraphResult<(&'a str, &'a str)> {
    match (start.map(str::trim), end.map(str::trim)) {
        (Some(s), Some(e)) if !s.is_empty() && !e.is_empty() => Ok((s, e)),
        _ => Err(KubeGraphError::InvalidRequest(
            "Both startNode and endNode are required".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// QueryService: dispatch by channel
// ---------------------------------------------------------------------------

/// Routes each request to the store for the requested channel. Validation of
/// required parameters happens here, before any store is called.
#[derive(Clone)]
pub struct QueryService {
    rest: Arc<dyn GraphStore>,
    session: Arc<dyn GraphStore>,
}

impl QueryService {
    pub fn new(rest: Arc<dyn GraphStore>, session: Arc<dyn GraphStore>) -> Self {
        Self { rest, session }
    }

    /// Build both channel stores from configuration. The Bolt pool connects
    /// lazily, so this does not touch the network.
    pub fn from_config(config: &StoreConfig) -> KubeGraphResult<Self> {
        let rest = RestGraphStore::new(config)?;
        let session = SessionGraphStore::new(Arc::new(BoltPool::new(config)), config);
        Ok(Self::new(Arc::new(rest), Arc::new(session)))
    }

    pub fn store(&self, channel: Channel) -> &Arc<dyn GraphStore> {
        match channel {
            Channel::Rest => &self.rest,
            Channel::Session => &self.session,
        }
    }

    pub async fn dispatch(&self, channel: Channel, request: QueryRequest) -> KubeGraphResult<QueryResponse> {
        match request {
            QueryRequest::Graph {
                statement,
                parameters,
            } => self
                .query(channel, statement.as_deref(), parameters)
                .await
                .map(QueryResponse::Graph),
            QueryRequest::Execute {
                statement,
                parameters,
            } => self
                .execute(channel, statement.as_deref(), parameters)
                .await
                .map(QueryResponse::Records),
            QueryRequest::ShortestPath {
                start_node,
                end_node,
            } => self
                .shortest_path(channel, start_node.as_deref(), end_node.as_deref())
                .await
                .map(QueryResponse::Paths),
            QueryRequest::VulnerabilityPattern => self
                .vulnerabilities(channel)
                .await
                .map(QueryResponse::Records),
        }
    }

    pub async fn query(
        &self,
        channel: Channel,
        statement: Option<&str>,
        parameters: PropertyMap,
    ) -> KubeGraphResult<GraphSlice> {
        let statement = require_statement(statement)?;
        self.store(channel).query_graph(statement, parameters).await
    }

    pub async fn execute(
        &self,
        channel: Channel,
        statement: Option<&str>,
        parameters: PropertyMap,
    ) -> KubeGraphResult<Vec<Record>> {
        let statement = require_statement(statement)?;
        self.store(channel).execute_query(statement, parameters).await
    }

    pub async fn shortest_path(
        &self,
        channel: Channel,
        start_node: Option<&str>,
        end_node: Option<&str>,
    ) -> KubeGraphResult<Vec<GraphPath>> {
        let (start, end) = require_endpoints(start_node, end_node)?;
        self.store(channel).find_shortest_path(start, end).await
    }

    pub async fn vulnerabilities(&self, channel: Channel) -> KubeGraphResult<Vec<Record>> {
        self.store(channel).find_fixed_vulnerability_pattern().await
    }

    /// Provision indexes, then replace the graph with `snapshot`.
    pub async fn import(&self, channel: Channel, snapshot: &Snapshot) -> KubeGraphResult<ImportReport> {
        let store = self.store(channel);
        store.provision_indexes().await?;
        store
            .import_assets(&snapshot.assets, &snapshot.relationships)
            .await
    }

    pub async fn clear(&self, channel: Channel) -> KubeGraphResult<()> {
        self.store(channel).clear_graph().await
    }

    pub async fn stats(&self, channel: Channel) -> KubeGraphResult<GraphStats> {
        self.store(channel).stats().await
    }

    /// Probe both channels concurrently; one failing never hides the other.
    pub async fn health(&self) -> ChannelHealth {
        let (rest, session) = tokio::join!(self.rest.health_check(), self.session.health_check());
        let health = ChannelHealth {
            rest: ChannelStatus::from_result(rest),
            session: ChannelStatus::from_result(session),
        };
        if health.rest.healthy && health.session.healthy {
            info!("Both graph channels healthy");
        } else {
            warn!(rest = health.rest.healthy, session = health.session.healthy, "Graph channel unhealthy");
        }
        health
    }
}
