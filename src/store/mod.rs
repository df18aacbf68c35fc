pub mod bolt;
pub mod cypher;
pub mod rest;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::asset::{AssetInventory, AssetKind};
use crate::model::graph::{GraphPath, GraphSlice, GraphStats, GraphValue, PropertyMap, Record};
use crate::model::relationship::Relationship;
use cypher::{ImportPlan, Statement};

pub use bolt::BoltPool;
pub use rest::RestGraphStore;
pub use session::{Session, SessionGraphStore, SessionPool};

// ---------------------------------------------------------------------------
// Channel: transport used to reach the graph store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Stateless request/response over the HTTP transactional endpoint.
    Rest,
    /// Pooled sessions with explicit transactions.
    Session,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Rest, Channel::Session];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Rest => "rest",
            Channel::Session => "session",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = KubeGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "http" => Ok(Channel::Rest),
            "session" | "bolt" => Ok(Channel::Session),
            other => Err(KubeGraphError::InvalidRequest(format!(
                "unknown channel '{other}'; expected 'rest' or 'session'"
            ))),
        }
    }
}

/// Write stage of an import, used to report where a rollback happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStage {
    Nodes,
    Relationships,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::Nodes => f.write_str("nodes"),
            ImportStage::Relationships => f.write_str("relationships"),
        }
    }
}

// ---------------------------------------------------------------------------
// ImportReport
// ---------------------------------------------------------------------------

/// Outcome of a completed full-replace import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub channel: Channel,
    pub success: bool,
    pub message: String,
    pub nodes_created: usize,
    pub relationships_requested: usize,
    pub relationships_created: usize,
    /// Relationships whose source or target node did not exist.
    pub relationships_unmatched: usize,
}

impl ImportReport {
    pub(crate) fn completed(channel: Channel, plan: &ImportPlan, merged: usize) -> Self {
        let unmatched = plan.relationship_count.saturating_sub(merged);
        if unmatched > 0 {
            warn!(
                %channel,
                unmatched,
                requested = plan.relationship_count,
                "Relationships skipped because an endpoint node is missing"
            );
        }
        let message = if unmatched == 0 {
            format!(
                "Imported {} nodes and {} relationships",
                plan.node_count, merged
            )
        } else {
            format!(
                "Imported {} nodes and {} relationships ({} unmatched)",
                plan.node_count, merged, unmatched
            )
        };
        info!(%channel, nodes = plan.node_count, relationships = merged, "Import complete");
        Self {
            channel,
            success: true,
            message,
            nodes_created: plan.node_count,
            relationships_requested: plan.relationship_count,
            relationships_created: merged,
            relationships_unmatched: unmatched,
        }
    }
}

/// Sum of the `merged` column over relationship batch results.
pub(crate) fn merged_count(records: &[Record]) -> usize {
    records
        .iter()
        .filter_map(|record| record.get_u64("merged"))
        .sum::<u64>() as usize
}

/// Run `fut` with an upper bound, reporting expiry as a retryable timeout.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    channel: Channel,
    operation: &'static str,
    fut: F,
) -> KubeGraphResult<T>
where
    F: std::future::Future<Output = KubeGraphResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(KubeGraphError::Timeout {
            channel,
            operation,
            elapsed_ms: limit.as_millis() as u64,
        }),
    }
}

// ---------------------------------------------------------------------------
// GraphStore trait: one contract, one implementation per channel
// ---------------------------------------------------------------------------

/// Graph store reachable over one channel.
///
/// Implementations supply the transport (`run`) and the import mechanics.
/// Every read operation is defined once here on top of `run`, so both
/// channels share query semantics.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Channel this store talks over.
    fn channel(&self) -> Channel;

    /// Execute one statement in its own auto-committed unit of work.
    async fn run(&self, statement: &Statement) -> KubeGraphResult<Vec<Record>>;

    /// Full-replace import: clear, create every node, then merge every
    /// relationship between existing nodes.
    async fn import_assets(
        &self,
        inventory: &AssetInventory,
        relationships: &[Relationship],
    ) -> KubeGraphResult<ImportReport>;

    /// Ensure a name index exists for every kind. Returns how many index
    /// statements succeeded; individual failures are only logged.
    async fn provision_indexes(&self) -> KubeGraphResult<usize> {
        let channel = self.channel();
        let mut provisioned = 0;
        for kind in AssetKind::ALL {
            match self.run(&Statement::new(cypher::create_index(kind))).await {
                Ok(_) => provisioned += 1,
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => {
                    warn!(%channel, %kind, error = %err, "Index provisioning failed");
                }
            }
        }
        info!(%channel, provisioned, "Indexes provisioned");
        Ok(provisioned)
    }

    /// Delete every node and relationship.
    async fn clear_graph(&self) -> KubeGraphResult<()> {
        self.run(&Statement::new(cypher::CLEAR_GRAPH)).await?;
        info!(channel = %self.channel(), "Graph cleared");
        Ok(())
    }

    /// Run a caller-supplied statement and return the raw records.
    async fn execute_query(
        &self,
        statement: &str,
        parameters: PropertyMap,
    ) -> KubeGraphResult<Vec<Record>> {
        self.run(&Statement::with_parameters(statement, parameters))
            .await
    }

    /// Run a caller-supplied statement and separate returned nodes from
    /// returned relationships.
    async fn query_graph(
        &self,
        statement: &str,
        parameters: PropertyMap,
    ) -> KubeGraphResult<GraphSlice> {
        let records = self.execute_query(statement, parameters).await?;
        Ok(GraphSlice::from_records(&records))
    }

    /// Shortest undirected paths of at most five hops between the nodes
    /// named `start_name` and `end_name`. Empty when none exists.
    async fn find_shortest_path(
        &self,
        start_name: &str,
        end_name: &str,
    ) -> KubeGraphResult<Vec<GraphPath>> {
        let statement = Statement::new(cypher::SHORTEST_PATH)
            .with_param("startName", start_name)
            .with_param("endName", end_name);
        let records = self.run(&statement).await?;
        Ok(records
            .into_iter()
            .flat_map(|record| record.values.into_iter())
            .filter_map(|value| match value {
                GraphValue::Path(path) => Some(path),
                _ => None,
            })
            .collect())
    }

    /// Pods reachable through a Service joined with pods running as the
    /// `default` service account.
    async fn find_fixed_vulnerability_pattern(&self) -> KubeGraphResult<Vec<Record>> {
        self.run(&Statement::new(cypher::VULNERABILITY_PATTERN))
            .await
    }

    /// Round-trip a trivial statement.
    async fn health_check(&self) -> KubeGraphResult<()> {
        self.run(&Statement::new(cypher::PING)).await.map(|_| ())
    }

    /// Node counts per kind plus the relationship count.
    async fn stats(&self) -> KubeGraphResult<GraphStats> {
        let mut stats = GraphStats::default();
        for kind in AssetKind::ALL {
            let records = self.run(&Statement::new(cypher::count_nodes(kind))).await?;
            let count = records.first().and_then(|r| r.get_u64("count")).unwrap_or(0);
            stats.nodes.insert(kind, count);
        }
        let records = self
            .run(&Statement::new(cypher::COUNT_RELATIONSHIPS))
            .await?;
        stats.relationships = records.first().and_then(|r| r.get_u64("count")).unwrap_or(0);
        Ok(stats)
    }
}
