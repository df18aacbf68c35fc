use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::asset::AssetInventory;
use crate::model::graph::Record;
use crate::model::relationship::Relationship;
use crate::store::cypher::{self, ImportPlan, PlannedBatch, Statement};
use crate::store::{bounded, merged_count, Channel, GraphStore, ImportReport, ImportStage};

// ---------------------------------------------------------------------------
// SessionPool / Session: the transport seam of the session channel
// ---------------------------------------------------------------------------

/// Pool handing out sessions against one graph database.
#[async_trait]
pub trait SessionPool: Send + Sync {
    /// Acquire a session holding a live connection. May wait for a free
    /// connection.
    async fn acquire(&self) -> KubeGraphResult<Box<dyn Session>>;
}

/// One session. At most one explicit transaction is open at a time.
#[async_trait]
pub trait Session: Send {
    /// Run a statement in its own auto-committed transaction.
    async fn run(&mut self, statement: &Statement) -> KubeGraphResult<Vec<Record>>;

    /// Open an explicit transaction.
    async fn begin(&mut self) -> KubeGraphResult<()>;

    /// Run a statement inside the open transaction.
    async fn run_in_transaction(&mut self, statement: &Statement) -> KubeGraphResult<Vec<Record>>;

    async fn commit(&mut self) -> KubeGraphResult<()>;

    /// Discard the open transaction. A no-op when none is open.
    async fn rollback(&mut self) -> KubeGraphResult<()>;

    /// Release the session, rolling back anything still open.
    async fn close(&mut self);
}

// ---------------------------------------------------------------------------
// SessionGraphStore
// ---------------------------------------------------------------------------

/// Graph store reached through pooled sessions.
///
/// An import holds one session for its whole duration and writes nodes and
/// relationships in one transaction each. A failing statement rolls back its
/// transaction and the import fails as a unit.
#[derive(Clone)]
pub struct SessionGraphStore {
    pool: Arc<dyn SessionPool>,
    acquire_timeout: Duration,
    request_timeout: Duration,
    batch_size: usize,
}

impl SessionGraphStore {
    pub fn new(pool: Arc<dyn SessionPool>, config: &StoreConfig) -> Self {
        Self::with_limits(pool, config.acquire_timeout(), config.batch_size)
            .with_request_timeout(config.request_timeout())
    }

    pub fn with_limits(pool: Arc<dyn SessionPool>, acquire_timeout: Duration, batch_size: usize) -> Self {
        Self {
            pool,
            acquire_timeout,
            request_timeout: StoreConfig::default().request_timeout(),
            batch_size,
        }
    }

    /// Upper bound on a single statement once a session is held.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn acquire(&self) -> KubeGraphResult<Box<dyn Session>> {
        bounded(
            self.acquire_timeout,
            Channel::Session,
            "acquire session",
            self.pool.acquire(),
        )
        .await
    }

    async fn run_on(&self, session: &mut dyn Session, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        bounded(
            self.request_timeout,
            Channel::Session,
            "run statement",
            session.run(statement),
        )
        .await
    }

    async fn import_on(&self, session: &mut dyn Session, plan: &ImportPlan) -> KubeGraphResult<usize> {
        self.run_on(session, &Statement::new(cypher::CLEAR_GRAPH)).await?;
        info!(channel = %Channel::Session, "Graph cleared");
        self.write_batches(session, ImportStage::Nodes, &plan.node_batches)
            .await?;
        self.write_batches(session, ImportStage::Relationships, &plan.relationship_batches)
            .await
    }

    /// Run every batch of one stage in a single transaction. Returns the
    /// summed `merged` column.
    async fn write_batches(
        &self,
        session: &mut dyn Session,
        stage: ImportStage,
        batches: &[PlannedBatch],
    ) -> KubeGraphResult<usize> {
        if batches.is_empty() {
            return Ok(0);
        }

        bounded(
            self.acquire_timeout,
            Channel::Session,
            "begin transaction",
            session.begin(),
        )
        .await?;

        let mut merged = 0;
        for batch in batches {
            let outcome = bounded(
                self.request_timeout,
                Channel::Session,
                "run statement",
                session.run_in_transaction(&batch.statement),
            )
            .await;
            match outcome {
                Ok(records) => merged += merged_count(&records),
                Err(err) => return Err(Self::abort(session, stage, err).await),
            }
        }

        if let Err(err) = session.commit().await {
            return Err(Self::abort(session, stage, err).await);
        }
        debug!(channel = %Channel::Session, %stage, batches = batches.len(), "Transaction committed");
        Ok(merged)
    }

    async fn abort(session: &mut dyn Session, stage: ImportStage, cause: KubeGraphError) -> KubeGraphError {
        if let Err(err) = session.rollback().await {
            warn!(channel = %Channel::Session, %stage, error = %err, "Rollback failed");
        }
        error!(channel = %Channel::Session, %stage, error = %cause, "Import transaction rolled back");
        KubeGraphError::ImportRolledBack {
            channel: Channel::Session,
            stage,
            message: cause.to_string(),
        }
    }
}

#[async_trait]
impl GraphStore for SessionGraphStore {
    fn channel(&self) -> Channel {
        Channel::Session
    }

    async fn run(&self, statement: &Statement) -> KubeGraphResult<Vec<Record>> {
        debug!(channel = %Channel::Session, statement = %statement.text, "Running statement");
        let mut session = self.acquire().await?;
        let result = self.run_on(session.as_mut(), statement).await;
        session.close().await;
        result
    }

    async fn import_assets(
        &self,
        inventory: &AssetInventory,
        relationships: &[Relationship],
    ) -> KubeGraphResult<ImportReport> {
        let plan = ImportPlan::build(inventory, relationships, self.batch_size)?;
        info!(
            channel = %Channel::Session,
            nodes = plan.node_count,
            relationships = plan.relationship_count,
            "Starting import"
        );

        let mut session = self.acquire().await?;
        let outcome = self.import_on(session.as_mut(), &plan).await;
        session.close().await;

        let merged = outcome?;
        Ok(ImportReport::completed(Channel::Session, &plan, merged))
    }
}
