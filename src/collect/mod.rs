//! Asset collection from the cluster control plane.
//!
//! ## Pipeline
//! 1. List all eight kinds concurrently through a [`ClusterSource`]
//! 2. Normalize each resource into an [`Asset`]
//! 3. Recover from a failed kind by logging it and using an empty list
//! 4. Infer relationships over the complete inventory

pub mod demo;
pub mod kubernetes;
pub mod normalize;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::error::KubeGraphResult;
use crate::infer::RelationshipInference;
use crate::model::asset::{Asset, AssetInventory, AssetKind};
use crate::model::relationship::Relationship;

pub use self::demo::DemoSource;
pub use self::kubernetes::KubeSource;

/// Read-only access to the resources of one cluster.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// List and normalize every resource of `kind`. `namespace` restricts
    /// namespaced kinds; cluster-scoped kinds are always listed whole.
    async fn list(&self, kind: AssetKind, namespace: Option<&str>) -> KubeGraphResult<Vec<Asset>>;
}

/// Assets and the relationships inferred from them in the same pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub assets: AssetInventory,
    pub relationships: Vec<Relationship>,
    pub collected_at: DateTime<Utc>,
}

/// Collects the asset inventory through a shared [`ClusterSource`].
#[derive(Clone)]
pub struct AssetCollector {
    source: Arc<dyn ClusterSource>,
    namespace: Option<String>,
    inference: RelationshipInference,
}

impl AssetCollector {
    pub fn new(source: Arc<dyn ClusterSource>) -> Self {
        Self {
            source,
            namespace: None,
            inference: RelationshipInference::new(),
        }
    }

    /// Restrict collection to one namespace.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_inference(mut self, inference: RelationshipInference) -> Self {
        self.inference = inference;
        self
    }

    /// Build a collector for the configured cluster, falling back to the
    /// demo inventory when allowed and no credentials load.
    pub async fn from_config(config: &ClusterConfig) -> KubeGraphResult<Self> {
        let source: Arc<dyn ClusterSource> = if config.demo {
            Arc::new(DemoSource::new())
        } else {
            match KubeSource::connect(config.kubeconfig.as_deref()).await {
                Ok(source) => Arc::new(source),
                Err(err) if config.demo_fallback => {
                    warn!(error = %err, "Cluster credentials unavailable; using demo inventory");
                    Arc::new(DemoSource::new())
                }
                Err(err) => return Err(err),
            }
        };
        info!(source = source.name(), namespace = ?config.namespace, "Asset collector ready");

        Ok(Self::new(source)
            .with_namespace(config.namespace.clone())
            .with_inference(RelationshipInference::new().scoped_selectors(config.scoped_selectors)))
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Collect one kind. Never fails: a listing error is logged and yields
    /// an empty list.
    pub async fn collect_kind(&self, kind: AssetKind) -> Vec<Asset> {
        let scope = if kind.is_cluster_scoped() {
            None
        } else {
            self.namespace.as_deref()
        };

        match self.source.list(kind, scope).await {
            Ok(mut assets) => {
                if let (AssetKind::Namespace, Some(ns)) = (kind, self.namespace.as_deref()) {
                    assets.retain(|asset| asset.name == ns);
                }
                debug!(%kind, count = assets.len(), "Collected assets");
                assets
            }
            Err(err) => {
                warn!(%kind, source = self.source.name(), error = %err, "Collection failed; continuing without this kind");
                Vec::new()
            }
        }
    }

    /// Collect all eight kinds concurrently.
    pub async fn collect_all_assets(&self) -> AssetInventory {
        let lists = join_all(AssetKind::ALL.map(|kind| self.collect_kind(kind))).await;

        let mut inventory = AssetInventory::new();
        for (kind, assets) in AssetKind::ALL.into_iter().zip(lists) {
            inventory.set(kind, assets);
        }
        info!(
            total = inventory.len(),
            source = self.source.name(),
            "Collected assets"
        );
        inventory
    }

    /// Collect all assets and return the inferred relationships.
    pub async fn collect_asset_relationships(&self) -> Vec<Relationship> {
        let inventory = self.collect_all_assets().await;
        self.inference.infer(&inventory)
    }

    /// Collect all assets and infer relationships from that same pass.
    pub async fn collect_snapshot(&self) -> Snapshot {
        let assets = self.collect_all_assets().await;
        let relationships = self.inference.infer(&assets);
        info!(
            assets = assets.len(),
            relationships = relationships.len(),
            "Snapshot collected"
        );
        Snapshot {
            assets,
            relationships,
            collected_at: Utc::now(),
        }
    }

    /// Check the control plane answers a namespace listing.
    pub async fn health_check(&self) -> KubeGraphResult<()> {
        self.source.list(AssetKind::Namespace, None).await.map(|_| ())
    }
}
