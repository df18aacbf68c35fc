use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, Role};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::path::Path;
use tracing::info;

use crate::collect::normalize;
use crate::collect::ClusterSource;
use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::asset::{Asset, AssetKind};

/// [`ClusterSource`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from an explicit kubeconfig, or infer one from the
    /// default kubeconfig and in-cluster environment.
    pub async fn connect(kubeconfig: Option<&Path>) -> KubeGraphResult<Self> {
        let config = match kubeconfig {
            Some(path) => {
                let raw = Kubeconfig::read_from(path).map_err(|err| {
                    KubeGraphError::ConfigError(format!(
                        "failed to read kubeconfig {}: {err}",
                        path.display()
                    ))
                })?;
                Config::from_custom_kubeconfig(raw, &KubeConfigOptions::default())
                    .await
                    .map_err(|err| KubeGraphError::ConfigError(err.to_string()))?
            }
            None => Config::infer()
                .await
                .map_err(|err| KubeGraphError::ConfigError(err.to_string()))?,
        };
        info!(cluster_url = %config.cluster_url, "Kubernetes client configured");

        let client = Client::try_from(config)
            .map_err(|err| KubeGraphError::ConfigError(err.to_string()))?;
        Ok(Self::new(client))
    }

    async fn list_namespaced<K>(&self, namespace: Option<&str>) -> Result<Vec<K>, kube::Error>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_cluster<K>(&self) -> Result<Vec<K>, kube::Error>
    where
        K: Resource + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn fetch(&self, kind: AssetKind, namespace: Option<&str>) -> Result<Vec<Asset>, kube::Error> {
        let assets = match kind {
            AssetKind::Namespace => self
                .list_cluster::<Namespace>()
                .await?
                .iter()
                .filter_map(normalize::namespace)
                .collect(),
            AssetKind::Pod => self
                .list_namespaced::<Pod>(namespace)
                .await?
                .iter()
                .filter_map(normalize::pod)
                .collect(),
            AssetKind::Service => self
                .list_namespaced::<Service>(namespace)
                .await?
                .iter()
                .filter_map(normalize::service)
                .collect(),
            AssetKind::Deployment => self
                .list_namespaced::<Deployment>(namespace)
                .await?
                .iter()
                .filter_map(normalize::deployment)
                .collect(),
            AssetKind::Ingress => self
                .list_namespaced::<Ingress>(namespace)
                .await?
                .iter()
                .filter_map(normalize::ingress)
                .collect(),
            AssetKind::Role => self
                .list_namespaced::<Role>(namespace)
                .await?
                .iter()
                .filter_map(normalize::role)
                .collect(),
            AssetKind::ClusterRole => self
                .list_cluster::<ClusterRole>()
                .await?
                .iter()
                .filter_map(normalize::cluster_role)
                .collect(),
            AssetKind::ServiceAccount => self
                .list_namespaced::<ServiceAccount>(namespace)
                .await?
                .iter()
                .filter_map(normalize::service_account)
                .collect(),
        };
        Ok(assets)
    }
}

#[async_trait]
impl ClusterSource for KubeSource {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn list(&self, kind: AssetKind, namespace: Option<&str>) -> KubeGraphResult<Vec<Asset>> {
        self.fetch(kind, namespace)
            .await
            .map_err(|err| KubeGraphError::Collection {
                kind,
                message: err.to_string(),
            })
    }
}
