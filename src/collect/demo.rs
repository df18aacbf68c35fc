use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::collect::ClusterSource;
use crate::error::KubeGraphResult;
use crate::model::asset::{
    Asset, AssetAttributes, AssetInventory, AssetKind, ContainerInfo, ContainerPortInfo,
    DeploymentAttributes, IngressAttributes, IngressPathInfo, IngressRuleInfo, LabelMap,
    NamespaceAttributes, PodAttributes, PodTemplateInfo, PolicyRuleInfo, RoleAttributes,
    ServiceAccountAttributes, ServiceAttributes, ServicePortInfo,
};

/// Fixed inventory served when no cluster is reachable.
#[derive(Debug, Clone)]
pub struct DemoSource {
    inventory: AssetInventory,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

fn epoch() -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single()
}

fn app(name: &str) -> LabelMap {
    LabelMap::from([("app".to_string(), name.to_string())])
}

fn container(name: &str, image: &str, port: i32) -> ContainerInfo {
    ContainerInfo {
        name: name.into(),
        image: Some(image.into()),
        ports: vec![ContainerPortInfo {
            container_port: port,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn namespace(name: &str) -> Asset {
    let mut asset = Asset::new(
        name,
        AssetAttributes::Namespace(NamespaceAttributes {
            status: Some("Active".into()),
            ..Default::default()
        }),
    );
    asset.creation_time = epoch();
    asset
}

#[allow(clippy::too_many_arguments)]
fn pod(name: &str, ns: &str, app_name: &str, ip: &str, node: &str, account: &str, image: &str, port: i32) -> Asset {
    let mut asset = Asset::new(
        name,
        AssetAttributes::Pod(PodAttributes {
            status: Some("Running".into()),
            pod_ip: Some(ip.into()),
            host_ip: Some("192.168.40.129".into()),
            node_name: Some(node.into()),
            service_account: Some(account.into()),
            containers: vec![container(app_name, image, port)],
        }),
    )
    .in_namespace(ns);
    asset.creation_time = epoch();
    asset.labels = app(app_name);
    asset
}

fn service(name: &str, ns: &str, app_name: &str, cluster_ip: &str, port: i32) -> Asset {
    let mut asset = Asset::new(
        name,
        AssetAttributes::Service(ServiceAttributes {
            service_type: Some("ClusterIP".into()),
            cluster_ip: Some(cluster_ip.into()),
            external_ips: Vec::new(),
            ports: vec![ServicePortInfo {
                port,
                target_port: Some(port.to_string()),
                ..Default::default()
            }],
            selector: Some(app(app_name)),
        }),
    )
    .in_namespace(ns);
    asset.creation_time = epoch();
    asset
}

fn deployment(name: &str, ns: &str, app_name: &str, replicas: i32) -> Asset {
    let mut asset = Asset::new(
        name,
        AssetAttributes::Deployment(DeploymentAttributes {
            replicas: Some(replicas),
            ready_replicas: replicas,
            selector: Some(app(app_name)),
            template: PodTemplateInfo {
                labels: app(app_name),
                containers: Vec::new(),
            },
        }),
    )
    .in_namespace(ns);
    asset.creation_time = epoch();
    asset
}

fn service_account(name: &str, ns: &str) -> Asset {
    let mut asset = Asset::new(
        name,
        AssetAttributes::ServiceAccount(ServiceAccountAttributes::default()),
    )
    .in_namespace(ns);
    asset.creation_time = epoch();
    asset
}

impl DemoSource {
    pub fn new() -> Self {
        let mut inventory = AssetInventory::new();
        for ns in ["default", "kube-system", "kube-public", "monitoring"] {
            inventory.push(namespace(ns));
        }

        inventory.push(pod("nginx-deployment-12345", "default", "nginx", "10.244.0.10", "k8s-node-1", "default", "nginx:1.21", 80));
        inventory.push(pod("redis-pod-67890", "default", "redis", "10.244.0.11", "k8s-node-1", "default", "redis:6.2", 6379));
        inventory.push(pod("postgres-54321", "monitoring", "postgres", "10.244.0.12", "k8s-node-2", "postgres-sa", "postgres:13", 5432));

        inventory.push(service("nginx-service", "default", "nginx", "10.96.0.100", 80));
        inventory.push(service("redis-service", "default", "redis", "10.96.0.101", 6379));
        inventory.push(service("postgres-service", "monitoring", "postgres", "10.96.0.102", 5432));

        inventory.push(deployment("nginx-deployment", "default", "nginx", 3));
        inventory.push(deployment("redis-deployment", "default", "redis", 1));
        inventory.push(deployment("postgres-deployment", "monitoring", "postgres", 1));

        inventory.push(
            Asset::new(
                "web-ingress",
                AssetAttributes::Ingress(IngressAttributes {
                    rules: vec![IngressRuleInfo {
                        host: Some("shop.example.com".into()),
                        paths: vec![IngressPathInfo {
                            path: Some("/".into()),
                            path_type: Some("Prefix".into()),
                            service: Some("nginx-service".into()),
                            port: Some("80".into()),
                        }],
                    }],
                    ..Default::default()
                }),
            )
            .in_namespace("default"),
        );

        inventory.push(
            Asset::new(
                "pod-reader",
                AssetAttributes::Role(RoleAttributes {
                    rules: vec![PolicyRuleInfo {
                        api_groups: vec![String::new()],
                        resources: vec!["pods".into()],
                        verbs: vec!["get".into(), "list".into(), "watch".into()],
                        resource_names: Vec::new(),
                    }],
                }),
            )
            .in_namespace("default"),
        );
        inventory.push(Asset::new(
            "cluster-admin",
            AssetAttributes::ClusterRole(RoleAttributes {
                rules: vec![PolicyRuleInfo {
                    api_groups: vec!["*".into()],
                    resources: vec!["*".into()],
                    verbs: vec!["*".into()],
                    resource_names: Vec::new(),
                }],
            }),
        ));

        inventory.push(service_account("default", "default"));
        inventory.push(service_account("postgres-sa", "monitoring"));

        Self { inventory }
    }

    /// The whole demo inventory.
    pub fn inventory(&self) -> &AssetInventory {
        &self.inventory
    }
}

#[async_trait]
impl ClusterSource for DemoSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn list(&self, kind: AssetKind, namespace: Option<&str>) -> KubeGraphResult<Vec<Asset>> {
        Ok(self
            .inventory
            .of_kind(kind)
            .iter()
            .filter(|asset| match namespace {
                Some(ns) if !kind.is_cluster_scoped() => asset.namespace.as_deref() == Some(ns),
                _ => true,
            })
            .cloned()
            .collect())
    }
}
