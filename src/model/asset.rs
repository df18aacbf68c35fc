use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::KubeGraphError;
use crate::model::relationship::AssetRef;

/// Label and selector maps keep a stable key order so serialized forms are
/// deterministic across channels.
pub type LabelMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// AssetKind: the eight collected resource kinds
// ---------------------------------------------------------------------------

/// Kind of a cluster resource tracked in the asset inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetKind {
    Namespace,
    Pod,
    Service,
    Deployment,
    Ingress,
    Role,
    ClusterRole,
    ServiceAccount,
}

impl AssetKind {
    /// Every kind, in collection order.
    pub const ALL: [AssetKind; 8] = [
        AssetKind::Namespace,
        AssetKind::Pod,
        AssetKind::Service,
        AssetKind::Deployment,
        AssetKind::Ingress,
        AssetKind::Role,
        AssetKind::ClusterRole,
        AssetKind::ServiceAccount,
    ];

    /// Graph label and `type` property value for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Namespace => "Namespace",
            AssetKind::Pod => "Pod",
            AssetKind::Service => "Service",
            AssetKind::Deployment => "Deployment",
            AssetKind::Ingress => "Ingress",
            AssetKind::Role => "Role",
            AssetKind::ClusterRole => "ClusterRole",
            AssetKind::ServiceAccount => "ServiceAccount",
        }
    }

    /// Key of this kind's list in a serialized inventory.
    pub fn collection_key(&self) -> &'static str {
        match self {
            AssetKind::Namespace => "namespaces",
            AssetKind::Pod => "pods",
            AssetKind::Service => "services",
            AssetKind::Deployment => "deployments",
            AssetKind::Ingress => "ingresses",
            AssetKind::Role => "roles",
            AssetKind::ClusterRole => "clusterRoles",
            AssetKind::ServiceAccount => "serviceAccounts",
        }
    }

    /// Cluster-scoped kinds are identified by name alone.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, AssetKind::Namespace | AssetKind::ClusterRole)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssetKind {
    type Err = KubeGraphError;

    /// Accepts the label (`Pod`), the collection key (`pods`) or either in
    /// any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AssetKind::ALL
            .into_iter()
            .find(|kind| {
                kind.label().to_ascii_lowercase() == wanted
                    || kind.collection_key().to_ascii_lowercase() == wanted
            })
            .ok_or_else(|| KubeGraphError::InvalidRequest(format!("unknown asset kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Asset: a normalized resource record
// ---------------------------------------------------------------------------

/// One normalized cluster resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Resource name, unique within kind and namespace.
    pub name: String,
    /// Owning namespace; `None` for cluster-scoped kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// `metadata.creationTimestamp`.
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    /// Resource labels, possibly empty.
    #[serde(default)]
    pub labels: LabelMap,
    /// Kind-specific attributes; the variant determines the kind.
    #[serde(flatten)]
    pub attributes: AssetAttributes,
}

impl Asset {
    /// Create an asset with no labels or creation time.
    pub fn new(name: impl Into<String>, attributes: AssetAttributes) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            creation_time: None,
            labels: LabelMap::new(),
            attributes,
        }
    }

    /// Set the namespace. Ignored for cluster-scoped kinds.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        if !self.kind().is_cluster_scoped() {
            self.namespace = Some(namespace.into());
        }
        self
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set the creation timestamp.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.creation_time = Some(at);
        self
    }

    pub fn kind(&self) -> AssetKind {
        self.attributes.kind()
    }

    /// Reference usable as a relationship endpoint.
    pub fn reference(&self) -> AssetRef {
        AssetRef {
            kind: self.kind(),
            name: self.name.clone(),
            namespace: if self.kind().is_cluster_scoped() {
                None
            } else {
                self.namespace.clone()
            },
        }
    }

    /// Label selector carried by Services and Deployments.
    pub fn selector(&self) -> Option<&LabelMap> {
        match &self.attributes {
            AssetAttributes::Service(svc) => svc.selector.as_ref(),
            AssetAttributes::Deployment(dep) => dep.selector.as_ref(),
            _ => None,
        }
    }

    /// Service account a Pod runs as.
    pub fn service_account(&self) -> Option<&str> {
        match &self.attributes {
            AssetAttributes::Pod(pod) => pod.service_account.as_deref(),
            _ => None,
        }
    }
}

/// Kind-specific attribute sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AssetAttributes {
    Namespace(NamespaceAttributes),
    Pod(PodAttributes),
    Service(ServiceAttributes),
    Deployment(DeploymentAttributes),
    Ingress(IngressAttributes),
    Role(RoleAttributes),
    ClusterRole(RoleAttributes),
    ServiceAccount(ServiceAccountAttributes),
}

impl AssetAttributes {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetAttributes::Namespace(_) => AssetKind::Namespace,
            AssetAttributes::Pod(_) => AssetKind::Pod,
            AssetAttributes::Service(_) => AssetKind::Service,
            AssetAttributes::Deployment(_) => AssetKind::Deployment,
            AssetAttributes::Ingress(_) => AssetKind::Ingress,
            AssetAttributes::Role(_) => AssetKind::Role,
            AssetAttributes::ClusterRole(_) => AssetKind::ClusterRole,
            AssetAttributes::ServiceAccount(_) => AssetKind::ServiceAccount,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceAttributes {
    /// `status.phase`, e.g. `Active`.
    pub status: Option<String>,
    #[serde(default)]
    pub annotations: LabelMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodAttributes {
    /// `status.phase`.
    pub status: Option<String>,
    #[serde(rename = "podIP")]
    pub pod_ip: Option<String>,
    #[serde(rename = "hostIP")]
    pub host_ip: Option<String>,
    pub node_name: Option<String>,
    /// `spec.serviceAccountName`.
    pub service_account: Option<String>,
    /// Containers in declaration order.
    #[serde(default)]
    pub containers: Vec<ContainerInfo>,
}

/// One container of a pod or pod template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub name: String,
    pub image: Option<String>,
    #[serde(default)]
    pub ports: Vec<ContainerPortInfo>,
    /// Raw `resources` block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
    /// Raw `securityContext` block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPortInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub container_port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAttributes {
    /// `spec.type`, e.g. `ClusterIP`.
    pub service_type: Option<String>,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: Option<String>,
    #[serde(default, rename = "externalIPs")]
    pub external_ips: Vec<String>,
    #[serde(default)]
    pub ports: Vec<ServicePortInfo>,
    /// `None` and an empty map both select nothing.
    pub selector: Option<LabelMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePortInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub port: i32,
    /// Numeric or named target port, rendered as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentAttributes {
    pub replicas: Option<i32>,
    #[serde(default)]
    pub ready_replicas: i32,
    /// `spec.selector.matchLabels`; match expressions are not evaluated.
    pub selector: Option<LabelMap>,
    #[serde(default)]
    pub template: PodTemplateInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateInfo {
    #[serde(default)]
    pub labels: LabelMap,
    #[serde(default)]
    pub containers: Vec<ContainerInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressAttributes {
    #[serde(default)]
    pub rules: Vec<IngressRuleInfo>,
    #[serde(default)]
    pub tls: Vec<IngressTlsInfo>,
    #[serde(default)]
    pub annotations: LabelMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressRuleInfo {
    pub host: Option<String>,
    #[serde(default)]
    pub paths: Vec<IngressPathInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressPathInfo {
    pub path: Option<String>,
    pub path_type: Option<String>,
    /// Backend service name, if the backend is a service.
    pub service: Option<String>,
    /// Backend port number or name, rendered as a string.
    pub port: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressTlsInfo {
    #[serde(default)]
    pub hosts: Vec<String>,
    pub secret_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleAttributes {
    #[serde(default)]
    pub rules: Vec<PolicyRuleInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRuleInfo {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccountAttributes {
    /// Names of mounted secrets.
    #[serde(default)]
    pub secrets: Vec<String>,
}

// ---------------------------------------------------------------------------
// AssetInventory: the eight per-kind lists from one collection pass
// ---------------------------------------------------------------------------

/// Assets from one collection pass, keyed by kind. Any list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInventory {
    #[serde(default)]
    pub namespaces: Vec<Asset>,
    #[serde(default)]
    pub pods: Vec<Asset>,
    #[serde(default)]
    pub services: Vec<Asset>,
    #[serde(default)]
    pub deployments: Vec<Asset>,
    #[serde(default)]
    pub ingresses: Vec<Asset>,
    #[serde(default)]
    pub roles: Vec<Asset>,
    #[serde(default)]
    pub cluster_roles: Vec<Asset>,
    #[serde(default)]
    pub service_accounts: Vec<Asset>,
}

impl AssetInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assets of one kind.
    pub fn of_kind(&self, kind: AssetKind) -> &[Asset] {
        match kind {
            AssetKind::Namespace => &self.namespaces,
            AssetKind::Pod => &self.pods,
            AssetKind::Service => &self.services,
            AssetKind::Deployment => &self.deployments,
            AssetKind::Ingress => &self.ingresses,
            AssetKind::Role => &self.roles,
            AssetKind::ClusterRole => &self.cluster_roles,
            AssetKind::ServiceAccount => &self.service_accounts,
        }
    }

    fn list_mut(&mut self, kind: AssetKind) -> &mut Vec<Asset> {
        match kind {
            AssetKind::Namespace => &mut self.namespaces,
            AssetKind::Pod => &mut self.pods,
            AssetKind::Service => &mut self.services,
            AssetKind::Deployment => &mut self.deployments,
            AssetKind::Ingress => &mut self.ingresses,
            AssetKind::Role => &mut self.roles,
            AssetKind::ClusterRole => &mut self.cluster_roles,
            AssetKind::ServiceAccount => &mut self.service_accounts,
        }
    }

    /// Replace the list for one kind.
    pub fn set(&mut self, kind: AssetKind, assets: Vec<Asset>) {
        *self.list_mut(kind) = assets;
    }

    /// Append an asset to the list matching its kind.
    pub fn push(&mut self, asset: Asset) {
        self.list_mut(asset.kind()).push(asset);
    }

    /// Builder form of [`AssetInventory::push`].
    pub fn with(mut self, asset: Asset) -> Self {
        self.push(asset);
        self
    }

    /// All assets in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> + '_ {
        AssetKind::ALL
            .into_iter()
            .flat_map(move |kind| self.of_kind(kind).iter())
    }

    pub fn len(&self) -> usize {
        AssetKind::ALL
            .iter()
            .map(|kind| self.of_kind(*kind).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-kind counts.
    pub fn counts(&self) -> BTreeMap<AssetKind, usize> {
        AssetKind::ALL
            .into_iter()
            .map(|kind| (kind, self.of_kind(kind).len()))
            .collect()
    }
}
