//! Kubernetes API objects to [`Asset`] records.
//!
//! Each function returns `None` for a resource without `metadata.name`;
//! every other missing field becomes an absent or empty attribute.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, Namespace, Pod, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule, Role};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use tracing::debug;

use crate::model::asset::{
    Asset, AssetAttributes, ContainerInfo, ContainerPortInfo, DeploymentAttributes,
    IngressAttributes, IngressPathInfo, IngressRuleInfo, IngressTlsInfo, NamespaceAttributes,
    PodAttributes, PodTemplateInfo, PolicyRuleInfo, RoleAttributes, ServiceAccountAttributes,
    ServiceAttributes, ServicePortInfo,
};

fn from_meta(meta: &ObjectMeta, attributes: AssetAttributes) -> Option<Asset> {
    let Some(name) = meta.name.clone() else {
        debug!(kind = %attributes.kind(), "Skipping resource without a name");
        return None;
    };
    let mut asset = Asset::new(name, attributes);
    if let Some(ns) = &meta.namespace {
        asset = asset.in_namespace(ns.clone());
    }
    asset.creation_time = meta.creation_timestamp.as_ref().map(|t| t.0);
    asset.labels = meta.labels.clone().unwrap_or_default();
    Some(asset)
}

/// Raw JSON form of an optional API sub-object.
fn raw<T: Serialize>(value: Option<&T>) -> Option<serde_json::Value> {
    value.and_then(|v| serde_json::to_value(v).ok())
}

fn int_or_string(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(i) => i.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

fn container(c: &Container) -> ContainerInfo {
    ContainerInfo {
        name: c.name.clone(),
        image: c.image.clone(),
        ports: c
            .ports
            .iter()
            .flatten()
            .map(|p| ContainerPortInfo {
                name: p.name.clone(),
                container_port: p.container_port,
                protocol: p.protocol.clone(),
            })
            .collect(),
        resources: raw(c.resources.as_ref()),
        security_context: raw(c.security_context.as_ref()),
    }
}

fn policy_rules(rules: Option<&Vec<PolicyRule>>) -> Vec<PolicyRuleInfo> {
    rules
        .into_iter()
        .flatten()
        .map(|r| PolicyRuleInfo {
            api_groups: r.api_groups.clone().unwrap_or_default(),
            resources: r.resources.clone().unwrap_or_default(),
            verbs: r.verbs.clone(),
            resource_names: r.resource_names.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn namespace(ns: &Namespace) -> Option<Asset> {
    from_meta(
        &ns.metadata,
        AssetAttributes::Namespace(NamespaceAttributes {
            status: ns.status.as_ref().and_then(|s| s.phase.clone()),
            annotations: ns.metadata.annotations.clone().unwrap_or_default(),
        }),
    )
}

pub fn pod(pod: &Pod) -> Option<Asset> {
    let spec = pod.spec.as_ref();
    let status = pod.status.as_ref();
    from_meta(
        &pod.metadata,
        AssetAttributes::Pod(PodAttributes {
            status: status.and_then(|s| s.phase.clone()),
            pod_ip: status.and_then(|s| s.pod_ip.clone()),
            host_ip: status.and_then(|s| s.host_ip.clone()),
            node_name: spec.and_then(|s| s.node_name.clone()),
            service_account: spec.and_then(|s| s.service_account_name.clone()),
            containers: spec
                .map(|s| s.containers.iter().map(container).collect())
                .unwrap_or_default(),
        }),
    )
}

pub fn service(svc: &Service) -> Option<Asset> {
    let spec = svc.spec.as_ref();
    from_meta(
        &svc.metadata,
        AssetAttributes::Service(ServiceAttributes {
            service_type: spec.and_then(|s| s.type_.clone()),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
            external_ips: spec
                .and_then(|s| s.external_ips.clone())
                .unwrap_or_default(),
            ports: spec
                .and_then(|s| s.ports.as_ref())
                .into_iter()
                .flatten()
                .map(|p| ServicePortInfo {
                    name: p.name.clone(),
                    port: p.port,
                    target_port: p.target_port.as_ref().map(int_or_string),
                    protocol: p.protocol.clone(),
                    node_port: p.node_port,
                })
                .collect(),
            selector: spec.and_then(|s| s.selector.clone()),
        }),
    )
}

pub fn deployment(dep: &Deployment) -> Option<Asset> {
    let spec = dep.spec.as_ref();
    let template = spec.map(|s| &s.template);
    from_meta(
        &dep.metadata,
        AssetAttributes::Deployment(DeploymentAttributes {
            replicas: spec.and_then(|s| s.replicas),
            ready_replicas: dep
                .status
                .as_ref()
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0),
            selector: spec.and_then(|s| s.selector.match_labels.clone()),
            template: PodTemplateInfo {
                labels: template
                    .and_then(|t| t.metadata.as_ref())
                    .and_then(|m| m.labels.clone())
                    .unwrap_or_default(),
                containers: template
                    .and_then(|t| t.spec.as_ref())
                    .map(|s| s.containers.iter().map(container).collect())
                    .unwrap_or_default(),
            },
        }),
    )
}

pub fn ingress(ing: &Ingress) -> Option<Asset> {
    let spec = ing.spec.as_ref();
    let rules = spec
        .and_then(|s| s.rules.as_ref())
        .into_iter()
        .flatten()
        .map(|rule| IngressRuleInfo {
            host: rule.host.clone(),
            paths: rule
                .http
                .iter()
                .flat_map(|http| http.paths.iter())
                .map(|path| {
                    let backend = path.backend.service.as_ref();
                    IngressPathInfo {
                        path: path.path.clone(),
                        path_type: Some(path.path_type.clone()),
                        service: backend.map(|b| b.name.clone()),
                        port: backend.and_then(|b| b.port.as_ref()).and_then(|port| {
                            port.number
                                .map(|n| n.to_string())
                                .or_else(|| port.name.clone())
                        }),
                    }
                })
                .collect(),
        })
        .collect();
    let tls = spec
        .and_then(|s| s.tls.as_ref())
        .into_iter()
        .flatten()
        .map(|t| IngressTlsInfo {
            hosts: t.hosts.clone().unwrap_or_default(),
            secret_name: t.secret_name.clone(),
        })
        .collect();

    from_meta(
        &ing.metadata,
        AssetAttributes::Ingress(IngressAttributes {
            rules,
            tls,
            annotations: ing.metadata.annotations.clone().unwrap_or_default(),
        }),
    )
}

pub fn role(role: &Role) -> Option<Asset> {
    from_meta(
        &role.metadata,
        AssetAttributes::Role(RoleAttributes {
            rules: policy_rules(role.rules.as_ref()),
        }),
    )
}

pub fn cluster_role(role: &ClusterRole) -> Option<Asset> {
    from_meta(
        &role.metadata,
        AssetAttributes::ClusterRole(RoleAttributes {
            rules: policy_rules(role.rules.as_ref()),
        }),
    )
}

pub fn service_account(sa: &ServiceAccount) -> Option<Asset> {
    from_meta(
        &sa.metadata,
        AssetAttributes::ServiceAccount(ServiceAccountAttributes {
            secrets: sa
                .secrets
                .iter()
                .flatten()
                .filter_map(|s| s.name.clone())
                .collect(),
        }),
    )
}
