//! Relationship inference over one collection pass.
//!
//! Four fixed rules, applied in order:
//! 1. every Pod BELONGS_TO its Namespace
//! 2. a Service with a non-empty selector SELECTS every matching Pod
//! 3. a Deployment with a non-empty selector MANAGES every matching Pod
//! 4. a ServiceAccount PROVIDES_IDENTITY to every Pod running as it
//!
//! Role and ClusterRole binding edges are not inferred: RoleBinding and
//! ClusterRoleBinding resources are not collected, so there is nothing to
//! resolve subjects against.

use tracing::debug;

use crate::model::asset::{Asset, AssetInventory, AssetKind, LabelMap};
use crate::model::relationship::{AssetRef, RelationKind, Relationship};

/// Label-subset containment test.
///
/// True iff `selector` is non-empty and every key is present in `labels`
/// with an equal value. An empty selector matches nothing.
pub fn matches_selector(labels: &LabelMap, selector: &LabelMap) -> bool {
    !selector.is_empty()
        && selector
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
}

/// Derives relationships from an asset inventory.
#[derive(Debug, Clone, Default)]
pub struct RelationshipInference {
    scoped_selectors: bool,
}

impl RelationshipInference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict SELECTS and MANAGES to pods in the selector owner's
    /// namespace. Off by default.
    pub fn scoped_selectors(mut self, scoped: bool) -> Self {
        self.scoped_selectors = scoped;
        self
    }

    /// Apply all rules and return the relationship set in rule order.
    pub fn infer(&self, inventory: &AssetInventory) -> Vec<Relationship> {
        let pods = inventory.of_kind(AssetKind::Pod);
        let mut relationships = Vec::new();

        for pod in pods {
            if let Some(ns) = pod.namespace.as_deref() {
                relationships.push(Relationship::new(
                    pod.reference(),
                    RelationKind::BelongsTo,
                    AssetRef::new(AssetKind::Namespace, ns, None),
                ));
            }
        }

        for service in inventory.of_kind(AssetKind::Service) {
            self.select_pods(service, pods, RelationKind::Selects, &mut relationships);
        }

        for deployment in inventory.of_kind(AssetKind::Deployment) {
            self.select_pods(deployment, pods, RelationKind::Manages, &mut relationships);
        }

        for account in inventory.of_kind(AssetKind::ServiceAccount) {
            let source = account.reference();
            for pod in pods.iter().filter(|pod| {
                pod.namespace == account.namespace
                    && pod.service_account() == Some(account.name.as_str())
            }) {
                relationships.push(Relationship::new(
                    source.clone(),
                    RelationKind::ProvidesIdentity,
                    pod.reference(),
                ));
            }
        }

        debug!(count = relationships.len(), "Inferred relationships");
        relationships
    }

    fn select_pods(
        &self,
        owner: &Asset,
        pods: &[Asset],
        relation: RelationKind,
        out: &mut Vec<Relationship>,
    ) {
        let Some(selector) = owner.selector() else {
            return;
        };
        let source = owner.reference();
        for pod in pods {
            if self.scoped_selectors && pod.namespace != owner.namespace {
                continue;
            }
            if matches_selector(&pod.labels, selector) {
                out.push(Relationship::new(source.clone(), relation, pod.reference()));
            }
        }
    }
}

/// Infer with default options.
pub fn infer_relationships(inventory: &AssetInventory) -> Vec<Relationship> {
    RelationshipInference::new().infer(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::asset::{
        AssetAttributes, DeploymentAttributes, PodAttributes, ServiceAccountAttributes,
        ServiceAttributes,
    };

    fn labels(pairs: &[(&str, &str)]) -> LabelMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn pod(name: &str, ns: &str, app: &str, account: Option<&str>) -> Asset {
        Asset::new(
            name,
            AssetAttributes::Pod(PodAttributes {
                service_account: account.map(str::to_string),
                ..Default::default()
            }),
        )
        .in_namespace(ns)
        .with_label("app", app)
    }

    fn service(name: &str, ns: &str, selector: Option<LabelMap>) -> Asset {
        Asset::new(
            name,
            AssetAttributes::Service(ServiceAttributes {
                selector,
                ..Default::default()
            }),
        )
        .in_namespace(ns)
    }

    fn deployment(name: &str, ns: &str, selector: LabelMap) -> Asset {
        Asset::new(
            name,
            AssetAttributes::Deployment(DeploymentAttributes {
                selector: Some(selector),
                ..Default::default()
            }),
        )
        .in_namespace(ns)
    }

    fn account(name: &str, ns: &str) -> Asset {
        Asset::new(
            name,
            AssetAttributes::ServiceAccount(ServiceAccountAttributes::default()),
        )
        .in_namespace(ns)
    }

    fn of_kind(rels: &[Relationship], kind: RelationKind) -> Vec<&Relationship> {
        rels.iter().filter(|r| r.relation == kind).collect()
    }

    #[test]
    fn test_selector_requires_every_pair() {
        let pod_labels = labels(&[("app", "nginx"), ("tier", "web")]);
        assert!(matches_selector(&pod_labels, &labels(&[("app", "nginx")])));
        assert!(matches_selector(
            &pod_labels,
            &labels(&[("app", "nginx"), ("tier", "web")])
        ));
        assert!(!matches_selector(
            &pod_labels,
            &labels(&[("app", "nginx"), ("tier", "db")])
        ));
        assert!(!matches_selector(&pod_labels, &labels(&[("env", "prod")])));
    }

    #[test]
    fn test_empty_selector_matches_nothing() {
        assert!(!matches_selector(&labels(&[("app", "nginx")]), &LabelMap::new()));
        assert!(!matches_selector(&LabelMap::new(), &LabelMap::new()));
    }

    #[test]
    fn test_selector_values_are_case_sensitive() {
        assert!(!matches_selector(
            &labels(&[("app", "Nginx")]),
            &labels(&[("app", "nginx")])
        ));
    }

    #[test]
    fn test_service_selects_only_matching_pod() {
        let inventory = AssetInventory::new()
            .with(pod("p1", "default", "nginx", None))
            .with(pod("p2", "default", "redis", None))
            .with(service("s1", "default", Some(labels(&[("app", "nginx")]))));

        let rels = infer_relationships(&inventory);
        let selects = of_kind(&rels, RelationKind::Selects);
        assert_eq!(selects.len(), 1);
        assert_eq!(selects[0].source.name, "s1");
        assert_eq!(selects[0].target.name, "p1");
    }

    #[test]
    fn test_service_without_selector_selects_nothing() {
        let inventory = AssetInventory::new()
            .with(pod("p1", "default", "nginx", None))
            .with(service("external", "default", None))
            .with(service("blank", "default", Some(LabelMap::new())));

        let rels = infer_relationships(&inventory);
        assert!(of_kind(&rels, RelationKind::Selects).is_empty());
    }

    #[test]
    fn test_every_pod_belongs_to_its_namespace() {
        let inventory = AssetInventory::new()
            .with(pod("p1", "default", "nginx", None))
            .with(pod("p2", "monitoring", "pg", None));

        let rels = infer_relationships(&inventory);
        let belongs = of_kind(&rels, RelationKind::BelongsTo);
        assert_eq!(belongs.len(), 2);
        assert_eq!(belongs[1].target, AssetRef::new(AssetKind::Namespace, "monitoring", None));
    }

    #[test]
    fn test_deployment_manages_matching_pods() {
        let inventory = AssetInventory::new()
            .with(pod("web-1", "default", "web", None))
            .with(pod("web-2", "default", "web", None))
            .with(pod("db-1", "default", "db", None))
            .with(deployment("web", "default", labels(&[("app", "web")])));

        let rels = infer_relationships(&inventory);
        let managed: Vec<_> = of_kind(&rels, RelationKind::Manages)
            .iter()
            .map(|r| r.target.name.clone())
            .collect();
        assert_eq!(managed, vec!["web-1", "web-2"]);
    }

    #[test]
    fn test_service_account_provides_identity() {
        let inventory = AssetInventory::new()
            .with(pod("p3", "default", "nginx", Some("default")))
            .with(pod("p4", "other", "nginx", Some("default")))
            .with(account("default", "default"));

        let rels = infer_relationships(&inventory);
        let identity = of_kind(&rels, RelationKind::ProvidesIdentity);
        assert_eq!(identity.len(), 1);
        assert_eq!(identity[0].source.name, "default");
        assert_eq!(identity[0].target.name, "p3");
    }

    #[test]
    fn test_selectors_cross_namespaces_unless_scoped() {
        let inventory = AssetInventory::new()
            .with(pod("p1", "default", "nginx", None))
            .with(pod("p2", "staging", "nginx", None))
            .with(service("s1", "default", Some(labels(&[("app", "nginx")]))));

        let open = infer_relationships(&inventory);
        assert_eq!(of_kind(&open, RelationKind::Selects).len(), 2);

        let scoped = RelationshipInference::new()
            .scoped_selectors(true)
            .infer(&inventory);
        let selects = of_kind(&scoped, RelationKind::Selects);
        assert_eq!(selects.len(), 1);
        assert_eq!(selects[0].target.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_rules_emit_in_order() {
        let inventory = AssetInventory::new()
            .with(pod("p1", "default", "nginx", Some("default")))
            .with(service("s1", "default", Some(labels(&[("app", "nginx")]))))
            .with(deployment("d1", "default", labels(&[("app", "nginx")])))
            .with(account("default", "default"));

        let kinds: Vec<_> = infer_relationships(&inventory)
            .into_iter()
            .map(|r| r.relation)
            .collect();
        assert_eq!(kinds, RelationKind::ALL.to_vec());
    }
}
