//! Tenant scope (kcp logical cluster) plumbing.
//!
//! Every store call takes an explicit [`Scope`]; nothing reads it from
//! ambient state.

pub mod discovery;
pub mod router;

use std::fmt;

use kube::core::ObjectMeta;

use crate::crd::api_binding::APIBinding;
use crate::store::ObjectKey;

pub use router::ScopeRouter;

/// Annotation carrying the logical cluster of objects served through a
/// wildcard (`/clusters/*`) endpoint.
pub const CLUSTER_ANNOTATION: &str = "kcp.dev/cluster";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_meta(meta: &ObjectMeta) -> Option<Self> {
        meta.annotations
            .as_ref()
            .and_then(|a| a.get(CLUSTER_ANNOTATION))
            .filter(|v| !v.is_empty())
            .map(|v| Scope::new(v.as_str()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// "Re-evaluate this object" key delivered to a reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerKey {
    pub scope: Scope,
    pub namespace: Option<String>,
    pub name: String,
}

impl TriggerKey {
    pub fn new(
        scope: Scope,
        namespace: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            namespace,
            name: name.into(),
        }
    }

    pub fn object_key(&self) -> ObjectKey {
        ObjectKey {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    /// Key for the watched object itself.
    pub fn for_object(meta: &ObjectMeta) -> Option<Self> {
        Some(Self::new(
            Scope::from_meta(meta)?,
            meta.namespace.clone(),
            meta.name.clone()?,
        ))
    }

    /// Key for the controlling owner of kind `owner_kind`. Owners are
    /// assumed cluster-scoped, which holds for APIBindings.
    pub fn for_owner(meta: &ObjectMeta, owner_kind: &str) -> Option<Self> {
        let scope = Scope::from_meta(meta)?;
        let owner = meta.owner_references.as_ref()?.iter().find(|o| {
            o.kind == owner_kind && o.controller.unwrap_or(false)
        })?;
        Some(Self::new(scope, None, owner.name.clone()))
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}|{}/{}", self.scope, ns, self.name),
            None => write!(f, "{}|{}", self.scope, self.name),
        }
    }
}

/// Restricts reconciliation to APIBindings of one export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeFilter {
    pub export_name: String,
    pub export_path: String,
}

impl ScopeFilter {
    pub fn matches(&self, binding: &APIBinding) -> bool {
        binding
            .export_target()
            .map(|(name, path)| {
                name == self.export_name && path == self.export_path
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::api_binding::{
        APIBindingSpec, ExportReference, WorkspaceExportReference,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use std::collections::BTreeMap;

    fn meta(cluster: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some("platform".into()),
            namespace: Some("tenant".into()),
            annotations: cluster.map(|c| {
                BTreeMap::from([(CLUSTER_ANNOTATION.to_string(), c.to_string())])
            }),
            ..Default::default()
        }
    }

    fn owner(kind: &str, controller: bool) -> OwnerReference {
        OwnerReference {
            api_version: "apis.kcp.dev/v1alpha1".into(),
            kind: kind.into(),
            name: "settings-binding".into(),
            uid: "uid-1".into(),
            controller: Some(controller),
            block_owner_deletion: Some(true),
        }
    }

    #[test]
    fn object_key_requires_cluster_annotation() {
        assert!(TriggerKey::for_object(&meta(None)).is_none());
        let key = TriggerKey::for_object(&meta(Some("root:org:ws"))).unwrap();
        assert_eq!(key.scope.as_str(), "root:org:ws");
        assert_eq!(key.namespace.as_deref(), Some("tenant"));
        assert_eq!(key.name, "platform");
    }

    #[test]
    fn owner_key_follows_controller_reference() {
        let mut m = meta(Some("root:ws"));
        m.owner_references =
            Some(vec![owner("ConfigMap", true), owner("APIBinding", true)]);
        let key = TriggerKey::for_owner(&m, "APIBinding").unwrap();
        assert_eq!(key.name, "settings-binding");
        assert_eq!(key.namespace, None);
        assert_eq!(key.to_string(), "root:ws|settings-binding");
    }

    #[test]
    fn owner_key_ignores_non_controller_owners() {
        let mut m = meta(Some("root:ws"));
        m.owner_references = Some(vec![owner("APIBinding", false)]);
        assert!(TriggerKey::for_owner(&m, "APIBinding").is_none());
    }

    #[test]
    fn filter_matches_export_name_and_path() {
        let filter = ScopeFilter {
            export_name: "settings-configuration.pipeline-service.io".into(),
            export_path: "root:pipelines".into(),
        };
        let binding = |name: &str, path: &str| {
            APIBinding::new(
                "b",
                APIBindingSpec {
                    reference: ExportReference {
                        workspace: Some(WorkspaceExportReference {
                            path: path.into(),
                            export_name: name.into(),
                        }),
                    },
                },
            )
        };
        assert!(filter.matches(&binding(
            "settings-configuration.pipeline-service.io",
            "root:pipelines"
        )));
        assert!(!filter.matches(&binding("other", "root:pipelines")));
        assert!(!filter.matches(&binding(
            "settings-configuration.pipeline-service.io",
            "root:elsewhere"
        )));
        assert!(!filter.matches(&APIBinding::new("b", APIBindingSpec::default())));
    }
}
