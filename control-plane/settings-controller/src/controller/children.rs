//! Managed child resources of a tenant workspace.
//!
//! Each [`ChildKind`] knows how to derive its desired state from the
//! operator configuration and how to report the outcome as a condition.
//! The reconciler iterates [`ChildKind::ALL`]; adding a kind means adding a
//! variant here.

use k8s_openapi::api::core::v1::ResourceQuota;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::discovery::ApiResource;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::config::SettingsConfig;
use crate::crd::settings::{Condition, ConditionStatus};
use crate::scope::Scope;
use crate::store::{
    ObjectKey, OperationResult, Store, StoreError, api_resource,
    create_or_update_spec,
};

pub const REASON_UNKNOWN: &str = "Unknown";
pub const REASON_ERROR: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    NetworkPolicy,
    ResourceQuota,
}

impl ChildKind {
    pub const ALL: [ChildKind; 2] = [ChildKind::NetworkPolicy, ChildKind::ResourceQuota];

    pub fn kind(self) -> &'static str {
        match self {
            ChildKind::NetworkPolicy => "NetworkPolicy",
            ChildKind::ResourceQuota => "ResourceQuota",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ChildKind::NetworkPolicy => "NetworkPolicies",
            ChildKind::ResourceQuota => "Quotas",
        }
    }

    pub fn condition_type(self) -> &'static str {
        match self {
            ChildKind::NetworkPolicy => "NetworkPoliciesReady",
            ChildKind::ResourceQuota => "QuotasReady",
        }
    }

    pub fn created_reason(self) -> String {
        format!("{}Created", self.label())
    }

    pub fn api_resource(self) -> ApiResource {
        match self {
            ChildKind::NetworkPolicy => api_resource::<NetworkPolicy>(),
            ChildKind::ResourceQuota => api_resource::<ResourceQuota>(),
        }
    }

    /// Target key and full spec payload for this kind.
    pub fn desired(self, cfg: &SettingsConfig) -> Result<(ObjectKey, Value), serde_json::Error> {
        match self {
            ChildKind::NetworkPolicy => {
                let mut spec = cfg.network_policy_config.spec.clone();
                if spec.policy_types.as_ref().is_none_or(|t| t.is_empty()) {
                    spec.policy_types = Some(vec!["Egress".into()]);
                }
                Ok((
                    ObjectKey::namespaced(&cfg.namespace, &cfg.network_policy_config.name),
                    serde_json::to_value(spec)?,
                ))
            }
            ChildKind::ResourceQuota => Ok((
                ObjectKey::namespaced(&cfg.namespace, &cfg.quota_config.name),
                serde_json::to_value(&cfg.quota_config.spec)?,
            )),
        }
    }

    /// Placeholder condition seeded before any provisioning attempt.
    pub fn baseline_condition(self) -> Condition {
        Condition::new(
            self.condition_type(),
            ConditionStatus::Unknown,
            REASON_UNKNOWN,
            REASON_UNKNOWN,
        )
    }

    fn ready_condition(self, namespace: &str) -> Condition {
        Condition::new(
            self.condition_type(),
            ConditionStatus::True,
            self.created_reason(),
            format!("{} successfully created in {:?} namespace", self.label(), namespace),
        )
    }

    fn error_condition(self) -> Condition {
        Condition::new(
            self.condition_type(),
            ConditionStatus::False,
            REASON_ERROR,
            format!("Unable to create or patch the {}", self.kind()),
        )
    }
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub kind: ChildKind,
    pub condition: Condition,
    pub result: Result<OperationResult, StoreError>,
}

/// Converge one child onto its configured spec. Never retries; a failed
/// write surfaces as a False condition plus the untouched store error.
#[instrument(skip_all, fields(scope = %scope, kind = kind.kind()))]
pub async fn sync_child(
    store: &dyn Store,
    scope: &Scope,
    kind: ChildKind,
    cfg: &SettingsConfig,
    owner: &OwnerReference,
) -> SyncOutcome {
    let result = match kind.desired(cfg) {
        Ok((key, spec)) => {
            create_or_update_spec(store, scope, &kind.api_resource(), &key, owner, &spec)
                .await
        }
        Err(e) => Err(StoreError::from(e)),
    };
    let condition = match &result {
        Ok(op) => {
            debug!(result = op.as_str(), "child synchronized");
            kind.ready_condition(&cfg.namespace)
        }
        Err(e) => {
            error!(error = %e, "unable to create or patch the {}", kind.kind());
            kind.error_condition()
        }
    };
    SyncOutcome {
        kind,
        condition,
        result,
    }
}
