#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::ResourceQuotaSpec;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use settings_controller::config::{NetworkPolicyConfig, QuotaConfig, SettingsConfig};
use settings_controller::controller::{ControllerContext, Outcome, reconcile};
use settings_controller::crd::api_binding::{
    APIBinding, APIBindingSpec, ExportReference, WorkspaceExportReference,
};
use settings_controller::crd::settings::Settings;
use settings_controller::scope::{CLUSTER_ANNOTATION, Scope, ScopeFilter, TriggerKey};
use settings_controller::store::{MemoryStore, ObjectKey};

pub const EXPORT_NAME: &str = "pipeline-service";
pub const EXPORT_PATH: &str = "root:plane:service-provider";
pub const TENANT_NS: &str = "pipeline-service";

pub fn binding(scope: &Scope, name: &str, export_name: &str, path: &str) -> APIBinding {
    let mut b = APIBinding::new(
        name,
        APIBindingSpec {
            reference: ExportReference {
                workspace: Some(WorkspaceExportReference {
                    path: path.into(),
                    export_name: export_name.into(),
                }),
            },
        },
    );
    b.metadata.annotations = Some(BTreeMap::from([(
        CLUSTER_ANNOTATION.to_string(),
        scope.to_string(),
    )]));
    b
}

pub fn settings_config() -> SettingsConfig {
    SettingsConfig {
        namespace: TENANT_NS.into(),
        network_policy_config: NetworkPolicyConfig::default(),
        quota_config: QuotaConfig {
            name: "platform".into(),
            spec: ResourceQuotaSpec {
                hard: Some(BTreeMap::from([(
                    "pods".to_string(),
                    Quantity("10".into()),
                )])),
                ..Default::default()
            },
        },
    }
}

pub fn filter() -> ScopeFilter {
    ScopeFilter {
        export_name: EXPORT_NAME.into(),
        export_path: EXPORT_PATH.into(),
    }
}

pub fn context(
    store: Arc<MemoryStore>,
    cfg: SettingsConfig,
    filter: Option<ScopeFilter>,
) -> ControllerContext {
    ControllerContext::new(store, Arc::new(cfg), filter)
}

/// Seed a matching APIBinding in `scope` and return its trigger key.
pub fn seed_binding(store: &MemoryStore, scope: &Scope, name: &str) -> (APIBinding, TriggerKey) {
    let b = store
        .insert(scope, &binding(scope, name, EXPORT_NAME, EXPORT_PATH))
        .expect("seed binding");
    (b, TriggerKey::new(scope.clone(), None, name))
}

/// Reconcile until a pass returns Continue. Panics on error or when
/// the prerequisites do not settle within a few passes.
pub async fn converge(trigger: &TriggerKey, ctx: &ControllerContext) {
    for _ in 0..6 {
        match reconcile(trigger, ctx).await {
            Ok(Outcome::Continue) => return,
            Ok(Outcome::Requeue) => continue,
            Err(e) => panic!("reconcile failed: {e}"),
        }
    }
    panic!("reconcile did not converge for {trigger}");
}

pub fn settings_of(store: &MemoryStore, scope: &Scope) -> Settings {
    store
        .peek::<Settings>(scope, &ObjectKey::cluster("pipeline-service"))
        .expect("settings present")
}
