use k8s_openapi::api::core::v1::Namespace;
use kube::Resource;
use kube::core::ObjectMeta;
use tracing::{debug, info, instrument, trace, warn};

use super::children::{ChildKind, sync_child};
use super::conditions::merge_all;
use super::{ControllerContext, Outcome, ReconcileErr};
use crate::crd::api_binding::APIBinding;
use crate::crd::settings::{Settings, SettingsSpec};
use crate::scope::TriggerKey;
use crate::store::{
    ObjectKey, StoreError, create_typed, get_typed, patch_status_from,
};

/// Well-known name of the per-workspace Settings object.
pub const SETTINGS_NAME: &str = "pipeline-service";

/// One reconciliation pass for the APIBinding named by `trigger`.
///
/// Prerequisites (Settings, baseline conditions, namespace) are created one
/// per pass with an immediate requeue, so children are only synchronized
/// once all of them exist. Every child kind is attempted even when an
/// earlier one fails; the first failure is returned after status has been
/// written.
#[instrument(skip_all, fields(scope = %trigger.scope, name = %trigger.name))]
pub async fn reconcile(
    trigger: &TriggerKey,
    ctx: &ControllerContext,
) -> Result<Outcome, ReconcileErr> {
    let store = ctx.store.as_ref();
    let scope = &trigger.scope;
    debug!("reconcile: starting");

    let Some(binding) =
        get_typed::<APIBinding>(store, scope, &trigger.object_key()).await?
    else {
        // deleted; children go away through owner references
        debug!("reconcile: APIBinding not found");
        store.release(scope).await;
        return Ok(Outcome::Continue);
    };

    if let Some(filter) = ctx.scope_filter.as_ref() {
        if !filter.matches(&binding) {
            trace!("reconcile: APIBinding excluded");
            return Ok(Outcome::Continue);
        }
    }

    let owner = binding.controller_owner_ref(&()).ok_or_else(|| {
        ReconcileErr::Internal(format!("APIBinding {} has no uid", trigger.name))
    })?;

    let settings_key = ObjectKey {
        namespace: trigger.namespace.clone(),
        name: SETTINGS_NAME.into(),
    };
    let Some(settings) = get_typed::<Settings>(store, scope, &settings_key).await?
    else {
        let mut settings = Settings::new(SETTINGS_NAME, SettingsSpec::default());
        settings.metadata.namespace = settings_key.namespace.clone();
        settings.metadata.owner_references = Some(vec![owner]);
        create_typed(store, scope, &settings)
            .await
            .inspect_err(|e| warn!(error = %e, "reconcile: unable to create Settings"))?;
        info!("reconcile: Settings created");
        return Ok(Outcome::Requeue);
    };

    let has_conditions = settings
        .status
        .as_ref()
        .is_some_and(|s| !s.conditions.is_empty());
    if !has_conditions {
        let mut seeded = settings.clone();
        seeded.status.get_or_insert_with(Default::default).conditions =
            ChildKind::ALL.iter().map(|k| k.baseline_condition()).collect();
        patch_status_from(store, scope, &settings_key, &settings, &seeded)
            .await
            .inspect_err(|e| warn!(error = %e, "reconcile: unable to seed conditions"))?;
        info!("reconcile: baseline conditions seeded");
        return Ok(Outcome::Requeue);
    }

    let ns_name = ctx.settings.namespace.as_str();
    if get_typed::<Namespace>(store, scope, &ObjectKey::cluster(ns_name))
        .await?
        .is_none()
    {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(ns_name.to_string()),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            ..Default::default()
        };
        create_typed(store, scope, &ns)
            .await
            .inspect_err(|e| warn!(error = %e, namespace = ns_name, "reconcile: unable to create namespace"))?;
        info!(namespace = ns_name, "reconcile: namespace created");
        return Ok(Outcome::Requeue);
    }

    // `settings` stays untouched from here on: it is the merge base for the
    // status patch below.
    let mut first_err: Option<StoreError> = None;
    let mut observed = Vec::with_capacity(ChildKind::ALL.len());
    for kind in ChildKind::ALL {
        let outcome = sync_child(store, scope, kind, &ctx.settings, &owner).await;
        observed.push(outcome.condition);
        if let Err(e) = outcome.result {
            first_err.get_or_insert(e);
        }
    }

    let mut updated = settings.clone();
    let conditions = &mut updated.status.get_or_insert_with(Default::default).conditions;
    if merge_all(conditions, observed) {
        trace!("reconcile: conditions changed; patching status");
        if let Err(e) =
            patch_status_from(store, scope, &settings_key, &settings, &updated).await
        {
            warn!(error = %e, "reconcile: status patch failed");
            if first_err.is_none() {
                return Err(e.into());
            }
        }
    } else {
        trace!("reconcile: conditions unchanged; skipping status patch");
    }

    match first_err {
        Some(e) => Err(e.into()),
        None => {
            debug!("reconcile: children in sync");
            Ok(Outcome::Continue)
        }
    }
}
