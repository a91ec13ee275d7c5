use tracing::{debug, info, instrument};

use super::{Outcome, ReconcileErr};
use crate::crd::widget::Widget;
use crate::scope::TriggerKey;
use crate::store::{Store, get_typed, list_typed, patch_status_from};

/// Keep `status.total` of a Widget equal to the number of widgets in its
/// workspace.
#[instrument(skip_all, fields(scope = %trigger.scope, name = %trigger.name))]
pub async fn reconcile_widget(
    trigger: &TriggerKey,
    store: &dyn Store,
) -> Result<Outcome, ReconcileErr> {
    let scope = &trigger.scope;
    let key = trigger.object_key();
    let Some(widget) = get_typed::<Widget>(store, scope, &key).await? else {
        return Ok(Outcome::Continue);
    };

    let total = list_typed::<Widget>(store, scope, None).await?.len() as i64;
    let current = widget.status.as_ref().map(|s| s.total).unwrap_or(0);
    if current == total {
        debug!(total, "widget: status already correct");
        return Ok(Outcome::Continue);
    }

    info!(total, "widget: patching status with workspace widget count");
    let mut updated = widget.clone();
    updated.status.get_or_insert_with(Default::default).total = total;
    patch_status_from(store, scope, &key, &widget, &updated).await?;
    Ok(Outcome::Continue)
}
