use settings_controller::controller::{Outcome, widget::reconcile_widget};
use settings_controller::crd::widget::{Widget, WidgetSpec, WidgetStatus};
use settings_controller::scope::{Scope, TriggerKey};
use settings_controller::store::{MemoryStore, ObjectKey, memory::WriteOp};

fn widget(ns: &str, name: &str) -> Widget {
    let mut w = Widget::new(name, WidgetSpec::default());
    w.metadata.namespace = Some(ns.into());
    w
}

fn total(store: &MemoryStore, scope: &Scope, ns: &str, name: &str) -> Option<i64> {
    store
        .peek::<Widget>(scope, &ObjectKey::namespaced(ns, name))
        .and_then(|w| w.status)
        .map(|s| s.total)
}

#[test_log::test(tokio::test)]
async fn total_counts_widgets_in_the_workspace() {
    let store = MemoryStore::new();
    let scope = Scope::new("root:tenant-a");
    let other = Scope::new("root:tenant-b");
    store.insert(&scope, &widget("default", "w1")).unwrap();
    store.insert(&scope, &widget("team", "w2")).unwrap();
    store.insert(&other, &widget("default", "w3")).unwrap();

    let trigger = TriggerKey::new(scope.clone(), Some("default".into()), "w1");
    let out = reconcile_widget(&trigger, &store).await.unwrap();
    assert_eq!(out, Outcome::Continue);
    assert_eq!(total(&store, &scope, "default", "w1"), Some(2));

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].op, WriteOp::PatchStatus);
}

#[test_log::test(tokio::test)]
async fn correct_total_is_left_alone() {
    let store = MemoryStore::new();
    let scope = Scope::new("root:tenant-a");
    let mut w = widget("default", "w1");
    w.status = Some(WidgetStatus { total: 1 });
    store.insert(&scope, &w).unwrap();

    let trigger = TriggerKey::new(scope, Some("default".into()), "w1");
    let out = reconcile_widget(&trigger, &store).await.unwrap();
    assert_eq!(out, Outcome::Continue);
    assert_eq!(store.write_count(), 0);
}

#[test_log::test(tokio::test)]
async fn deleted_widget_is_ignored() {
    let store = MemoryStore::new();
    let trigger = TriggerKey::new(Scope::new("root:tenant-a"), Some("default".into()), "gone");
    let out = reconcile_widget(&trigger, &store).await.unwrap();
    assert_eq!(out, Outcome::Continue);
    assert_eq!(store.write_count(), 0);
}

#[test_log::test(tokio::test)]
async fn stale_total_is_corrected_without_touching_spec() {
    let store = MemoryStore::new();
    let scope = Scope::new("root:tenant-a");
    let mut w = widget("default", "w1");
    w.spec.foo = Some("bar".into());
    w.status = Some(WidgetStatus { total: 5 });
    store.insert(&scope, &w).unwrap();

    let trigger = TriggerKey::new(scope.clone(), Some("default".into()), "w1");
    reconcile_widget(&trigger, &store).await.unwrap();

    let stored = store
        .peek::<Widget>(&scope, &ObjectKey::namespaced("default", "w1"))
        .unwrap();
    assert_eq!(stored.status, Some(WidgetStatus { total: 1 }));
    assert_eq!(stored.spec.foo.as_deref(), Some("bar"));
    assert_eq!(store.write_count(), 1);
}
