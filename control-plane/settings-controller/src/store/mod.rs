//! Declarative store access.
//!
//! The [`Store`] trait is the only way reconcilers touch cluster state. It
//! works on [`DynamicObject`]s addressed by an explicit [`Scope`], a kind
//! descriptor and an [`ObjectKey`]; the typed helpers below convert to and
//! from concrete resource types.

pub mod client;
pub mod memory;
pub mod merge_patch;
pub mod semantic;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::scope::Scope;

pub use client::KubeStore;
pub use memory::MemoryStore;

pub const FIELD_MANAGER: &str = "settings-controller";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("client for cluster {0:?} unavailable: {1}")]
    Client(String, String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Namespace (when the kind is namespaced) and name within one scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(ns.into()),
            name: name.into(),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch one object; `Ok(None)` when it does not exist.
    async fn get(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
    ) -> StoreResult<Option<DynamicObject>>;

    /// List objects of a kind, across all namespaces when `namespace` is None.
    async fn list(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<DynamicObject>>;

    async fn create(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        obj: &DynamicObject,
    ) -> StoreResult<DynamicObject>;

    /// Apply a JSON merge patch to the main resource.
    async fn patch(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
        patch: &Value,
    ) -> StoreResult<DynamicObject>;

    /// Apply a JSON merge patch to the status subresource.
    async fn patch_status(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
        patch: &Value,
    ) -> StoreResult<DynamicObject>;

    /// Drop anything cached for `scope`, e.g. once its binding is gone.
    async fn release(&self, _scope: &Scope) {}
}

pub fn api_resource<K: Resource<DynamicType = ()>>() -> ApiResource {
    ApiResource::erase::<K>(&())
}

pub fn to_dynamic<K>(obj: &K) -> StoreResult<DynamicObject>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    let mut value = serde_json::to_value(obj)?;
    if let Value::Object(map) = &mut value {
        map.insert("apiVersion".into(), K::api_version(&()).into());
        map.insert("kind".into(), K::kind(&()).into());
    }
    Ok(serde_json::from_value(value)?)
}

pub fn from_dynamic<K>(obj: DynamicObject) -> StoreResult<K>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let mut value = serde_json::to_value(obj)?;
    // list items may come back without type meta
    if let Value::Object(map) = &mut value {
        map.entry("apiVersion")
            .or_insert_with(|| K::api_version(&()).into());
        map.entry("kind").or_insert_with(|| K::kind(&()).into());
    }
    Ok(serde_json::from_value(value)?)
}

pub async fn get_typed<K>(
    store: &dyn Store,
    scope: &Scope,
    key: &ObjectKey,
) -> StoreResult<Option<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    store
        .get(scope, &api_resource::<K>(), key)
        .await?
        .map(from_dynamic)
        .transpose()
}

pub async fn list_typed<K>(
    store: &dyn Store,
    scope: &Scope,
    namespace: Option<&str>,
) -> StoreResult<Vec<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    store
        .list(scope, &api_resource::<K>(), namespace)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}

pub async fn create_typed<K>(
    store: &dyn Store,
    scope: &Scope,
    obj: &K,
) -> StoreResult<K>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    let created = store
        .create(scope, &api_resource::<K>(), &to_dynamic(obj)?)
        .await?;
    from_dynamic(created)
}

/// Persist the status difference between `before` and `after` as a merge
/// patch. Returns false without calling the store when nothing differs.
pub async fn patch_status_from<K>(
    store: &dyn Store,
    scope: &Scope,
    key: &ObjectKey,
    before: &K,
    after: &K,
) -> StoreResult<bool>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    let patch = merge_patch::diff(
        &serde_json::to_value(before)?,
        &serde_json::to_value(after)?,
    );
    if merge_patch::is_empty(&patch) {
        return Ok(false);
    }
    store
        .patch_status(scope, &api_resource::<K>(), key, &patch)
        .await?;
    Ok(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

impl OperationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationResult::Created => "created",
            OperationResult::Updated => "updated",
            OperationResult::Unchanged => "unchanged",
        }
    }
}

/// Make the object at `key` carry exactly `spec`.
///
/// Absent objects are created with `owner` as their controller reference.
/// Existing objects are patched only when their `spec` subtree no longer
/// [`spec_matches`](semantic::spec_matches) the desired one; metadata and
/// any other fields are left alone.
pub async fn create_or_update_spec(
    store: &dyn Store,
    scope: &Scope,
    kind: &ApiResource,
    key: &ObjectKey,
    owner: &OwnerReference,
    spec: &Value,
) -> StoreResult<OperationResult> {
    match store.get(scope, kind, key).await? {
        None => {
            let mut obj = DynamicObject::new(&key.name, kind);
            obj.metadata.namespace = key.namespace.clone();
            obj.metadata.owner_references = Some(vec![owner.clone()]);
            obj.data = json!({ "spec": spec });
            store.create(scope, kind, &obj).await?;
            Ok(OperationResult::Created)
        }
        Some(current) => {
            let stored = current.data.get("spec").unwrap_or(&Value::Null);
            if semantic::spec_matches(stored, spec) {
                return Ok(OperationResult::Unchanged);
            }
            let patch = json!({ "spec": merge_patch::diff(stored, spec) });
            store.patch(scope, kind, key, &patch).await?;
            Ok(OperationResult::Updated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ResourceQuota;

    fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "apis.kcp.io/v1alpha1".into(),
            kind: "APIBinding".into(),
            name: "settings".into(),
            uid: "uid-1".into(),
            controller: Some(true),
            ..Default::default()
        }
    }

    fn quota(hard: Value) -> ResourceQuota {
        serde_json::from_value(json!({
            "metadata": {"name": "platform", "namespace": "pipeline-service"},
            "spec": {"hard": hard}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn canonicalised_spec_is_left_alone() {
        let store = MemoryStore::new();
        let scope = Scope::new("root:a");
        // what the server hands back after normalising "1000m" and "1024Mi"
        store
            .insert(&scope, &quota(json!({"requests.cpu": "1", "limits.memory": "1Gi"})))
            .unwrap();

        let result = create_or_update_spec(
            &store,
            &scope,
            &api_resource::<ResourceQuota>(),
            &ObjectKey::namespaced("pipeline-service", "platform"),
            &owner(),
            &json!({"hard": {"requests.cpu": "1000m", "limits.memory": "1024Mi"}}),
        )
        .await
        .unwrap();

        assert_eq!(result, OperationResult::Unchanged);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn changed_spec_is_patched_and_create_sets_owner() {
        let store = MemoryStore::new();
        let scope = Scope::new("root:a");
        let kind = api_resource::<ResourceQuota>();
        let key = ObjectKey::namespaced("pipeline-service", "platform");

        let created = create_or_update_spec(
            &store, &scope, &kind, &key, &owner(), &json!({"hard": {"pods": "10"}}),
        )
        .await
        .unwrap();
        assert_eq!(created, OperationResult::Created);

        let updated = create_or_update_spec(
            &store, &scope, &kind, &key, &owner(), &json!({"hard": {"pods": "20"}}),
        )
        .await
        .unwrap();
        assert_eq!(updated, OperationResult::Updated);

        let stored: ResourceQuota = store.peek(&scope, &key).unwrap();
        let hard = stored.spec.unwrap().hard.unwrap();
        assert_eq!(hard["pods"].0, "20");
        let refs = stored.metadata.owner_references.unwrap();
        assert_eq!(refs[0].uid, "uid-1");
    }
}
