use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::Value;
use tracing::{instrument, trace};

use super::{FIELD_MANAGER, ObjectKey, Store, StoreResult};
use crate::scope::{Scope, ScopeRouter};

/// [`Store`] backed by the Kubernetes API, one client per logical cluster.
#[derive(Clone)]
pub struct KubeStore {
    router: ScopeRouter,
}

impl KubeStore {
    pub fn new(router: ScopeRouter) -> Self {
        Self { router }
    }

    async fn api(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        namespace: Option<&str>,
    ) -> StoreResult<Api<DynamicObject>> {
        let client = self.router.client_for(scope).await?;
        Ok(match namespace {
            Some(ns) => Api::namespaced_with(client, ns, kind),
            None => Api::all_with(client, kind),
        })
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Store for KubeStore {
    #[instrument(level = "trace", skip_all, fields(scope = %scope, kind = %kind.kind, name = %key.name))]
    async fn get(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
    ) -> StoreResult<Option<DynamicObject>> {
        let api = self.api(scope, kind, key.namespace.as_deref()).await?;
        let obj = api.get_opt(&key.name).await?;
        trace!(found = obj.is_some(), "get");
        Ok(obj)
    }

    #[instrument(level = "trace", skip_all, fields(scope = %scope, kind = %kind.kind))]
    async fn list(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<DynamicObject>> {
        let api = self.api(scope, kind, namespace).await?;
        Ok(api.list(&ListParams::default()).await?.items)
    }

    #[instrument(level = "trace", skip_all, fields(scope = %scope, kind = %kind.kind))]
    async fn create(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        obj: &DynamicObject,
    ) -> StoreResult<DynamicObject> {
        let api = self
            .api(scope, kind, obj.metadata.namespace.as_deref())
            .await?;
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.into()),
            ..Default::default()
        };
        Ok(api.create(&pp, obj).await?)
    }

    #[instrument(level = "trace", skip_all, fields(scope = %scope, kind = %kind.kind, name = %key.name))]
    async fn patch(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
        patch: &Value,
    ) -> StoreResult<DynamicObject> {
        let api = self.api(scope, kind, key.namespace.as_deref()).await?;
        Ok(api
            .patch(&key.name, &Self::patch_params(), &Patch::Merge(patch))
            .await?)
    }

    #[instrument(level = "trace", skip_all, fields(scope = %scope, kind = %kind.kind, name = %key.name))]
    async fn patch_status(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
        patch: &Value,
    ) -> StoreResult<DynamicObject> {
        let api = self.api(scope, kind, key.namespace.as_deref()).await?;
        Ok(api
            .patch_status(&key.name, &Self::patch_params(), &Patch::Merge(patch))
            .await?)
    }

    async fn release(&self, scope: &Scope) {
        self.router.forget(scope).await;
    }
}
