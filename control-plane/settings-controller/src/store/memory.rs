//! In-process [`Store`] used by tests and local dry runs.
//!
//! Objects are kept per (kind, scope, namespace, name). Every call is
//! recorded so callers can assert on read and write traffic, and writes for
//! a kind can be made to fail on demand.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use kube::Resource;
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use super::{
    ObjectKey, Store, StoreError, StoreResult, api_resource, from_dynamic, to_dynamic,
};
use crate::scope::Scope;

type Slot = (String, Scope, Option<String>, String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Patch,
    PatchStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    pub op: WriteOp,
    pub kind: String,
    pub scope: Scope,
    pub name: String,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Slot, DynamicObject>,
    failures: HashMap<String, String>,
    reads: usize,
    writes: Vec<WriteRecord>,
    released: Vec<Scope>,
    next_uid: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn kind_id(kind: &ApiResource) -> String {
    format!("{}/{}", kind.api_version, kind.plural)
}

fn slot(scope: &Scope, kind: &ApiResource, key: &ObjectKey) -> Slot {
    (
        kind_id(kind),
        scope.clone(),
        key.namespace.clone(),
        key.name.clone(),
    )
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a typed object without recording a write. Returns the stored
    /// copy, with uid and resourceVersion filled in.
    pub fn insert<K>(&self, scope: &Scope, obj: &K) -> StoreResult<K>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let kind = api_resource::<K>();
        let mut dynamic = to_dynamic(obj)?;
        let key = ObjectKey {
            namespace: dynamic.metadata.namespace.clone(),
            name: dynamic.metadata.name.clone().unwrap_or_default(),
        };
        let mut inner = self.lock();
        inner.stamp(&mut dynamic);
        inner
            .objects
            .insert(slot(scope, &kind, &key), dynamic.clone());
        drop(inner);
        from_dynamic(dynamic)
    }

    /// Current stored copy, without counting a read.
    pub fn peek<K>(&self, scope: &Scope, key: &ObjectKey) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let kind = api_resource::<K>();
        let obj = self.lock().objects.get(&slot(scope, &kind, key)).cloned()?;
        from_dynamic(obj).ok()
    }

    /// Make every write for `kind` fail with `message` until cleared.
    pub fn fail_writes(&self, kind: &ApiResource, message: &str) {
        self.lock().failures.insert(kind_id(kind), message.into());
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Scopes handed to [`Store::release`], in call order.
    pub fn released(&self) -> Vec<Scope> {
        self.lock().released.clone()
    }

    pub fn reset_counters(&self) {
        let mut inner = self.lock();
        inner.reads = 0;
        inner.writes.clear();
    }
}

impl Inner {
    fn stamp(&mut self, obj: &mut DynamicObject) {
        self.next_uid += 1;
        obj.metadata.uid.get_or_insert_with(|| format!("uid-{}", self.next_uid));
        obj.metadata.resource_version = Some("1".into());
    }

    fn record(
        &mut self,
        op: WriteOp,
        scope: &Scope,
        kind: &ApiResource,
        name: &str,
    ) -> StoreResult<()> {
        self.writes.push(WriteRecord {
            op,
            kind: kind.kind.clone(),
            scope: scope.clone(),
            name: name.into(),
        });
        match self.failures.get(&kind_id(kind)) {
            Some(msg) => Err(StoreError::Rejected(msg.clone())),
            None => Ok(()),
        }
    }

    fn merge(
        &mut self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
        patch: &Value,
    ) -> StoreResult<DynamicObject> {
        let current = self
            .objects
            .get(&slot(scope, kind, key))
            .cloned()
            .ok_or_else(|| {
                StoreError::Rejected(format!("{} {:?} not found", kind.kind, key.name))
            })?;
        let mut value = serde_json::to_value(current)?;
        json_patch::merge(&mut value, patch);
        let mut obj: DynamicObject = serde_json::from_value(value)?;
        let rv = obj
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        obj.metadata.resource_version = Some((rv + 1).to_string());
        self.objects.insert(slot(scope, kind, key), obj.clone());
        Ok(obj)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
    ) -> StoreResult<Option<DynamicObject>> {
        let mut inner = self.lock();
        inner.reads += 1;
        Ok(inner.objects.get(&slot(scope, kind, key)).cloned())
    }

    async fn list(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<DynamicObject>> {
        let mut inner = self.lock();
        inner.reads += 1;
        let id = kind_id(kind);
        Ok(inner
            .objects
            .iter()
            .filter(|((k, s, ns, _), _)| {
                *k == id
                    && s == scope
                    && namespace.is_none_or(|want| ns.as_deref() == Some(want))
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        obj: &DynamicObject,
    ) -> StoreResult<DynamicObject> {
        let key = ObjectKey {
            namespace: obj.metadata.namespace.clone(),
            name: obj.metadata.name.clone().unwrap_or_default(),
        };
        let mut inner = self.lock();
        inner.record(WriteOp::Create, scope, kind, &key.name)?;
        if inner.objects.contains_key(&slot(scope, kind, &key)) {
            return Err(StoreError::Rejected(format!(
                "{} {:?} already exists",
                kind.kind, key.name
            )));
        }
        let mut stored = obj.clone();
        stored.types = Some(kube::core::TypeMeta {
            api_version: kind.api_version.clone(),
            kind: kind.kind.clone(),
        });
        inner.stamp(&mut stored);
        inner.objects.insert(slot(scope, kind, &key), stored.clone());
        Ok(stored)
    }

    async fn patch(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
        patch: &Value,
    ) -> StoreResult<DynamicObject> {
        let mut inner = self.lock();
        inner.record(WriteOp::Patch, scope, kind, &key.name)?;
        // status is only writable through the subresource
        let mut patch = patch.clone();
        if let Value::Object(map) = &mut patch {
            map.remove("status");
        }
        inner.merge(scope, kind, key, &patch)
    }

    async fn patch_status(
        &self,
        scope: &Scope,
        kind: &ApiResource,
        key: &ObjectKey,
        patch: &Value,
    ) -> StoreResult<DynamicObject> {
        let mut inner = self.lock();
        inner.record(WriteOp::PatchStatus, scope, kind, &key.name)?;
        let status = patch.get("status").cloned().unwrap_or(Value::Null);
        inner.merge(scope, kind, key, &json!({ "status": status }))
    }

    async fn release(&self, scope: &Scope) {
        self.lock().released.push(scope.clone());
    }
}
