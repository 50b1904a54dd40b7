use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    ResourceStore, StoreError, StoreResult, StoredResource, object_key,
};

/// (kind, namespace, name)
type ObjectKey = (String, String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Value>,
    revision: u64,
}

impl Inner {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

/// In-process [`ResourceStore`] following the API server's rules: a global
/// revision stamped as `resourceVersion` on every write, uids and creation
/// timestamps assigned on create, any `.status` sent on create dropped,
/// status-only updates rejected on a stale `resourceVersion`, and
/// owner-reference garbage collection on delete.
///
/// A creation timestamp already present on a created object is kept, which
/// lets callers seed a deterministic queue order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete an object and, transitively, every object that lists it as
    /// an owner. Returns the number of objects removed.
    pub async fn delete<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        let key = (K::kind(&()).into_owned(), namespace.to_string(), name.to_string());
        let Some(obj) = inner.objects.remove(&key) else {
            return Err(not_found::<K>(namespace, name));
        };
        let mut removed = 1;
        let mut orphaned_uids: Vec<String> = uid_of(&obj).into_iter().collect();
        while let Some(uid) = orphaned_uids.pop() {
            let dependents: Vec<ObjectKey> = inner
                .objects
                .iter()
                .filter(|(_, v)| owned_by(v, &uid))
                .map(|(k, _)| k.clone())
                .collect();
            for dep in dependents {
                if let Some(v) = inner.objects.remove(&dep) {
                    removed += 1;
                    orphaned_uids.extend(uid_of(&v));
                }
            }
        }
        Ok(removed)
    }

    /// Number of stored objects of kind `K` across all namespaces.
    pub async fn count<K: StoredResource>(&self) -> usize {
        let kind = K::kind(&());
        self.inner
            .read()
            .await
            .objects
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }
}

fn not_found<K: StoredResource>(namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: K::kind(&()).into_owned(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn uid_of(v: &Value) -> Option<String> {
    v.pointer("/metadata/uid")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn owned_by(v: &Value, uid: &str) -> bool {
    v.pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .any(|r| r.get("uid").and_then(Value::as_str) == Some(uid))
        })
        .unwrap_or(false)
}

fn resource_version(v: &Value) -> Option<&str> {
    v.pointer("/metadata/resourceVersion").and_then(Value::as_str)
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<K>> {
        let inner = self.inner.read().await;
        let key = (K::kind(&()).into_owned(), namespace.to_string(), name.to_string());
        inner
            .objects
            .get(&key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Into::into)
    }

    async fn list<K: StoredResource>(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<K>> {
        let inner = self.inner.read().await;
        let kind = K::kind(&());
        inner
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(Into::into))
            .collect()
    }

    async fn create<K: StoredResource>(&self, obj: &K) -> StoreResult<K> {
        let (namespace, name) = object_key(obj)?;
        let mut inner = self.inner.write().await;
        let key = (K::kind(&()).into_owned(), namespace.clone(), name.clone());
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: key.0,
                namespace,
                name,
            });
        }

        let mut created = obj.clone();
        let revision = inner.next_revision();
        let meta = created.meta_mut();
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.resource_version = Some(revision);
        meta.generation = Some(1);
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = Some(Time(Utc::now()));
        }
        // Status is only written through update_status.
        let mut value = serde_json::to_value(&created)?;
        if let Value::Object(map) = &mut value {
            map.remove("status");
        }
        let created = serde_json::from_value(value.clone())?;
        inner.objects.insert(key, value);
        Ok(created)
    }

    async fn update_status<K: StoredResource>(
        &self,
        obj: &K,
    ) -> StoreResult<K> {
        let (namespace, name) = object_key(obj)?;
        let mut inner = self.inner.write().await;
        let key = (K::kind(&()).into_owned(), namespace.clone(), name.clone());
        let Some(stored) = inner.objects.get(&key) else {
            return Err(not_found::<K>(&namespace, &name));
        };

        let expected = obj.meta().resource_version.as_deref();
        let current = resource_version(stored);
        if expected != current {
            return Err(StoreError::Conflict {
                kind: key.0,
                namespace,
                name,
                message: format!(
                    "resourceVersion {} is stale, stored is {}",
                    expected.unwrap_or("<none>"),
                    current.unwrap_or("<none>")
                ),
            });
        }

        // Status subresource semantics: only `.status` is taken from the
        // caller, everything else stays as stored.
        let mut updated = stored.clone();
        let status = serde_json::to_value(obj)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        let revision = inner.next_revision();
        if let Value::Object(map) = &mut updated {
            map.insert("status".into(), status);
            if let Some(Value::Object(meta)) = map.get_mut("metadata") {
                meta.insert("resourceVersion".into(), Value::String(revision));
            }
        }
        let out = serde_json::from_value(updated.clone())?;
        inner.objects.insert(key, updated);
        Ok(out)
    }
}
