//! Access to the resource store the reconcilers read and write.
//!
//! Reconcilers only talk to a [`ResourceStore`]: [`KubeStore`] backs it with
//! the Kubernetes API server, [`MemoryStore`] with an in-process map that
//! mimics the API server's concurrency rules.

mod api;
mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{Serialize, de::DeserializeOwned};

pub use self::api::KubeStore;
pub use self::memory::MemoryStore;

/// Namespaced, serializable resource that can live in a [`ResourceStore`].
pub trait StoredResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> StoredResource for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The object changed since it was read; retry with a fresh read.
    #[error("conflict updating {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },

    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch one object; `Ok(None)` when it does not exist.
    async fn get<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<K>>;

    async fn list<K: StoredResource>(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<K>>;

    /// Create an object. Fails with [`StoreError::AlreadyExists`] when an
    /// object with the same name is already present.
    async fn create<K: StoredResource>(&self, obj: &K) -> StoreResult<K>;

    /// Replace the status of an object. Fails with
    /// [`StoreError::Conflict`] when the stored resource version has moved
    /// past the one carried by `obj`.
    async fn update_status<K: StoredResource>(&self, obj: &K)
    -> StoreResult<K>;
}

pub(crate) fn object_key<K: StoredResource>(
    obj: &K,
) -> StoreResult<(String, String)> {
    let meta = obj.meta();
    let name = meta.name.clone().ok_or_else(|| {
        StoreError::Invalid(format!("{} without metadata.name", K::kind(&())))
    })?;
    let namespace = meta.namespace.clone().ok_or_else(|| {
        StoreError::Invalid(format!(
            "{} {} without metadata.namespace",
            K::kind(&()),
            name
        ))
    })?;
    Ok((namespace, name))
}
