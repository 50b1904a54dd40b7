use async_trait::async_trait;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, Resource};
use tracing::trace;

use super::{
    ResourceStore, StoreError, StoreResult, StoredResource, object_key,
};

/// [`ResourceStore`] backed by the Kubernetes API server. Reads go straight
/// to the API server, not through a watch cache.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K: StoredResource>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<K>> {
        trace!(kind = %K::kind(&()), %namespace, %name, "store: get");
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn list<K: StoredResource>(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<K>> {
        trace!(kind = %K::kind(&()), %namespace, "store: list");
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn create<K: StoredResource>(&self, obj: &K) -> StoreResult<K> {
        let (namespace, name) = object_key(obj)?;
        trace!(kind = %K::kind(&()), %namespace, %name, "store: create");
        self.api::<K>(&namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| {
                if is_conflict(&e) {
                    StoreError::AlreadyExists {
                        kind: K::kind(&()).into_owned(),
                        namespace,
                        name,
                    }
                } else {
                    e.into()
                }
            })
    }

    async fn update_status<K: StoredResource>(
        &self,
        obj: &K,
    ) -> StoreResult<K> {
        let (namespace, name) = object_key(obj)?;
        trace!(
            kind = %K::kind(&()),
            %namespace,
            %name,
            resource_version = ?obj.meta().resource_version,
            "store: update status"
        );
        // The body carries metadata.resourceVersion, so the API server
        // rejects the write with 409 if the object moved on.
        let body = serde_json::to_vec(obj)?;
        self.api::<K>(&namespace)
            .replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|e| match e {
                kube::Error::Api(ae) if ae.code == 409 => {
                    StoreError::Conflict {
                        kind: K::kind(&()).into_owned(),
                        namespace,
                        name,
                        message: ae.message,
                    }
                }
                e => e.into(),
            })
    }
}
