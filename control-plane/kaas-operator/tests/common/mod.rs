#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kaas_operator::controller::{
    KubernetesClusterConfigurationReconciler, KubernetesClusterReconciler,
    PipelineQueueReconciler, PipelineReconciler, ReconcilerOptions,
};
use kaas_operator::crd::{
    PhasedResource, Pipeline, PipelineClusterSpec, PipelinePhase, PipelineSpec,
};
use kaas_operator::store::{
    MemoryStore, ResourceStore, StoreError, StoreResult, StoredResource,
};
use kube::Resource;
use kube::api::ObjectMeta;

pub const NS: &str = "kaas-it";
pub const POLL: Duration = Duration::from_secs(10);

// DNS-1123 safe numeric suffix for unique names
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

/// Creation timestamp `offset_secs` after a fixed epoch, so queue order
/// does not depend on wall-clock resolution.
pub fn created_at(offset_secs: i64) -> Time {
    Time(
        Utc.timestamp_opt(1_750_000_000 + offset_secs, 0)
            .single()
            .expect("valid timestamp"),
    )
}

pub fn pipeline(name: &str, cluster: &str, offset_secs: i64) -> Pipeline {
    Pipeline {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NS.to_string()),
            creation_timestamp: Some(created_at(offset_secs)),
            ..Default::default()
        },
        spec: PipelineSpec {
            cluster: PipelineClusterSpec {
                name: cluster.to_string(),
                display_name: format!("{cluster} display"),
                description: format!("{cluster} description"),
            },
        },
        status: None,
    }
}

/// All four reconcilers sharing one store.
pub struct Harness<S> {
    pub store: Arc<S>,
    pub queue: PipelineQueueReconciler<S>,
    pub pipeline: PipelineReconciler<S>,
    pub cluster: KubernetesClusterReconciler<S>,
    pub configuration: KubernetesClusterConfigurationReconciler<S>,
}

impl Harness<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }
}

impl<S: ResourceStore + 'static> Harness<S> {
    pub fn with_store(store: Arc<S>) -> Self {
        Self::with_options(store, ReconcilerOptions::default())
    }

    pub fn with_options(store: Arc<S>, opts: ReconcilerOptions) -> Self {
        Self {
            queue: PipelineQueueReconciler::new(store.clone(), opts.clone()),
            pipeline: PipelineReconciler::new(store.clone(), opts.clone()),
            cluster: KubernetesClusterReconciler::new(store.clone(), opts.clone()),
            configuration: KubernetesClusterConfigurationReconciler::new(
                store.clone(),
                opts,
            ),
            store,
        }
    }

    pub async fn create<K: StoredResource>(&self, obj: &K) -> K {
        self.store.create(obj).await.expect("create")
    }

    pub async fn get<K: StoredResource>(&self, name: &str) -> Option<K> {
        self.store.get(NS, name).await.expect("get")
    }

    pub async fn must_get<K: StoredResource>(&self, name: &str) -> K {
        self.get(name).await.unwrap_or_else(|| panic!("{name} missing"))
    }

    /// Set the phase of a stored object the way an outside actor would.
    pub async fn force_phase<K: PhasedResource>(&self, name: &str, phase: K::Phase) {
        self.force_phase_in::<K>(NS, name, phase).await
    }

    pub async fn force_phase_in<K: PhasedResource>(
        &self,
        namespace: &str,
        name: &str,
        phase: K::Phase,
    ) {
        let obj: Option<K> = self.store.get(namespace, name).await.expect("get");
        let mut obj = obj.unwrap_or_else(|| panic!("{namespace}/{name} missing"));
        obj.phase_status_mut().phase = Some(phase);
        self.store.update_status(&obj).await.expect("force phase");
    }

    pub async fn resource_version<K: StoredResource>(&self, name: &str) -> String {
        let obj: K = self.must_get(name).await;
        obj.meta().resource_version.clone().unwrap_or_default()
    }
}

/// Store wrapper that can be told to fail writes, for error propagation.
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_creates: AtomicBool,
    pub conflict_status: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_creates: AtomicBool::new(false),
            conflict_status: AtomicBool::new(false),
        }
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Reject every status write as if another writer got there first.
    pub fn conflict_status(&self, conflict: bool) {
        self.conflict_status.store(conflict, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceStore for FlakyStore {
    async fn get<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<K>> {
        self.inner.get(namespace, name).await
    }

    async fn list<K: StoredResource>(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<K>> {
        self.inner.list(namespace).await
    }

    async fn create<K: StoredResource>(&self, obj: &K) -> StoreResult<K> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Invalid("injected create failure".into()));
        }
        self.inner.create(obj).await
    }

    async fn update_status<K: StoredResource>(
        &self,
        obj: &K,
    ) -> StoreResult<K> {
        if self.conflict_status.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict {
                kind: K::kind(&()).into_owned(),
                namespace: obj.meta().namespace.clone().unwrap_or_default(),
                name: obj.meta().name.clone().unwrap_or_default(),
                message: "injected conflict".into(),
            });
        }
        self.inner.update_status(obj).await
    }
}

/// Store wrapper that promotes a peer Pipeline to Running right after the
/// next Pipeline listing, so the listing the caller holds is already stale.
pub struct RacingStore {
    pub inner: MemoryStore,
    promote_after_list: Mutex<Option<String>>,
}

impl RacingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            promote_after_list: Mutex::new(None),
        }
    }

    pub fn promote_after_next_list(&self, peer: &str) {
        *self.promote_after_list.lock().unwrap() = Some(peer.to_string());
    }
}

#[async_trait]
impl ResourceStore for RacingStore {
    async fn get<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Option<K>> {
        self.inner.get(namespace, name).await
    }

    async fn list<K: StoredResource>(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<K>> {
        let listed = self.inner.list(namespace).await?;
        if K::kind(&()) != Pipeline::kind(&()) {
            return Ok(listed);
        }
        let peer = self.promote_after_list.lock().unwrap().take();
        if let Some(peer) = peer {
            let found: Option<Pipeline> = self.inner.get(namespace, &peer).await?;
            let mut found = found.unwrap_or_else(|| panic!("{peer} missing"));
            found.phase_status_mut().phase = Some(PipelinePhase::Running);
            self.inner.update_status(&found).await?;
        }
        Ok(listed)
    }

    async fn create<K: StoredResource>(&self, obj: &K) -> StoreResult<K> {
        self.inner.create(obj).await
    }

    async fn update_status<K: StoredResource>(
        &self,
        obj: &K,
    ) -> StoreResult<K> {
        self.inner.update_status(obj).await
    }
}

pub fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
