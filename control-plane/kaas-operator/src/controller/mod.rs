//! Reconcilers for the KaaS resource kinds.
//!
//! Every reconciler implements [`Reconcile`]: it is handed the key of the
//! object that changed, re-reads the object from the [`ResourceStore`] and
//! decides the next step from stored state alone. The kube runtime calls it
//! through [`reconcile`] and [`error_policy`].

mod kubernetes_cluster;
mod kubernetes_cluster_configuration;
mod pipeline;
mod queue;
mod status;

use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::crd::PhasedResource;
use crate::store::{ResourceStore, StoreError, StoredResource};

pub use kubernetes_cluster::KubernetesClusterReconciler;
pub use kubernetes_cluster_configuration::{
    KubernetesClusterConfigurationReconciler, config_payload_name,
};
pub use pipeline::PipelineReconciler;
pub use queue::{PipelineQueueReconciler, blocks_admission};
pub use status::StatusUpdater;

/// Requeue delay after a resourceVersion conflict. Conflicts resolve on a
/// fresh read, so they are retried sooner than other failures.
pub const CONFLICT_REQUEUE: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReconcileErr {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }
}

pub(crate) fn into_internal<E: std::fmt::Display>(e: E) -> ReconcileErr {
    ReconcileErr::Internal(e.to_string())
}

/// Outcome of waiting on a dependent resource.
#[derive(Debug, PartialEq)]
pub(crate) enum Dependent {
    /// The dependent exists and reached the awaited phase.
    Ready,
    /// The dependent was just created or has not reached the awaited phase.
    Waiting,
}

/// Get-or-create a dependent object and report whether it reached `ready`.
///
/// A create that loses the race against another writer counts as created;
/// the next pass reads the winner's object.
pub(crate) async fn ensure_dependent<S, K>(
    store: &S,
    namespace: &str,
    name: &str,
    build: impl FnOnce() -> K + Send,
    ready: K::Phase,
) -> Result<Dependent, ReconcileErr>
where
    S: ResourceStore,
    K: PhasedResource,
{
    let kind = K::kind(&());
    let existing: Option<K> = store.get(namespace, name).await?;
    let Some(existing) = existing else {
        match store.create(&build()).await {
            Ok(_) => info!(%kind, %name, "created"),
            Err(e) if e.is_already_exists() => {
                debug!(%kind, %name, "created concurrently")
            }
            Err(e) => return Err(e.into()),
        }
        return Ok(Dependent::Waiting);
    };
    let phase = existing.phase();
    if phase != ready {
        debug!(%kind, %name, %phase, "waiting for {ready}");
        return Ok(Dependent::Waiting);
    }
    Ok(Dependent::Ready)
}

/// Settings shared by every reconciler.
#[derive(Clone, Debug)]
pub struct ReconcilerOptions {
    /// Delay for every "not ready yet" requeue.
    pub polling_interval: Duration,
    /// Delay before retrying a reconcile that failed with a non-conflict
    /// error.
    pub error_backoff: Duration,
    /// Re-list peers right before promoting a Pipeline to Running.
    pub admission_recheck: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(10),
            error_backoff: Duration::from_secs(30),
            admission_recheck: true,
        }
    }
}

#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    type Object: StoredResource;

    /// Name used in logs and for controller selection.
    const NAME: &'static str;

    async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Action, ReconcileErr>;

    fn options(&self) -> &ReconcilerOptions;
}

/// Entry point handed to `kube::runtime::Controller::run`.
pub async fn reconcile<R: Reconcile>(
    obj: Arc<R::Object>,
    ctx: Arc<R>,
) -> Result<Action, ReconcileErr> {
    let ns = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();
    ctx.reconcile(&ns, &name).await
}

pub fn error_policy<R: Reconcile>(
    obj: Arc<R::Object>,
    error: &ReconcileErr,
    ctx: Arc<R>,
) -> Action {
    let delay = if error.is_conflict() {
        CONFLICT_REQUEUE
    } else {
        ctx.options().error_backoff
    };
    warn!(
        controller = R::NAME,
        namespace = obj.namespace().as_deref().unwrap_or_default(),
        name = %obj.name_any(),
        error = %error,
        retry_in = ?delay,
        "reconcile failed"
    );
    Action::requeue(delay)
}
