use std::sync::Arc;

use async_trait::async_trait;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument, warn};

use super::{Reconcile, ReconcileErr, ReconcilerOptions, StatusUpdater};
use crate::crd::{
    Condition, KubernetesCluster, KubernetesClusterPhase, PhasedResource,
};
use crate::store::ResourceStore;

/// Moves a KubernetesCluster from `Unknown` through `Creating` to `Running`.
/// No infrastructure is provisioned; `Creating` completes on the next pass.
pub struct KubernetesClusterReconciler<S> {
    store: Arc<S>,
    status: StatusUpdater<S>,
    opts: ReconcilerOptions,
}

impl<S: ResourceStore> KubernetesClusterReconciler<S> {
    pub fn new(store: Arc<S>, opts: ReconcilerOptions) -> Self {
        Self {
            status: StatusUpdater::new(store.clone()),
            store,
            opts,
        }
    }
}

#[async_trait]
impl<S: ResourceStore + 'static> Reconcile for KubernetesClusterReconciler<S> {
    type Object = KubernetesCluster;

    const NAME: &'static str = "kubernetescluster";

    #[instrument(name = "kubernetescluster", skip(self))]
    async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Action, ReconcileErr> {
        let kc: Option<KubernetesCluster> =
            self.store.get(namespace, name).await?;
        let Some(kc) = kc else {
            debug!("kubernetescluster is gone");
            return Ok(Action::await_change());
        };

        match kc.phase() {
            KubernetesClusterPhase::Unknown => {
                self.status
                    .update(
                        &kc,
                        KubernetesClusterPhase::Creating,
                        Condition::ready(
                            "KubernetesClusterInitializing",
                            "KubernetesCluster is initializing",
                        ),
                    )
                    .await?;
                info!("kubernetescluster creating");
                Ok(Action::requeue(self.opts.polling_interval))
            }
            KubernetesClusterPhase::Creating => {
                self.status
                    .update(
                        &kc,
                        KubernetesClusterPhase::Running,
                        Condition::ready(
                            "KubernetesClusterCreated",
                            "KubernetesCluster is successfully created",
                        ),
                    )
                    .await?;
                info!("kubernetescluster running");
                Ok(Action::await_change())
            }
            KubernetesClusterPhase::Running => Ok(Action::await_change()),
            KubernetesClusterPhase::Deleting => {
                warn!("deletion is not implemented");
                Ok(Action::requeue(self.opts.polling_interval))
            }
        }
    }

    fn options(&self) -> &ReconcilerOptions {
        &self.opts
    }
}
