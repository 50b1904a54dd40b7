use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument};

use super::{
    Dependent, Reconcile, ReconcileErr, ReconcilerOptions, StatusUpdater,
    ensure_dependent,
};
use crate::crd::kubernetes_cluster::{
    ANNOTATION_DESCRIPTION, ANNOTATION_DISPLAY_NAME,
};
use crate::crd::{
    ClusterOwnerRef, Condition, KubernetesCluster, KubernetesClusterConfiguration,
    KubernetesClusterConfigurationPhase, KubernetesClusterConfigurationSpec,
    KubernetesClusterPhase, KubernetesClusterSpec, PhasedResource, Pipeline,
    PipelinePhase,
};
use crate::store::ResourceStore;

pub(crate) const VALIDATION_FAILED_MESSAGE: &str =
    "KubernetesCluster name is not set in the Pipeline spec.";

/// Drives a Running Pipeline through its dependents: the KubernetesCluster
/// first, then its KubernetesClusterConfiguration. Each pass starts over from
/// the first step; progress lives only in the dependents' phases.
pub struct PipelineReconciler<S> {
    store: Arc<S>,
    status: StatusUpdater<S>,
    opts: ReconcilerOptions,
}

impl<S: ResourceStore> PipelineReconciler<S> {
    pub fn new(store: Arc<S>, opts: ReconcilerOptions) -> Self {
        Self {
            status: StatusUpdater::new(store.clone()),
            store,
            opts,
        }
    }

    async fn cascade(
        &self,
        namespace: &str,
        pipeline: &Pipeline,
    ) -> Result<Action, ReconcileErr> {
        let cluster = &pipeline.spec.cluster;
        if cluster.name.is_empty() {
            self.status
                .update(
                    pipeline,
                    PipelinePhase::Failed,
                    Condition::failed("ValidationFailed", VALIDATION_FAILED_MESSAGE),
                )
                .await?;
            info!("cluster name is empty; pipeline failed");
            return Ok(Action::await_change());
        }

        let kc = ensure_dependent(
            self.store.as_ref(),
            namespace,
            &cluster.name,
            || KubernetesCluster {
                metadata: ObjectMeta {
                    name: Some(cluster.name.clone()),
                    namespace: Some(namespace.to_string()),
                    annotations: Some(BTreeMap::from([
                        (
                            ANNOTATION_DISPLAY_NAME.to_string(),
                            cluster.display_name.clone(),
                        ),
                        (
                            ANNOTATION_DESCRIPTION.to_string(),
                            cluster.description.clone(),
                        ),
                    ])),
                    ..Default::default()
                },
                spec: KubernetesClusterSpec {},
                status: None,
            },
            KubernetesClusterPhase::Running,
        )
        .await?;
        if kc == Dependent::Waiting {
            return Ok(Action::requeue(self.opts.polling_interval));
        }

        let kcc = ensure_dependent(
            self.store.as_ref(),
            namespace,
            &cluster.name,
            || KubernetesClusterConfiguration {
                metadata: ObjectMeta {
                    name: Some(cluster.name.clone()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: KubernetesClusterConfigurationSpec {
                    owner: ClusterOwnerRef {
                        name: cluster.name.clone(),
                    },
                },
                status: None,
            },
            KubernetesClusterConfigurationPhase::Running,
        )
        .await?;
        if kcc == Dependent::Waiting {
            return Ok(Action::requeue(self.opts.polling_interval));
        }

        self.status
            .update(
                pipeline,
                PipelinePhase::Succeeded,
                Condition::ready(
                    "KubernetesClusterRunning",
                    "KubernetesCluster is running and Pipeline has succeeded.",
                ),
            )
            .await?;
        info!(cluster = %cluster.name, "pipeline succeeded");
        Ok(Action::await_change())
    }
}

#[async_trait]
impl<S: ResourceStore + 'static> Reconcile for PipelineReconciler<S> {
    type Object = Pipeline;

    const NAME: &'static str = "pipeline";

    #[instrument(name = "pipeline", skip(self))]
    async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Action, ReconcileErr> {
        let pipeline: Option<Pipeline> = self.store.get(namespace, name).await?;
        let Some(pipeline) = pipeline else {
            debug!("pipeline is gone");
            return Ok(Action::await_change());
        };
        let phase = pipeline.phase();
        if phase != PipelinePhase::Running {
            debug!(%phase, "pipeline is not running");
            return Ok(Action::await_change());
        }
        self.cascade(namespace, &pipeline).await
    }

    fn options(&self) -> &ReconcilerOptions {
        &self.opts
    }
}
