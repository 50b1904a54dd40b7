use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument};

use super::{Reconcile, ReconcileErr, ReconcilerOptions, StatusUpdater};
use crate::crd::{Condition, PhasedResource, Pipeline, PipelinePhase};
use crate::store::ResourceStore;

/// Admits at most one Pipeline per namespace into `Running`.
///
/// There is no queue object: the order is recomputed on every pass by
/// listing the namespace's Pipelines and sorting candidates by
/// `(creationTimestamp, name)`.
pub struct PipelineQueueReconciler<S> {
    store: Arc<S>,
    status: StatusUpdater<S>,
    opts: ReconcilerOptions,
}

impl<S: ResourceStore> PipelineQueueReconciler<S> {
    pub fn new(store: Arc<S>, opts: ReconcilerOptions) -> Self {
        Self {
            status: StatusUpdater::new(store.clone()),
            store,
            opts,
        }
    }

    async fn admit(&self, pipeline: &Pipeline) -> Result<Action, ReconcileErr> {
        let blockers = self.blockers(pipeline).await?;
        if !blockers.is_empty() {
            info!(count = blockers.len(), ?blockers, "waiting in queue");
            return Ok(Action::requeue(self.opts.polling_interval));
        }
        // A peer may have been promoted between the list and now.
        if self.opts.admission_recheck {
            let blockers = self.blockers(pipeline).await?;
            if !blockers.is_empty() {
                info!(?blockers, "queue changed during admission");
                return Ok(Action::requeue(self.opts.polling_interval));
            }
        }

        self.status
            .update(
                pipeline,
                PipelinePhase::Running,
                Condition::ready(
                    "PipelinePhaseRunning",
                    "Pipeline is now running.",
                ),
            )
            .await?;
        info!("pipeline admitted");
        Ok(Action::requeue(self.opts.polling_interval))
    }

    /// Names of the peers that currently keep `pipeline` out of `Running`.
    async fn blockers(
        &self,
        pipeline: &Pipeline,
    ) -> Result<Vec<String>, ReconcileErr> {
        let ns = pipeline.namespace().unwrap_or_default();
        let peers: Vec<Pipeline> = self.store.list(&ns).await?;
        Ok(peers
            .iter()
            .filter(|peer| blocks_admission(pipeline, peer))
            .map(ResourceExt::name_any)
            .collect())
    }
}

/// Whether `peer` must finish or be admitted before `candidate` may run.
///
/// A Running peer always blocks. A Pending peer blocks when it sorts before
/// the candidate by creation timestamp, ties broken by name. Pipelines in
/// any other phase, and the candidate itself, never block.
pub fn blocks_admission(candidate: &Pipeline, peer: &Pipeline) -> bool {
    if peer.name_any() == candidate.name_any() {
        return false;
    }
    match peer.phase() {
        PipelinePhase::Running => true,
        PipelinePhase::Pending => queue_key(peer) < queue_key(candidate),
        _ => false,
    }
}

fn queue_key(p: &Pipeline) -> (Option<chrono::DateTime<chrono::Utc>>, String) {
    (
        p.metadata.creation_timestamp.as_ref().map(|t| t.0),
        p.name_any(),
    )
}

#[async_trait]
impl<S: ResourceStore + 'static> Reconcile for PipelineQueueReconciler<S> {
    type Object = Pipeline;

    const NAME: &'static str = "pipeline-queue";

    #[instrument(name = "pipeline_queue", skip(self))]
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
        if phase.is_terminal() {
            debug!(%phase, "pipeline has completed");
            return Ok(Action::await_change());
        }
        match phase {
            PipelinePhase::Running
            | PipelinePhase::Succeeded
            | PipelinePhase::Failed => {
                debug!("pipeline is running; waiting for it to complete");
                Ok(Action::await_change())
            }
            PipelinePhase::Pending => self.admit(&pipeline).await,
            PipelinePhase::Unknown => {
                self.status
                    .update(
                        &pipeline,
                        PipelinePhase::Pending,
                        Condition::ready(
                            "PipelinePhasePending",
                            "Pipeline is now pending and waiting to be processed.",
                        ),
                    )
                    .await?;
                info!("pipeline queued");
                Ok(Action::await_change())
            }
        }
    }

    fn options(&self) -> &ReconcilerOptions {
        &self.opts
    }
}
