use std::sync::Arc;

use async_trait::async_trait;
use kube::Resource;
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument};

use super::{
    Dependent, Reconcile, ReconcileErr, ReconcilerOptions, StatusUpdater,
    ensure_dependent, into_internal,
};
use crate::crd::{
    Condition, KubernetesClusterConfiguration,
    KubernetesClusterConfigurationConfigMap,
    KubernetesClusterConfigurationConfigMapSpec,
    KubernetesClusterConfigurationPhase, PhasedResource,
};
use crate::store::ResourceStore;

/// Name of the configuration payload held by the ConfigMap of `kcc`.
pub fn config_payload_name(kcc: &str) -> String {
    format!("{kcc}-config")
}

/// Moves a KubernetesClusterConfiguration to `Running` once the ConfigMap it
/// owns is `Running`. The ConfigMap shares the configuration's name and
/// carries a controller owner reference back to it.
pub struct KubernetesClusterConfigurationReconciler<S> {
    store: Arc<S>,
    status: StatusUpdater<S>,
    opts: ReconcilerOptions,
}

impl<S: ResourceStore> KubernetesClusterConfigurationReconciler<S> {
    pub fn new(store: Arc<S>, opts: ReconcilerOptions) -> Self {
        Self {
            status: StatusUpdater::new(store.clone()),
            store,
            opts,
        }
    }

    async fn await_config_map(
        &self,
        namespace: &str,
        kcc: &KubernetesClusterConfiguration,
    ) -> Result<Action, ReconcileErr> {
        let name = kcc.metadata.name.clone().unwrap_or_default();
        let owner = kcc.controller_owner_ref(&()).ok_or_else(|| {
            into_internal(format!(
                "KubernetesClusterConfiguration {namespace}/{name} has no uid"
            ))
        })?;

        let cm = ensure_dependent(
            self.store.as_ref(),
            namespace,
            &name,
            || KubernetesClusterConfigurationConfigMap {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    namespace: Some(namespace.to_string()),
                    owner_references: Some(vec![owner]),
                    ..Default::default()
                },
                spec: KubernetesClusterConfigurationConfigMapSpec {
                    name: config_payload_name(&name),
                },
                status: None,
            },
            KubernetesClusterConfigurationPhase::Running,
        )
        .await?;
        if cm == Dependent::Waiting {
            return Ok(Action::requeue(self.opts.polling_interval));
        }

        self.status
            .update(
                kcc,
                KubernetesClusterConfigurationPhase::Running,
                Condition::ready(
                    "KubernetesClusterConfigurationConfigMapCreated",
                    "KubernetesClusterConfigurationConfigMap is successfully created and ready to use",
                ),
            )
            .await?;
        info!("kubernetesclusterconfiguration running");
        Ok(Action::await_change())
    }
}

#[async_trait]
impl<S: ResourceStore + 'static> Reconcile
    for KubernetesClusterConfigurationReconciler<S>
{
    type Object = KubernetesClusterConfiguration;

    const NAME: &'static str = "kubernetesclusterconfiguration";

    #[instrument(name = "kubernetesclusterconfiguration", skip(self))]
    async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Action, ReconcileErr> {
        let kcc: Option<KubernetesClusterConfiguration> =
            self.store.get(namespace, name).await?;
        let Some(kcc) = kcc else {
            debug!("kubernetesclusterconfiguration is gone");
            return Ok(Action::await_change());
        };

        match kcc.phase() {
            KubernetesClusterConfigurationPhase::Unknown => {
                self.status
                    .update(
                        &kcc,
                        KubernetesClusterConfigurationPhase::Creating,
                        Condition::ready(
                            "KubernetesClusterConfigurationInitializing",
                            "KubernetesClusterConfiguration is initializing",
                        ),
                    )
                    .await?;
                info!("kubernetesclusterconfiguration creating");
                Ok(Action::requeue(self.opts.polling_interval))
            }
            KubernetesClusterConfigurationPhase::Creating => {
                self.await_config_map(namespace, &kcc).await
            }
            KubernetesClusterConfigurationPhase::Running => {
                Ok(Action::await_change())
            }
        }
    }

    fn options(&self) -> &ReconcilerOptions {
        &self.opts
    }
}
