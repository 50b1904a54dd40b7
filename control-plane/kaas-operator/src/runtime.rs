use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client};
use tracing::info;

use crate::config::{ControllerKind, KaasConfig};
use crate::controller::{
    KubernetesClusterConfigurationReconciler, KubernetesClusterReconciler,
    PipelineQueueReconciler, PipelineReconciler, Reconcile, ReconcilerOptions,
    error_policy, reconcile,
};
use crate::crd::{
    KubernetesCluster, KubernetesClusterConfiguration,
    KubernetesClusterConfigurationConfigMap, Pipeline,
};
use crate::store::{KubeStore, StoredResource};

pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Api for the watched scope: one namespace, or the whole cluster.
fn watched<K: StoredResource>(
    client: &Client,
    namespace: Option<&str>,
) -> Api<K> {
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn drive<R: Reconcile>(
    controller: Controller<R::Object>,
    ctx: Arc<R>,
) -> ControllerFuture {
    Box::pin(
        controller
            .shutdown_on_signal()
            .run(reconcile::<R>, error_policy::<R>, ctx)
            .for_each(log_reconcile_result(R::NAME)),
    )
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{controller} reconciled"),
            Err(e) => tracing::error!(error = ?e, "{controller} reconcile error"),
        }
        std::future::ready(())
    }
}

/// Build one controller future per enabled controller.
pub fn build_controllers(
    client: Client,
    cfg: &KaasConfig,
) -> anyhow::Result<Vec<ControllerFuture>> {
    let opts: ReconcilerOptions = cfg.reconciler_options()?;
    let store = Arc::new(KubeStore::new(client.clone()));
    let ns = cfg.watch_namespace.as_deref();

    let mut controllers = Vec::new();
    for kind in cfg.enabled_controllers()? {
        info!(
            controller = %kind,
            namespace = ns.unwrap_or("<all>"),
            "starting controller"
        );
        let fut = match kind {
            ControllerKind::PipelineQueue => drive(
                Controller::new(
                    watched::<Pipeline>(&client, ns),
                    WatcherConfig::default(),
                ),
                Arc::new(PipelineQueueReconciler::new(
                    store.clone(),
                    opts.clone(),
                )),
            ),
            ControllerKind::Pipeline => drive(
                Controller::new(
                    watched::<Pipeline>(&client, ns),
                    WatcherConfig::default(),
                ),
                Arc::new(PipelineReconciler::new(store.clone(), opts.clone())),
            ),
            ControllerKind::KubernetesCluster => drive(
                Controller::new(
                    watched::<KubernetesCluster>(&client, ns),
                    WatcherConfig::default(),
                ),
                Arc::new(KubernetesClusterReconciler::new(
                    store.clone(),
                    opts.clone(),
                )),
            ),
            // ConfigMap changes re-trigger the owning configuration.
            ControllerKind::KubernetesClusterConfiguration => drive(
                Controller::new(
                    watched::<KubernetesClusterConfiguration>(&client, ns),
                    WatcherConfig::default(),
                )
                .owns(
                    watched::<KubernetesClusterConfigurationConfigMap>(
                        &client, ns,
                    ),
                    WatcherConfig::default(),
                ),
                Arc::new(KubernetesClusterConfigurationReconciler::new(
                    store.clone(),
                    opts.clone(),
                )),
            ),
        };
        controllers.push(fut);
    }
    Ok(controllers)
}

/// Run every enabled controller until shutdown is signalled.
pub async fn run_all(client: Client, cfg: KaasConfig) -> anyhow::Result<()> {
    let controllers = build_controllers(client, &cfg)?;
    futures_util::future::join_all(controllers).await;
    info!("controllers stopped");
    Ok(())
}
