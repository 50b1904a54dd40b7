// Integration tests that expect a running k8s cluster with the KaaS CRDs
// applied (`cargo run --bin crdgen | kubectl apply -f -`).
// Enable via: cargo test -p kaas-operator --test it_k8s -- --ignored

use std::sync::Arc;

use kaas_operator::controller::{
    KubernetesClusterConfigurationReconciler, KubernetesClusterReconciler,
    PipelineQueueReconciler, PipelineReconciler, Reconcile, ReconcilerOptions,
};
use kaas_operator::crd::{
    KubernetesCluster, KubernetesClusterConfiguration,
    KubernetesClusterConfigurationConfigMap, KubernetesClusterConfigurationPhase,
    PhasedResource, Pipeline, PipelinePhase,
};
use kaas_operator::store::{KubeStore, ResourceStore};
use kube::Client;
use kube::api::{Api, DeleteParams};

mod common;
use common::{pipeline, uniq};

const NS: &str = "default";

async fn store() -> Arc<KubeStore> {
    let client = Client::try_default().await.expect("kube client");
    Arc::new(KubeStore::new(client))
}

async fn cleanup(client: &Client, pipeline: &str, cluster: &str) {
    let dp = DeleteParams::default();
    let _ = Api::<Pipeline>::namespaced(client.clone(), NS)
        .delete(pipeline, &dp)
        .await;
    let _ = Api::<KubernetesCluster>::namespaced(client.clone(), NS)
        .delete(cluster, &dp)
        .await;
    // The ConfigMap is collected through its owner reference.
    let _ = Api::<KubernetesClusterConfiguration>::namespaced(client.clone(), NS)
        .delete(cluster, &dp)
        .await;
}

async fn phase(store: &KubeStore, name: &str) -> PipelinePhase {
    let p: Option<Pipeline> = store.get(NS, name).await.expect("get pipeline");
    p.expect("pipeline exists").phase()
}

#[test_log::test(tokio::test)]
#[ignore]
async fn pipeline_reaches_succeeded_in_cluster() {
    // Pre-conditions:
    // - KUBECONFIG points to a working cluster
    // - KaaS CRDs installed
    // - Namespace "default" exists
    let store = store().await;
    let opts = ReconcilerOptions::default();
    let queue = PipelineQueueReconciler::new(store.clone(), opts.clone());
    let cascade = PipelineReconciler::new(store.clone(), opts.clone());
    let cluster = KubernetesClusterReconciler::new(store.clone(), opts.clone());
    let configuration =
        KubernetesClusterConfigurationReconciler::new(store.clone(), opts);

    let name = uniq("kaas-it-pipeline");
    let cluster_name = uniq("kaas-it-cluster");
    let mut p = pipeline(&name, &cluster_name, 0);
    p.metadata.namespace = Some(NS.into());
    // Let the API server stamp the creation time.
    p.metadata.creation_timestamp = None;
    store.create(&p).await.expect("create pipeline");

    queue.reconcile(NS, &name).await.expect("queue");
    queue.reconcile(NS, &name).await.expect("admit");
    assert_eq!(phase(&store, &name).await, PipelinePhase::Running);

    cascade.reconcile(NS, &name).await.expect("create cluster");
    cluster.reconcile(NS, &cluster_name).await.expect("cluster creating");
    cluster.reconcile(NS, &cluster_name).await.expect("cluster running");
    cascade.reconcile(NS, &name).await.expect("create configuration");
    configuration
        .reconcile(NS, &cluster_name)
        .await
        .expect("configuration creating");
    configuration
        .reconcile(NS, &cluster_name)
        .await
        .expect("create configmap");

    // Nothing in-cluster advances the ConfigMap; do it here.
    let cm: Option<KubernetesClusterConfigurationConfigMap> =
        store.get(NS, &cluster_name).await.expect("get configmap");
    let mut cm = cm.expect("configmap exists");
    cm.phase_status_mut().phase = Some(KubernetesClusterConfigurationPhase::Running);
    store.update_status(&cm).await.expect("configmap running");

    configuration
        .reconcile(NS, &cluster_name)
        .await
        .expect("configuration running");
    cascade.reconcile(NS, &name).await.expect("finalize");
    assert_eq!(phase(&store, &name).await, PipelinePhase::Succeeded);

    cleanup(store.client(), &name, &cluster_name).await;
}
