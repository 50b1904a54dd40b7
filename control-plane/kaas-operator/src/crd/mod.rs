pub mod kubernetes_cluster;
pub mod kubernetes_cluster_configuration;
pub mod pipeline;
pub mod status;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::CustomResourceExt;

pub use kubernetes_cluster::{
    KubernetesCluster, KubernetesClusterPhase, KubernetesClusterSpec,
    KubernetesClusterStatus,
};
pub use kubernetes_cluster_configuration::{
    ClusterOwnerRef, KubernetesClusterConfiguration,
    KubernetesClusterConfigurationConfigMap,
    KubernetesClusterConfigurationConfigMapSpec,
    KubernetesClusterConfigurationPhase, KubernetesClusterConfigurationSpec,
    KubernetesClusterConfigurationStatus,
};
pub use pipeline::{
    Pipeline, PipelineClusterSpec, PipelinePhase, PipelineSpec, PipelineStatus,
};
pub use status::{
    Condition, ConditionStatus, ConditionType, PhaseStatus, PhasedResource,
};

/// All CRDs served by the operator, in apply order.
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        Pipeline::crd(),
        KubernetesCluster::crd(),
        KubernetesClusterConfiguration::crd(),
        KubernetesClusterConfigurationConfigMap::crd(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crds_are_namespaced_with_status_subresource() {
        for crd in all_crds() {
            assert_eq!(crd.spec.group, "kaas.io");
            assert_eq!(crd.spec.scope, "Namespaced");
            let version = &crd.spec.versions[0];
            assert_eq!(version.name, "v1alpha1");
            assert!(
                version
                    .subresources
                    .as_ref()
                    .and_then(|s| s.status.as_ref())
                    .is_some(),
                "{} lacks a status subresource",
                crd.spec.names.kind
            );
        }
    }

    #[test]
    fn short_names_match_kubectl_aliases() {
        let short = |crd: CustomResourceDefinition| {
            crd.spec.names.short_names.unwrap_or_default()
        };
        assert_eq!(short(KubernetesCluster::crd()), vec!["kc".to_string()]);
        assert_eq!(
            short(KubernetesClusterConfiguration::crd()),
            vec!["kcc".to_string()]
        );
        assert_eq!(
            short(KubernetesClusterConfigurationConfigMap::crd()),
            vec!["kccm".to_string()]
        );
    }
}
