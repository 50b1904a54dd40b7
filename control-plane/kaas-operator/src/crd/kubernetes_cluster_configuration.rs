use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::status::{PhaseStatus, impl_phase_display, impl_phased_resource};

/// Configuration of a KubernetesCluster. Becomes Running once the nested
/// [`KubernetesClusterConfigurationConfigMap`] it owns is Running.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "kaas.io",
    version = "v1alpha1",
    kind = "KubernetesClusterConfiguration",
    plural = "kubernetesclusterconfigurations",
    shortname = "kcc",
    namespaced,
    status = "KubernetesClusterConfigurationStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
pub struct KubernetesClusterConfigurationSpec {
    /// The KubernetesCluster this configuration belongs to.
    #[serde(default)]
    pub owner: ClusterOwnerRef,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ClusterOwnerRef {
    #[serde(default)]
    pub name: String,
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq,
)]
pub enum KubernetesClusterConfigurationPhase {
    Creating,
    Running,
    #[default]
    #[serde(other)]
    Unknown,
}

impl_phase_display!(KubernetesClusterConfigurationPhase {
    Creating,
    Running,
    Unknown
});

pub type KubernetesClusterConfigurationStatus =
    PhaseStatus<KubernetesClusterConfigurationPhase>;

impl_phased_resource!(
    KubernetesClusterConfiguration,
    KubernetesClusterConfigurationPhase
);

/// Leaf resource holding the configuration payload. Its phase is advanced
/// outside this operator; it is owned by a KubernetesClusterConfiguration
/// through an owner reference so it is collected with its owner.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "kaas.io",
    version = "v1alpha1",
    kind = "KubernetesClusterConfigurationConfigMap",
    plural = "kubernetesclusterconfigurationconfigmaps",
    shortname = "kccm",
    namespaced,
    status = "KubernetesClusterConfigurationStatus"
)]
pub struct KubernetesClusterConfigurationConfigMapSpec {
    /// Name of the configuration payload.
    #[serde(default)]
    pub name: String,
}

impl_phased_resource!(
    KubernetesClusterConfigurationConfigMap,
    KubernetesClusterConfigurationPhase
);
