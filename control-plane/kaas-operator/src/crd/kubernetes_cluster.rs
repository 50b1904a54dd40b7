use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::status::{PhaseStatus, impl_phase_display, impl_phased_resource};

pub const ANNOTATION_DISPLAY_NAME: &str =
    "kaas.io/kubernetescluster.displayName";
pub const ANNOTATION_DESCRIPTION: &str = "kaas.io/kubernetescluster.description";

/// A managed cluster. Display name and description travel as annotations;
/// `spec` carries no provisioning parameters yet.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "kaas.io",
    version = "v1alpha1",
    kind = "KubernetesCluster",
    plural = "kubernetesclusters",
    shortname = "kc",
    namespaced,
    status = "KubernetesClusterStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
pub struct KubernetesClusterSpec {}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq,
)]
pub enum KubernetesClusterPhase {
    Creating,
    Running,
    /// Declared for the deletion flow, which is not driven yet.
    Deleting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl_phase_display!(KubernetesClusterPhase {
    Creating,
    Running,
    Deleting,
    Unknown
});

pub type KubernetesClusterStatus = PhaseStatus<KubernetesClusterPhase>;

impl_phased_resource!(KubernetesCluster, KubernetesClusterPhase);

impl KubernetesCluster {
    pub fn display_name(&self) -> &str {
        self.annotation(ANNOTATION_DISPLAY_NAME)
    }

    pub fn description(&self) -> &str {
        self.annotation(ANNOTATION_DESCRIPTION)
    }

    fn annotation(&self, key: &str) -> &str {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    }
}
