use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::status::{PhaseStatus, impl_phase_display, impl_phased_resource};

/// A request to provision one cluster. Pipelines in a namespace are
/// admitted one at a time by the queue controller and then driven to a
/// terminal phase by the pipeline controller.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "kaas.io",
    version = "v1alpha1",
    kind = "Pipeline",
    plural = "pipelines",
    namespaced,
    status = "PipelineStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    #[serde(default)]
    pub cluster: PipelineClusterSpec,
}

/// Desired cluster. `name` becomes the name of the KubernetesCluster and
/// KubernetesClusterConfiguration created for this pipeline.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineClusterSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq,
)]
pub enum PipelinePhase {
    Pending,
    /// At most one pipeline per namespace is expected to hold this phase.
    Running,
    Succeeded,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PipelinePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl_phase_display!(PipelinePhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown
});

pub type PipelineStatus = PhaseStatus<PipelinePhase>;

impl_phased_resource!(Pipeline, PipelinePhase);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::PhasedResource;

    fn with_status(status: serde_json::Value) -> Pipeline {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "kaas.io/v1alpha1",
            "kind": "Pipeline",
            "metadata": { "name": "p1", "namespace": "default" },
            "spec": { "cluster": { "name": "c1" } },
            "status": status
        }))
        .unwrap()
    }

    #[test]
    fn absent_phase_reads_as_unknown() {
        let p = with_status(serde_json::json!({}));
        assert_eq!(p.phase(), PipelinePhase::Unknown);
        let mut bare = Pipeline::new("p2", PipelineSpec::default());
        assert_eq!(bare.phase(), PipelinePhase::Unknown);
        bare.phase_status_mut().phase = Some(PipelinePhase::Pending);
        assert_eq!(bare.phase(), PipelinePhase::Pending);
    }

    #[test]
    fn unrecognized_phase_reads_as_unknown() {
        let p = with_status(serde_json::json!({ "phase": "Queued" }));
        assert_eq!(p.phase(), PipelinePhase::Unknown);
    }

    #[test]
    fn known_phases_round_trip_as_strings() {
        let p = with_status(serde_json::json!({
            "phase": "Running",
            "lastSyncedTime": "2025-01-01T00:00:00+00:00"
        }));
        assert_eq!(p.phase(), PipelinePhase::Running);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["status"]["phase"], "Running");
        assert_eq!(v["spec"]["cluster"]["name"], "c1");
        assert_eq!(v["spec"]["cluster"]["displayName"], "");
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(PipelinePhase::Succeeded.is_terminal());
        assert!(PipelinePhase::Failed.is_terminal());
        assert!(!PipelinePhase::Running.is_terminal());
        assert!(!PipelinePhase::Unknown.is_terminal());
    }
}
