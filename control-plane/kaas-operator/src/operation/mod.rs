//! Create and track cluster operations.
//!
//! A cluster creation is a Pipeline; its progress is reported as a
//! [`LongRunningOperation`] read back from the Pipeline status and, once the
//! Pipeline succeeded, from the resulting KubernetesCluster.

use std::sync::Arc;

use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::KaasConfig;
use crate::crd::{
    Condition, KubernetesCluster, KubernetesClusterConfiguration,
    PhasedResource, Pipeline, PipelineClusterSpec, PipelinePhase, PipelineSpec,
};
use crate::store::{ResourceStore, StoreError};

pub const OPERATION_PREFIX: &str = "cluster-create";

#[derive(thiserror::Error, Debug)]
pub enum OperationError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Requested cluster, and the realized cluster in a finished operation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    pub namespace: String,
    pub spec: Cluster,
    pub phase: String,
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_time: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum OperationResponse {
    Cluster(Cluster),
    Empty,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LongRunningOperation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OperationMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<OperationResponse>,
    pub done: bool,
}

pub struct ClusterService<S> {
    store: Arc<S>,
    namespace: String,
}

impl<S: ResourceStore> ClusterService<S> {
    pub fn new(store: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Service bound to `KAAS_DEFAULT_NAMESPACE`.
    pub fn from_config(store: Arc<S>, cfg: &KaasConfig) -> Self {
        Self::new(store, cfg.default_namespace.clone())
    }

    /// Start a cluster creation by creating a Pipeline for it.
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn create_cluster(
        &self,
        cluster: Cluster,
    ) -> Result<LongRunningOperation, OperationError> {
        let pipeline = Pipeline {
            metadata: ObjectMeta {
                name: Some(operation_name()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: PipelineSpec {
                cluster: PipelineClusterSpec {
                    name: cluster.name,
                    display_name: cluster.display_name,
                    description: cluster.description,
                },
            },
            status: None,
        };
        let created = self.store.create(&pipeline).await?;
        let name = created.metadata.name.unwrap_or_default();
        info!(operation = %name, "cluster creation started");
        Ok(LongRunningOperation {
            name,
            metadata: None,
            response: None,
            done: false,
        })
    }

    /// Report the state of a cluster creation. The operation is done once
    /// the Pipeline reached a terminal phase.
    pub async fn get_operation(
        &self,
        name: &str,
    ) -> Result<LongRunningOperation, OperationError> {
        let pipeline: Pipeline = self.require(name).await?;
        let spec = &pipeline.spec.cluster;
        let status = pipeline.phase_status();
        let metadata = OperationMetadata {
            namespace: self.namespace.clone(),
            spec: Cluster {
                name: spec.name.clone(),
                display_name: spec.display_name.clone(),
                description: spec.description.clone(),
            },
            phase: status
                .and_then(|s| s.phase)
                .map(|p| p.to_string())
                .unwrap_or_default(),
            conditions: pipeline.conditions().to_vec(),
            last_synced_time: status.and_then(|s| s.last_synced_time.clone()),
        };

        let phase = pipeline.phase();
        let response = match phase {
            PipelinePhase::Succeeded => {
                let kc: KubernetesCluster = self.require(&spec.name).await?;
                // The configuration must exist too, even though nothing
                // from it is reported yet.
                let _: KubernetesClusterConfiguration =
                    self.require(&spec.name).await?;
                Some(OperationResponse::Cluster(Cluster {
                    name: kc.metadata.name.clone().unwrap_or_default(),
                    display_name: kc.display_name().to_string(),
                    description: kc.description().to_string(),
                }))
            }
            PipelinePhase::Failed => Some(OperationResponse::Empty),
            _ => None,
        };

        Ok(LongRunningOperation {
            name: name.to_string(),
            metadata: Some(metadata),
            done: phase.is_terminal(),
            response,
        })
    }

    async fn require<K: PhasedResource>(
        &self,
        name: &str,
    ) -> Result<K, OperationError> {
        let obj: Option<K> = self.store.get(&self.namespace, name).await?;
        obj.ok_or_else(|| {
            OperationError::NotFound(format!(
                "{} {}/{}",
                K::kind(&()),
                self.namespace,
                name
            ))
        })
    }
}

fn operation_name() -> String {
    format!("{OPERATION_PREFIX}-{}", uuid::Uuid::new_v4())
}
