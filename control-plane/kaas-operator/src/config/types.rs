use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

use crate::controller::ReconcilerOptions;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("unknown controller '{0}' in KAAS_CONTROLLERS")]
    UnknownController(String),
    #[error("KAAS_CONTROLLERS selects no controller")]
    NoControllers,
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

#[derive(Envconfig, Clone, Debug)]
pub struct KaasConfig {
    /// Requeue delay while a dependent is not ready yet.
    /// Env: KAAS_POLLING_INTERVAL_SECS
    #[envconfig(from = "KAAS_POLLING_INTERVAL_SECS", default = "10")]
    pub polling_interval_secs: u64,

    /// Requeue delay after a failed reconcile other than a conflict.
    /// Env: KAAS_ERROR_REQUEUE_SECS
    #[envconfig(from = "KAAS_ERROR_REQUEUE_SECS", default = "30")]
    pub error_requeue_secs: u64,

    /// Watch a single namespace instead of the whole cluster.
    #[envconfig(from = "KAAS_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    #[envconfig(from = "KAAS_DEFAULT_NAMESPACE", default = "default")]
    pub default_namespace: String,

    /// Comma-separated controller names; see [`ControllerKind`].
    #[envconfig(
        from = "KAAS_CONTROLLERS",
        default = "pipeline-queue,pipeline,kubernetescluster,kubernetesclusterconfiguration"
    )]
    pub controllers: String,

    #[envconfig(from = "KAAS_ADMISSION_RECHECK", default = "true")]
    pub admission_recheck: bool,
}

/// Controllers that can be enabled in one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ControllerKind {
    PipelineQueue,
    Pipeline,
    KubernetesCluster,
    KubernetesClusterConfiguration,
}

impl ControllerKind {
    pub const ALL: [ControllerKind; 4] = [
        Self::PipelineQueue,
        Self::Pipeline,
        Self::KubernetesCluster,
        Self::KubernetesClusterConfiguration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PipelineQueue => "pipeline-queue",
            Self::Pipeline => "pipeline",
            Self::KubernetesCluster => "kubernetescluster",
            Self::KubernetesClusterConfiguration => {
                "kubernetesclusterconfiguration"
            }
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownController(s.to_string()))
    }
}

impl KaasConfig {
    /// Parse `KAAS_CONTROLLERS` into a sorted, de-duplicated selection.
    pub fn enabled_controllers(&self) -> Result<Vec<ControllerKind>, ConfigError> {
        let mut kinds = self
            .controllers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ControllerKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        kinds.sort();
        kinds.dedup();
        if kinds.is_empty() {
            return Err(ConfigError::NoControllers);
        }
        Ok(kinds)
    }

    pub fn reconciler_options(&self) -> Result<ReconcilerOptions, ConfigError> {
        if self.polling_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("KAAS_POLLING_INTERVAL_SECS"));
        }
        if self.error_requeue_secs == 0 {
            return Err(ConfigError::ZeroInterval("KAAS_ERROR_REQUEUE_SECS"));
        }
        Ok(ReconcilerOptions {
            polling_interval: Duration::from_secs(self.polling_interval_secs),
            error_backoff: Duration::from_secs(self.error_requeue_secs),
            admission_recheck: self.admission_recheck,
        })
    }

    /// Check everything that can be checked before connecting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.enabled_controllers()?;
        self.reconciler_options()?;
        Ok(())
    }
}
