use std::fmt::{Debug, Display};

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::StoredResource;

/// Status block shared by every kind: a coarse phase, an append-only
/// condition history and the time of the last status write.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStatus<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<P>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_time: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    /// Condition without a transition time; the status updater stamps it
    /// when the condition is appended.
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }

    pub fn ready(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, reason, message)
    }

    pub fn failed(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConditionType::Failed, ConditionStatus::False, reason, message)
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    Ready,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// RFC 3339 timestamp used for `lastSyncedTime` and `lastTransitionTime`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// A stored resource whose status follows the [`PhaseStatus`] layout.
///
/// `phase()` folds an absent phase and an unrecognized phase string into
/// the kind's `Unknown` variant, which every reconciler maps to its initial
/// transition.
pub trait PhasedResource: StoredResource {
    type Phase: Copy + Eq + Default + Debug + Display + Send + Sync;

    fn phase_status(&self) -> Option<&PhaseStatus<Self::Phase>>;

    fn phase_status_mut(&mut self) -> &mut PhaseStatus<Self::Phase>;

    fn phase(&self) -> Self::Phase {
        self.phase_status()
            .and_then(|s| s.phase)
            .unwrap_or_default()
    }

    fn conditions(&self) -> &[Condition] {
        self.phase_status()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}

macro_rules! impl_phased_resource {
    ($kind:ty, $phase:ty) => {
        impl $crate::crd::status::PhasedResource for $kind {
            type Phase = $phase;

            fn phase_status(
                &self,
            ) -> Option<&$crate::crd::status::PhaseStatus<$phase>> {
                self.status.as_ref()
            }

            fn phase_status_mut(
                &mut self,
            ) -> &mut $crate::crd::status::PhaseStatus<$phase> {
                self.status.get_or_insert_with(Default::default)
            }
        }
    };
}

macro_rules! impl_phase_display {
    ($phase:ty { $($variant:ident),+ $(,)? }) => {
        impl std::fmt::Display for $phase {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }
    };
}

pub(crate) use impl_phase_display;
pub(crate) use impl_phased_resource;
