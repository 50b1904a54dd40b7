use std::sync::Arc;

use crate::crd::status::{Condition, PhasedResource, now_rfc3339};
use crate::store::{ResourceStore, StoreResult};

/// Writes phase transitions through the status subresource.
///
/// The write carries the resourceVersion of the object it was given, so a
/// transition computed from a stale read fails with a conflict instead of
/// overwriting a newer status.
pub struct StatusUpdater<S> {
    store: Arc<S>,
}

impl<S> Clone for StatusUpdater<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ResourceStore> StatusUpdater<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Set `phase`, append `condition` stamped with the current time and
    /// refresh `lastSyncedTime`. Returns the stored object.
    pub async fn update<K: PhasedResource>(
        &self,
        obj: &K,
        phase: K::Phase,
        condition: Condition,
    ) -> StoreResult<K> {
        let now = now_rfc3339();
        let mut next = obj.clone();
        let status = next.phase_status_mut();
        status.phase = Some(phase);
        status.conditions.push(Condition {
            last_transition_time: Some(now.clone()),
            ..condition
        });
        status.last_synced_time = Some(now);
        self.store.update_status(&next).await
    }
}
