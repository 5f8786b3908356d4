use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::foundation::core::TargetId;
use crate::foundation::sync::lock;
use crate::stage::assignment::Stage;
use crate::stage::callback::{CallbackId, RegisteredCallback};
use crate::target::slot::{TargetSlot, TargetState};

/// Targets one runner services, partitioned by stage, plus the deferred-destruction lists.
///
/// The lock is held for the whole of a task, so iteration never overlaps a mutation. Mutations
/// come from the driving context between frames; the pending lists are drained at the end of a
/// task, never while a stage is walking its targets.
#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    state: Mutex<QueueState>,
}

impl WorkQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        lock(&self.state)
    }
}

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    window: Vec<Arc<TargetSlot>>,
    cull: Vec<Arc<TargetSlot>>,
    draw: Vec<Arc<TargetSlot>>,
    pending_release: Vec<Arc<TargetSlot>>,
    pending_close: Vec<Arc<TargetSlot>>,
    pub(crate) callbacks: Vec<RegisteredCallback>,
}

/// Counts from one drain of the pending lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Drained {
    pub(crate) released: u64,
    pub(crate) closed: u64,
}

impl QueueState {
    pub(crate) fn targets(&self, stage: Stage) -> &[Arc<TargetSlot>] {
        match stage {
            Stage::Window => &self.window,
            Stage::Cull => &self.cull,
            Stage::Draw => &self.draw,
        }
    }

    fn targets_mut(&mut self, stage: Stage) -> &mut Vec<Arc<TargetSlot>> {
        match stage {
            Stage::Window => &mut self.window,
            Stage::Cull => &mut self.cull,
            Stage::Draw => &mut self.draw,
        }
    }

    pub(crate) fn contains(&self, stage: Stage, id: TargetId) -> bool {
        self.targets(stage).iter().any(|s| s.id() == id)
    }

    /// Append `slot` to a stage list. Ordering is restored by the next `resort`.
    pub(crate) fn insert(&mut self, stage: Stage, slot: Arc<TargetSlot>) {
        if self.contains(stage, slot.id()) {
            return;
        }
        self.targets_mut(stage).push(slot);
    }

    pub(crate) fn remove(&mut self, stage: Stage, id: TargetId) -> bool {
        let list = self.targets_mut(stage);
        let before = list.len();
        list.retain(|s| s.id() != id);
        before != list.len()
    }

    /// Stable sort of every stage list by `(sort_key, creation order)`.
    pub(crate) fn resort(&mut self) {
        for stage in Stage::ALL {
            self.targets_mut(stage).sort_by_key(|s| s.order_key());
        }
    }

    /// Drop every stage membership. Pending lists and callbacks are kept.
    pub(crate) fn clear_targets(&mut self) {
        for stage in Stage::ALL {
            self.targets_mut(stage).clear();
        }
    }

    pub(crate) fn has_targets(&self, stage: Stage) -> bool {
        !self.targets(stage).is_empty()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending_release.is_empty() || !self.pending_close.is_empty()
    }

    pub(crate) fn defer_release(&mut self, slot: Arc<TargetSlot>) {
        self.pending_release.push(slot);
    }

    pub(crate) fn defer_close(&mut self, slot: Arc<TargetSlot>) {
        self.pending_close.push(slot);
    }

    /// Release, then close, whatever was deferred to this runner.
    ///
    /// A close whose release is still queued on another runner stays pending until a later task.
    pub(crate) fn drain_pending(&mut self) -> Drained {
        let mut drained = Drained::default();
        for slot in self.pending_release.drain(..) {
            if slot.is_released() {
                continue;
            }
            trace!(target_id = %slot.id(), name = slot.name(), "releasing context");
            slot.target().release();
            slot.mark_released();
            drained.released += 1;
        }
        self.pending_close.retain(|slot| {
            if !slot.is_released() {
                return true;
            }
            trace!(target_id = %slot.id(), name = slot.name(), "closing target");
            slot.target().close();
            slot.set_state(TargetState::Closed);
            drained.closed += 1;
            false
        });
        drained
    }

    pub(crate) fn remove_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|cb| cb.id != id);
        before != self.callbacks.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stage/queue.rs"]
mod tests;
