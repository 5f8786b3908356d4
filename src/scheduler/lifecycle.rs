use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Scheduler, TargetOpts};
use crate::foundation::core::{SortKey, TargetId};
use crate::foundation::error::{SchedulerError, SchedulerResult};
use crate::stage::assignment::{Stage, StageAssignment, StageContext};
use crate::stage::callback::{CallbackData, CallbackId, CallbackTime, RegisteredCallback};
use crate::stage::task::Task;
use crate::target::RenderTarget;
use crate::target::slot::{TargetSlot, TargetState};

impl Scheduler {
    /// Add a target using a threading-model descriptor.
    ///
    /// Worker contexts named by the model are spawned on first reference. The target starts
    /// `Unopened`; `open_targets` (or `run_frame`) opens it.
    pub fn make_target(
        &mut self,
        target: impl RenderTarget + 'static,
        opts: TargetOpts,
    ) -> SchedulerResult<TargetId> {
        let model = opts
            .threading
            .unwrap_or_else(|| self.opts.default_threading.clone());
        self.add_target(target, model.assignment(), opts.sort_key)
    }

    /// Add a target with an explicit stage assignment.
    pub fn add_target(
        &mut self,
        target: impl RenderTarget + 'static,
        assignment: StageAssignment,
        sort_key: SortKey,
    ) -> SchedulerResult<TargetId> {
        self.guard_mutation("add_target")?;
        let id = TargetId(self.next_target);
        let slot = Arc::new(TargetSlot::new(
            id,
            Box::new(target),
            sort_key,
            assignment.clone(),
        ));
        if let Err(err) = self.schedule(&slot, &assignment) {
            self.unschedule(&slot);
            return Err(err);
        }
        self.next_target += 1;
        self.targets.insert(id, slot.clone());
        self.dirty = true;
        debug!(
            target_id = %id,
            name = slot.name(),
            kind = ?slot.target().kind(),
            window = %assignment.window,
            cull = %assignment.cull,
            draw = %assignment.draw,
            "target added"
        );
        Ok(id)
    }

    /// Take a target out of every queue and forget it.
    ///
    /// Scheduling stops before this returns. Release and close of an open target are deferred to
    /// the end of the next task on its draw and window contexts.
    pub fn remove_target(&mut self, id: TargetId) -> SchedulerResult<()> {
        self.guard_mutation("remove_target")?;
        let slot = self
            .targets
            .remove(&id)
            .ok_or(SchedulerError::UnknownTarget(id))?;
        self.retire(&slot);
        debug!(target_id = %id, name = slot.name(), "target removed");
        Ok(())
    }

    /// Move a target's stages to other contexts.
    ///
    /// Cull and draw may move at any time between frames. The window context of an `Open` target
    /// is fixed; only an `Unopened` target can change it.
    pub fn set_target_stage_assignment(
        &mut self,
        id: TargetId,
        assignment: StageAssignment,
    ) -> SchedulerResult<()> {
        self.guard_mutation("set_target_stage_assignment")?;
        let slot = self.slot(id)?;
        if !matches!(slot.state(), TargetState::Unopened | TargetState::Open) {
            return Err(SchedulerError::validation(format!(
                "target {id} is {:?} and cannot be reassigned",
                slot.state()
            )));
        }
        let old = slot.assignment();
        if old == assignment {
            return Ok(());
        }
        // An open window is serviced and closed on the context that opened it.
        if slot.state() == TargetState::Open && old.window != assignment.window {
            return Err(SchedulerError::validation(format!(
                "target {id} is open on window context '{}' and cannot move to '{}'",
                old.window, assignment.window
            )));
        }
        self.unschedule(&slot);
        slot.set_assignment(assignment.clone());
        if let Err(err) = self.schedule(&slot, &assignment) {
            slot.set_assignment(old.clone());
            self.unschedule(&slot);
            self.schedule(&slot, &old)?;
            return Err(err);
        }
        self.dirty = true;
        debug!(target_id = %id, from = ?old, to = ?assignment, "target reassigned");
        Ok(())
    }

    /// Change a target's draw-order key. Takes effect at the next resort.
    pub fn set_sort_key(&mut self, id: TargetId, key: SortKey) -> SchedulerResult<()> {
        let slot = self.slot(id)?;
        if slot.sort_key() != key {
            slot.set_sort_key(key);
            self.dirty = true;
        }
        Ok(())
    }

    /// Stable re-sort of every queue by `(sort key, creation order)`.
    pub fn resort_targets(&mut self) {
        for queue in self.all_queues() {
            queue.lock().resort();
        }
        self.dirty = false;
        debug!(queues = self.workers.len() + 1, "targets resorted");
    }

    /// Run `func` on `ctx` right before or after each of its frame tasks.
    pub fn add_callback(
        &mut self,
        ctx: StageContext,
        time: CallbackTime,
        func: impl Fn(&CallbackData<'_>) + Send + Sync + 'static,
    ) -> SchedulerResult<CallbackId> {
        let queue = self.queue_for(&ctx)?;
        let id = CallbackId(self.next_callback);
        self.next_callback += 1;
        queue.lock().callbacks.push(RegisteredCallback {
            id,
            time,
            func: Arc::new(func),
        });
        debug!(context = %ctx, ?time, callback = id.0, "callback added");
        Ok(id)
    }

    /// Returns `false` when no callback has this id.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.all_queues().any(|queue| queue.lock().remove_callback(id))
    }

    /// Release and close every target on its owning contexts, then stop every worker.
    ///
    /// Targets stay known in the `Closed` state. Referencing a worker context again afterwards
    /// spawns a fresh thread.
    pub fn terminate_threads(&mut self) -> SchedulerResult<()> {
        let mut first_err: Option<SchedulerError> = None;

        let live = self.all_queues().any(|queue| {
            let q = queue.lock();
            Stage::ALL.into_iter().any(|stage| q.has_targets(stage)) || q.has_pending()
        });
        if self.poisoned.is_none() && live {
            let flushed = self
                .broadcast(Task::Release, |q| {
                    q.has_targets(Stage::Draw) || q.has_pending()
                })
                .and_then(|_| {
                    self.broadcast(Task::Close, |q| {
                        q.has_targets(Stage::Window) || q.has_pending()
                    })
                });
            if let Err(err) = flushed {
                first_err.get_or_insert(err);
            }
            for queue in self.all_queues() {
                queue.lock().clear_targets();
            }
        }

        let timeout = self.opts.join_timeout();
        for (name, worker) in std::mem::take(&mut self.workers) {
            if let Err(err) = worker.terminate(timeout) {
                warn!(context = %name, %err, "worker did not terminate cleanly");
                first_err.get_or_insert(err);
            }
        }
        for slot in self.targets.values() {
            slot.clear_handoff();
        }
        self.flip_state = super::FlipState::Flip;
        info!(targets = self.targets.len(), "scheduler threads terminated");

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn schedule(
        &mut self,
        slot: &Arc<TargetSlot>,
        assignment: &StageAssignment,
    ) -> SchedulerResult<()> {
        for stage in Stage::ALL {
            let queue = self.queue_for(assignment.context_for(stage))?;
            queue.lock().insert(stage, slot.clone());
        }
        Ok(())
    }

    fn unschedule(&self, slot: &TargetSlot) {
        let assignment = slot.assignment();
        for stage in Stage::ALL {
            if let Some(queue) = self.existing_queue(assignment.context_for(stage)) {
                queue.lock().remove(stage, slot.id());
            }
        }
    }

    /// Unschedule `slot` and queue its release and close on the owning contexts.
    pub(super) fn retire(&mut self, slot: &Arc<TargetSlot>) {
        self.unschedule(slot);
        slot.clear_handoff();
        match slot.state() {
            TargetState::Open | TargetState::CloseRequested => {}
            TargetState::Unopened => {
                slot.set_state(TargetState::Closed);
                return;
            }
            TargetState::Closing | TargetState::Closed => return,
        }

        slot.set_state(TargetState::Closing);
        let assignment = slot.assignment();
        match self.existing_queue(&assignment.draw) {
            Some(queue) => queue.lock().defer_release(slot.clone()),
            None => slot.mark_released(),
        }
        match self.existing_queue(&assignment.window) {
            Some(queue) => queue.lock().defer_close(slot.clone()),
            None => slot.set_state(TargetState::Closed),
        }
    }
}
