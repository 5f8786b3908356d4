//! The frame-pipeline scheduler.
//!
//! A [`Scheduler`] owns every render target, the driving-context runner and one long-lived worker
//! per named context. All coordination passes through the scheduler: it dispatches a task to each
//! interested worker, runs the driving context's share in-line, then joins every worker before
//! returning. Workers never talk to each other, and the driving context holds at most one
//! worker's handshake at a time.

mod frame;
mod lifecycle;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::opts::SchedulerOpts;
use crate::config::threading::ThreadingModel;
use crate::foundation::core::{FrameNumber, SortKey, TargetId};
use crate::foundation::error::{SchedulerError, SchedulerResult};
use crate::observe::{FrameObserver, NoopObserver};
use crate::stage::assignment::{StageAssignment, StageContext};
use crate::stage::queue::{QueueState, WorkQueue};
use crate::stage::runner::StageRunner;
use crate::stage::task::{Task, TaskReport};
use crate::stage::worker::{BusyWorker, IdleWorker};
use crate::target::slot::{TargetSlot, TargetState};

/// Frame-global buffer-swap gate.
///
/// `render_frame` moves it to `Drawing`, `sync_frame` to `Sync` and `flip_frame` to `Flip`. No
/// target is flipped unless the state is `Sync`, and queue mutations are only accepted in `Flip`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipState {
    Drawing,
    Sync,
    Flip,
}

/// Per-target options for [`Scheduler::make_target`].
#[derive(Clone, Debug, Default)]
pub struct TargetOpts {
    /// Draw-order key among targets sharing a context (ascending).
    pub sort_key: SortKey,
    /// Threading model for this target. `None` uses [`SchedulerOpts::default_threading`].
    pub threading: Option<ThreadingModel>,
}

/// Outcome of one dispatch/join round.
#[derive(Debug, Default)]
pub(crate) struct Round {
    pub(crate) reports: Vec<TaskReport>,
    pub(crate) dispatched: u64,
    pub(crate) completed: u64,
}

impl Round {
    pub(crate) fn sum(&self, field: impl Fn(&TaskReport) -> u64) -> u64 {
        self.reports.iter().map(field).sum()
    }
}

/// Frame-pipeline scheduler.
///
/// Every method takes `&mut self`, so mutations can never overlap a frame task; the remaining
/// "between `render_frame` and `flip_frame`" window is guarded at runtime through [`FlipState`].
pub struct Scheduler {
    opts: SchedulerOpts,
    observer: Arc<dyn FrameObserver>,
    driving: StageRunner,
    workers: BTreeMap<String, IdleWorker>,
    targets: BTreeMap<TargetId, Arc<TargetSlot>>,
    next_target: u64,
    next_callback: u64,
    flip_state: FlipState,
    frame: FrameNumber,
    dirty: bool,
    poisoned: Option<String>,
}

impl Scheduler {
    /// Create a scheduler with no targets and no worker threads.
    pub fn new(opts: SchedulerOpts) -> SchedulerResult<Self> {
        Self::with_observer(opts, Arc::new(NoopObserver))
    }

    /// Like [`Scheduler::new`], reporting task and frame events to `observer`.
    pub fn with_observer(
        opts: SchedulerOpts,
        observer: Arc<dyn FrameObserver>,
    ) -> SchedulerResult<Self> {
        opts.validate()?;
        let driving = StageRunner::new(StageContext::Driving, WorkQueue::new(), observer.clone());
        Ok(Self {
            opts,
            observer,
            driving,
            workers: BTreeMap::new(),
            targets: BTreeMap::new(),
            next_target: 0,
            next_callback: 0,
            flip_state: FlipState::Flip,
            frame: FrameNumber::default(),
            dirty: false,
            poisoned: None,
        })
    }

    pub fn opts(&self) -> &SchedulerOpts {
        &self.opts
    }

    pub fn flip_state(&self) -> FlipState {
        self.flip_state
    }

    /// Number of the last frame started by `render_frame` (0 before the first).
    pub fn frame_number(&self) -> FrameNumber {
        self.frame
    }

    /// `true` once a worker was lost or timed out; every further frame operation fails.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Worker contexts spawned so far, in name order.
    pub fn worker_contexts(&self) -> Vec<StageContext> {
        self.workers.keys().map(StageContext::named).collect()
    }

    /// Ids of every target the scheduler still owns, in creation order.
    pub fn target_ids(&self) -> Vec<TargetId> {
        self.targets.keys().copied().collect()
    }

    pub fn target_state(&self, id: TargetId) -> Option<TargetState> {
        self.targets.get(&id).map(|slot| slot.state())
    }

    pub fn target_assignment(&self, id: TargetId) -> Option<StageAssignment> {
        self.targets.get(&id).map(|slot| slot.assignment())
    }

    pub fn sort_key(&self, id: TargetId) -> Option<SortKey> {
        self.targets.get(&id).map(|slot| slot.sort_key())
    }

    fn slot(&self, id: TargetId) -> SchedulerResult<Arc<TargetSlot>> {
        self.targets
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::UnknownTarget(id))
    }

    fn check_usable(&self) -> SchedulerResult<()> {
        match &self.poisoned {
            Some(reason) => Err(SchedulerError::poisoned(reason.clone())),
            None => Ok(()),
        }
    }

    /// Reject queue mutations while a frame is between `render_frame` and `flip_frame`.
    fn guard_mutation(&self, op: &str) -> SchedulerResult<()> {
        self.check_usable()?;
        if self.flip_state != FlipState::Flip {
            warn!(op, state = ?self.flip_state, "mutation rejected; frame in flight");
            return Err(SchedulerError::frame_in_flight(format!(
                "{op} called while flip state is {:?}",
                self.flip_state
            )));
        }
        Ok(())
    }

    /// Queue of the runner for `ctx`, spawning the worker on first reference.
    fn queue_for(&mut self, ctx: &StageContext) -> SchedulerResult<Arc<WorkQueue>> {
        let name = match ctx {
            StageContext::Driving => return Ok(self.driving.queue().clone()),
            StageContext::Worker(name) => name,
        };
        if let Some(worker) = self.workers.get(name) {
            return Ok(worker.queue().clone());
        }
        self.check_usable()?;
        let runner = StageRunner::new(ctx.clone(), WorkQueue::new(), self.observer.clone());
        let thread_name = format!("{}-{}", self.opts.thread_name_prefix, name);
        let worker = IdleWorker::spawn(runner, thread_name)?;
        let queue = worker.queue().clone();
        self.workers.insert(name.clone(), worker);
        Ok(queue)
    }

    /// Queue of the runner for `ctx` if it exists; never spawns.
    fn existing_queue(&self, ctx: &StageContext) -> Option<Arc<WorkQueue>> {
        match ctx {
            StageContext::Driving => Some(self.driving.queue().clone()),
            StageContext::Worker(name) => self.workers.get(name).map(|w| w.queue().clone()),
        }
    }

    fn all_queues(&self) -> impl Iterator<Item = &Arc<WorkQueue>> {
        std::iter::once(self.driving.queue()).chain(self.workers.values().map(|w| w.queue()))
    }

    /// Dispatch `task` to every worker whose queue `wants` it, run it on the driving context,
    /// then join every dispatched worker.
    ///
    /// Every dispatched worker is joined even when an earlier one failed; the first failure is
    /// returned and poisons the scheduler.
    fn broadcast(
        &mut self,
        task: Task,
        wants: impl Fn(&QueueState) -> bool,
    ) -> SchedulerResult<Round> {
        self.check_usable()?;
        let timeout = self.opts.join_timeout();
        let mut first_err: Option<SchedulerError> = None;
        let mut busy: Vec<(String, BusyWorker)> = Vec::with_capacity(self.workers.len());

        for (name, worker) in std::mem::take(&mut self.workers) {
            let wanted = {
                let q = worker.queue().lock();
                wants(&*q)
            };
            if !wanted {
                self.workers.insert(name, worker);
                continue;
            }
            match worker.dispatch(task) {
                Ok(b) => busy.push((name, b)),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }

        let mut round = Round {
            dispatched: busy.len() as u64,
            ..Round::default()
        };
        round.reports.push(self.driving.execute(task));

        for (name, b) in busy {
            match b.join(timeout) {
                Ok((worker, report)) => {
                    self.workers.insert(name, worker);
                    round.reports.push(report);
                    round.completed += 1;
                }
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_err {
            self.poisoned = Some(err.to_string());
            return Err(err);
        }
        debug!(
            ?task,
            dispatched = round.dispatched,
            completed = round.completed,
            "round joined"
        );
        Ok(round)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers.keys().collect::<Vec<_>>())
            .field("targets", &self.targets.len())
            .field("flip_state", &self.flip_state)
            .field("frame", &self.frame)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(err) = self.terminate_threads() {
            warn!(%err, "scheduler teardown failed");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/broadcast.rs"]
mod tests;
