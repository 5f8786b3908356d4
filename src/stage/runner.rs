use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::foundation::core::FrameNumber;
use crate::observe::{FrameObserver, SkipReason};
use crate::stage::assignment::{Stage, StageContext};
use crate::stage::callback::{CallbackData, CallbackTime};
use crate::stage::queue::{QueueState, WorkQueue};
use crate::stage::task::{Task, TaskReport};
use crate::target::slot::{TargetSlot, TargetState};

/// Executes tasks over one [`WorkQueue`] on behalf of one context.
///
/// The driving context calls [`StageRunner::execute`] in-line; a worker thread calls it from its
/// wait loop. Either way the queue lock is held for the whole task.
#[derive(Clone)]
pub(crate) struct StageRunner {
    ctx: StageContext,
    queue: Arc<WorkQueue>,
    observer: Arc<dyn FrameObserver>,
}

impl StageRunner {
    pub(crate) fn new(
        ctx: StageContext,
        queue: Arc<WorkQueue>,
        observer: Arc<dyn FrameObserver>,
    ) -> Self {
        Self {
            ctx,
            queue,
            observer,
        }
    }

    pub(crate) fn context(&self) -> &StageContext {
        &self.ctx
    }

    pub(crate) fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub(crate) fn execute(&self, task: Task) -> TaskReport {
        let kind = task.kind();
        self.observer.task_started(&self.ctx, kind);
        debug!(context = %self.ctx, ?task, "task started");

        let mut report = TaskReport::new(self.ctx.clone(), kind);
        let mut q = self.queue.lock();
        match task {
            Task::Frame(frame) => {
                run_callbacks(&q, &self.ctx, frame, CallbackTime::PreFrame);
                self.frame(&q, &mut report);
            }
            Task::ReadyFlip => ready_flip(&q),
            Task::Flip => flip(&q, &mut report),
            Task::Release => release(&q, &mut report),
            Task::WindowEvents => self.window_events(&q, &mut report),
            Task::Close => close(&q, &mut report),
            Task::Terminate => {}
        }

        let drained = q.drain_pending();
        report.targets_released += drained.released;
        report.targets_closed += drained.closed;

        if let Task::Frame(frame) = task {
            run_callbacks(&q, &self.ctx, frame, CallbackTime::PostFrame);
        }
        drop(q);

        debug!(context = %self.ctx, ?task, "task finished");
        self.observer.task_finished(&report);
        report
    }

    fn frame(&self, q: &QueueState, report: &mut TaskReport) {
        for slot in q.targets(Stage::Window) {
            if slot.is_open() {
                self.service_window(slot, report);
            }
        }

        for slot in q.targets(Stage::Cull) {
            if !slot.is_open() {
                continue;
            }
            let target = slot.target();
            let mut regions = target.display_regions();
            regions.retain(|r| r.active);
            regions.sort_by_key(|r| r.sort);
            trace!(target_id = %slot.id(), regions = regions.len(), "cull");
            let lists = regions.iter().map(|r| target.cull(r)).collect();
            slot.stage_culled(lists);
        }

        for slot in q.targets(Stage::Draw) {
            if !slot.is_open() {
                continue;
            }
            let target = slot.target();
            let lists = slot.take_for_draw(&self.ctx);
            if !target.begin_frame() {
                warn!(
                    context = %self.ctx,
                    target_id = %slot.id(),
                    name = slot.name(),
                    "begin_frame failed; skipping target this frame"
                );
                report.targets_skipped += 1;
                self.observer.target_skipped(
                    &self.ctx,
                    slot.id(),
                    Stage::Draw,
                    SkipReason::BeginFrameFailed,
                );
                continue;
            }
            trace!(target_id = %slot.id(), "draw");
            for list in lists.iter().flatten() {
                target.draw(list);
                report.regions_drawn += 1;
            }
            target.end_frame();
            slot.mark_drawn();
            report.targets_drawn += 1;
        }
    }

    fn window_events(&self, q: &QueueState, report: &mut TaskReport) {
        for slot in q.targets(Stage::Window) {
            if slot.state() == TargetState::Unopened {
                if slot.target().open() {
                    debug!(
                        context = %self.ctx,
                        target_id = %slot.id(),
                        name = slot.name(),
                        "opened"
                    );
                    slot.set_state(TargetState::Open);
                    report.targets_opened += 1;
                } else {
                    warn!(
                        context = %self.ctx,
                        target_id = %slot.id(),
                        name = slot.name(),
                        "open failed; target will not be rendered"
                    );
                    slot.set_state(TargetState::Closed);
                    report.targets_skipped += 1;
                    self.observer.target_skipped(
                        &self.ctx,
                        slot.id(),
                        Stage::Window,
                        SkipReason::OpenFailed,
                    );
                    continue;
                }
            }
            if slot.is_open() {
                self.service_window(slot, report);
            }
        }
    }

    fn service_window(&self, slot: &TargetSlot, report: &mut TaskReport) {
        slot.target().process_window_events();
        if slot.target().close_requested() && slot.request_close() {
            debug!(context = %self.ctx, target_id = %slot.id(), "window asked to close");
            report.close_requests += 1;
        }
    }
}

fn ready_flip(q: &QueueState) {
    for slot in q.targets(Stage::Draw) {
        if slot.is_flip_pending() && slot.is_open() {
            trace!(target_id = %slot.id(), "ready_flip");
            slot.target().ready_flip();
        }
    }
}

fn flip(q: &QueueState, report: &mut TaskReport) {
    for slot in q.targets(Stage::Draw) {
        if slot.take_flip_pending() && slot.is_open() {
            trace!(target_id = %slot.id(), "flip");
            slot.target().flip();
            report.targets_flipped += 1;
        }
    }
}

fn release(q: &QueueState, report: &mut TaskReport) {
    for slot in q.targets(Stage::Draw) {
        let live = matches!(
            slot.state(),
            TargetState::Open | TargetState::CloseRequested
        );
        if live && !slot.is_released() {
            slot.target().release();
            slot.mark_released();
            report.targets_released += 1;
        }
    }
}

fn close(q: &QueueState, report: &mut TaskReport) {
    for slot in q.targets(Stage::Window) {
        match slot.state() {
            TargetState::Open | TargetState::CloseRequested | TargetState::Closing => {
                slot.target().close();
                slot.set_state(TargetState::Closed);
                report.targets_closed += 1;
            }
            TargetState::Unopened => slot.set_state(TargetState::Closed),
            TargetState::Closed => {}
        }
    }
}

fn run_callbacks(q: &QueueState, ctx: &StageContext, frame: FrameNumber, time: CallbackTime) {
    let data = CallbackData {
        context: ctx,
        frame,
        time,
    };
    for cb in q.callbacks.iter().filter(|cb| cb.time == time) {
        (cb.func)(&data);
    }
}
