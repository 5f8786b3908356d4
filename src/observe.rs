//! Instrumentation hooks.
//!
//! Observers see task dispatch/completion and per-target skips from every context. They are
//! called from worker threads, so implementations must be cheap and thread-safe.

use crate::foundation::core::{FrameNumber, TargetId};
use crate::stage::assignment::{Stage, StageContext};
use crate::stage::task::{TaskKind, TaskReport};

/// Why a target was left out of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OpenFailed,
    BeginFrameFailed,
}

/// Per-frame totals returned by `render_frame` and `run_frame`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrameStats {
    pub frame: FrameNumber,
    /// Targets that completed `begin_frame` .. `end_frame`.
    pub targets_drawn: u64,
    /// Targets skipped because a collaborator call failed.
    pub targets_skipped: u64,
    /// Regions drawn across all targets.
    pub regions_drawn: u64,
    /// Worker tasks handed out during the frame.
    pub tasks_dispatched: u64,
    /// Worker tasks acknowledged before the frame returned.
    pub tasks_completed: u64,
}

impl FrameStats {
    pub(crate) fn absorb(&mut self, report: &TaskReport) {
        self.targets_drawn += report.targets_drawn;
        self.targets_skipped += report.targets_skipped;
        self.regions_drawn += report.regions_drawn;
    }
}

/// Injected instrumentation interface. Every method has a no-op default.
pub trait FrameObserver: Send + Sync {
    fn task_started(&self, _ctx: &StageContext, _kind: TaskKind) {}

    fn task_finished(&self, _report: &TaskReport) {}

    fn target_skipped(
        &self,
        _ctx: &StageContext,
        _target: TargetId,
        _stage: Stage,
        _reason: SkipReason,
    ) {
    }

    /// Called on the driving context once every worker has acknowledged the frame.
    fn frame_finished(&self, _stats: &FrameStats) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl FrameObserver for NoopObserver {}
