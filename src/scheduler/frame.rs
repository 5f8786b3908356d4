use tracing::{debug, info, warn};

use super::{FlipState, Scheduler};
use crate::foundation::error::{SchedulerError, SchedulerResult};
use crate::observe::FrameStats;
use crate::stage::assignment::Stage;
use crate::stage::task::Task;
use crate::target::slot::TargetState;

impl Scheduler {
    /// Cull and draw one frame on every context, returning once all workers are back in `Wait`.
    ///
    /// Resorts first when the pipeline is dirty. Targets whose cull and draw contexts differ have
    /// this frame's cull output latched for the next frame's draw. Close requests raised while
    /// servicing window events are honored once every worker has joined. Pending flips of a
    /// previous frame that was never flipped are discarded first.
    #[tracing::instrument(skip(self))]
    pub fn render_frame(&mut self) -> SchedulerResult<FrameStats> {
        self.check_usable()?;
        if self.dirty {
            self.resort_targets();
        }
        if self.flip_state != FlipState::Flip {
            let discarded = self
                .targets
                .values()
                .filter(|slot| slot.discard_flip())
                .count();
            debug!(state = ?self.flip_state, discarded, "previous frame was not flipped");
        }
        self.flip_state = FlipState::Drawing;
        self.frame = self.frame.next();
        let frame = self.frame;

        let round = self.broadcast(Task::Frame(frame), |_| true)?;

        let mut stats = FrameStats {
            frame,
            tasks_dispatched: round.dispatched,
            tasks_completed: round.completed,
            ..FrameStats::default()
        };
        for report in &round.reports {
            stats.absorb(report);
        }

        for slot in self.targets.values() {
            if slot.assignment().splits_cull_and_draw() {
                slot.latch_culled();
            }
        }
        self.honor_close_requests();

        debug!(
            frame = %frame,
            drawn = stats.targets_drawn,
            skipped = stats.targets_skipped,
            "frame rendered"
        );
        self.observer.frame_finished(&stats);
        Ok(stats)
    }

    /// Wait for every drawn target to be ready to flip, then allow `flip_frame`.
    ///
    /// `ready_flip` runs on each target's draw context, and every context has returned before this
    /// does.
    pub fn sync_frame(&mut self) -> SchedulerResult<()> {
        self.check_usable()?;
        match self.flip_state {
            FlipState::Drawing => {}
            FlipState::Sync => return Ok(()),
            FlipState::Flip => {
                debug!("sync_frame without a rendered frame");
                return Ok(());
            }
        }
        self.broadcast(Task::ReadyFlip, |q| {
            q.has_targets(Stage::Draw) || q.has_pending()
        })?;
        self.flip_state = FlipState::Sync;
        Ok(())
    }

    /// Flip every target drawn this frame, on its draw context. Requires `sync_frame` first.
    ///
    /// Returns the number of targets flipped.
    #[tracing::instrument(skip(self))]
    pub fn flip_frame(&mut self) -> SchedulerResult<u64> {
        self.check_usable()?;
        if self.flip_state != FlipState::Sync {
            warn!(state = ?self.flip_state, "flip_frame before sync_frame; nothing flipped");
            return Err(SchedulerError::FlipOutOfOrder {
                state: self.flip_state,
            });
        }
        let round = self.broadcast(Task::Flip, |q| {
            q.has_targets(Stage::Draw) || q.has_pending()
        })?;
        self.flip_state = FlipState::Flip;
        Ok(round.sum(|r| r.targets_flipped))
    }

    /// Open every not-yet-open target on its window context and pump window events once.
    ///
    /// Each distinct window context receives exactly one request. Returns the number of targets
    /// opened; targets that fail to open end up `Closed`.
    #[tracing::instrument(skip(self))]
    pub fn open_targets(&mut self) -> SchedulerResult<u64> {
        self.guard_mutation("open_targets")?;
        let round = self.broadcast(Task::WindowEvents, |q| {
            q.has_targets(Stage::Window) || q.has_pending()
        })?;
        self.honor_close_requests();
        let opened = round.sum(|r| r.targets_opened);
        if opened > 0 {
            info!(opened, "targets opened");
        }
        Ok(opened)
    }

    /// `open_targets` (when enabled and needed), `render_frame`, `sync_frame` and `flip_frame`.
    pub fn run_frame(&mut self) -> SchedulerResult<FrameStats> {
        let needs_open = self
            .targets
            .values()
            .any(|slot| slot.state() == TargetState::Unopened);
        if self.opts.auto_open && needs_open {
            self.open_targets()?;
        }
        let stats = self.render_frame()?;
        self.sync_frame()?;
        self.flip_frame()?;
        Ok(stats)
    }

    fn honor_close_requests(&mut self) {
        let requested: Vec<_> = self
            .targets
            .values()
            .filter(|slot| slot.state() == TargetState::CloseRequested)
            .cloned()
            .collect();
        for slot in requested {
            info!(target_id = %slot.id(), name = slot.name(), "closing on request");
            self.retire(&slot);
        }
    }
}
