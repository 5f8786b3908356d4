use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Mutex, RwLock};

use crate::foundation::core::{SortKey, TargetId};
use crate::foundation::sync::{lock, read, write};
use crate::stage::assignment::{StageAssignment, StageContext};
use crate::target::{DrawableList, RenderTarget};

/// Lifecycle of a target as seen by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// Created but not opened yet; waits for `open_targets`.
    Unopened,
    /// Scheduled for window, cull, draw and flip work.
    Open,
    /// The window system asked to close it during a frame; unscheduled at the frame boundary.
    CloseRequested,
    /// Unscheduled; release and close are queued on the owning contexts.
    Closing,
    /// Closed (or failed to open). Never touched by a stage again.
    Closed,
}

/// Cull output crossing from the cull stage to the draw stage.
///
/// `staged` is written by the cull stage during a frame. When cull and draw share a context the
/// draw stage takes `staged` directly, later in the same task. Otherwise the driving context
/// moves `staged` into `latched` at the frame barrier and the draw stage consumes `latched` one
/// frame later, so the two contexts never touch the same list concurrently.
#[derive(Debug, Default)]
struct CullHandoff {
    staged: Option<Vec<DrawableList>>,
    latched: Option<Vec<DrawableList>>,
}

/// Scheduler-side record wrapping one [`RenderTarget`].
pub(crate) struct TargetSlot {
    id: TargetId,
    target: Box<dyn RenderTarget>,
    sort_key: AtomicI32,
    state: Mutex<TargetState>,
    // Written by the driving context only, outside a frame.
    assignment: RwLock<StageAssignment>,
    handoff: Mutex<CullHandoff>,
    flip_pending: AtomicBool,
    released: AtomicBool,
}

impl TargetSlot {
    pub(crate) fn new(
        id: TargetId,
        target: Box<dyn RenderTarget>,
        sort_key: SortKey,
        assignment: StageAssignment,
    ) -> Self {
        Self {
            id,
            target,
            sort_key: AtomicI32::new(sort_key),
            state: Mutex::new(TargetState::Unopened),
            assignment: RwLock::new(assignment),
            handoff: Mutex::new(CullHandoff::default()),
            flip_pending: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> TargetId {
        self.id
    }

    pub(crate) fn target(&self) -> &dyn RenderTarget {
        self.target.as_ref()
    }

    pub(crate) fn name(&self) -> &str {
        self.target.name()
    }

    pub(crate) fn sort_key(&self) -> SortKey {
        self.sort_key.load(Ordering::Acquire)
    }

    pub(crate) fn set_sort_key(&self, key: SortKey) {
        self.sort_key.store(key, Ordering::Release);
    }

    /// Queue ordering: ascending sort key, creation order on ties.
    pub(crate) fn order_key(&self) -> (SortKey, TargetId) {
        (self.sort_key(), self.id)
    }

    pub(crate) fn state(&self) -> TargetState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: TargetState) {
        *lock(&self.state) = state;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == TargetState::Open
    }

    /// Flag a close requested by the window system. Returns `false` if the target was not open.
    pub(crate) fn request_close(&self) -> bool {
        let mut state = lock(&self.state);
        if *state == TargetState::Open {
            *state = TargetState::CloseRequested;
            true
        } else {
            false
        }
    }

    pub(crate) fn assignment(&self) -> StageAssignment {
        read(&self.assignment).clone()
    }

    pub(crate) fn set_assignment(&self, assignment: StageAssignment) {
        *write(&self.assignment) = assignment;
        self.clear_handoff();
    }

    pub(crate) fn is_culled_on(&self, ctx: &StageContext) -> bool {
        read(&self.assignment).cull == *ctx
    }

    pub(crate) fn stage_culled(&self, lists: Vec<DrawableList>) {
        lock(&self.handoff).staged = Some(lists);
    }

    /// Lists for the draw stage running on `ctx`.
    pub(crate) fn take_for_draw(&self, ctx: &StageContext) -> Option<Vec<DrawableList>> {
        let same_context = self.is_culled_on(ctx);
        let mut handoff = lock(&self.handoff);
        if same_context {
            handoff.staged.take()
        } else {
            handoff.latched.take()
        }
    }

    /// Frame barrier step for targets whose cull and draw contexts differ.
    pub(crate) fn latch_culled(&self) {
        let mut handoff = lock(&self.handoff);
        if let Some(staged) = handoff.staged.take() {
            handoff.latched = Some(staged);
        }
    }

    pub(crate) fn clear_handoff(&self) {
        let mut handoff = lock(&self.handoff);
        handoff.staged = None;
        handoff.latched = None;
    }

    pub(crate) fn mark_drawn(&self) {
        self.flip_pending.store(true, Ordering::Release);
    }

    pub(crate) fn is_flip_pending(&self) -> bool {
        self.flip_pending.load(Ordering::Acquire)
    }

    pub(crate) fn take_flip_pending(&self) -> bool {
        self.flip_pending.swap(false, Ordering::AcqRel)
    }

    /// Drop a drawn frame that was never flipped.
    pub(crate) fn discard_flip(&self) -> bool {
        self.take_flip_pending()
    }

    pub(crate) fn mark_released(&self) {
        self.released.store(true, Ordering::Release);
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TargetSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSlot")
            .field("id", &self.id)
            .field("name", &self.target.name())
            .field("sort_key", &self.sort_key())
            .field("state", &self.state())
            .finish()
    }
}
