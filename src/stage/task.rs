use crate::foundation::core::FrameNumber;
use crate::stage::assignment::StageContext;

/// Request the driving context hands to a runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Task {
    /// Window events, cull, then draw, bracketed by the frame callbacks.
    Frame(FrameNumber),
    /// Prepare every target drawn this frame for its flip.
    ReadyFlip,
    Flip,
    Release,
    /// Open not-yet-open targets, then pump window events.
    WindowEvents,
    Close,
    Terminate,
}

impl Task {
    pub(crate) fn kind(self) -> TaskKind {
        match self {
            Task::Frame(_) => TaskKind::Frame,
            Task::ReadyFlip => TaskKind::ReadyFlip,
            Task::Flip => TaskKind::Flip,
            Task::Release => TaskKind::Release,
            Task::WindowEvents => TaskKind::WindowEvents,
            Task::Close => TaskKind::Close,
            Task::Terminate => TaskKind::Terminate,
        }
    }
}

/// Kind of task a runner executed; see [`TaskReport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Frame,
    ReadyFlip,
    Flip,
    Release,
    WindowEvents,
    Close,
    Terminate,
}

/// Acknowledgement a runner produces for every task. For workers, receiving it on the driving
/// context is what "back in `Wait`" means.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TaskReport {
    pub context: StageContext,
    pub kind: TaskKind,
    pub targets_opened: u64,
    pub targets_drawn: u64,
    pub targets_skipped: u64,
    pub regions_drawn: u64,
    pub targets_flipped: u64,
    pub targets_released: u64,
    pub targets_closed: u64,
    /// Targets whose window asked to close during this task.
    pub close_requests: u64,
}

impl TaskReport {
    pub(crate) fn new(context: StageContext, kind: TaskKind) -> Self {
        Self {
            context,
            kind,
            targets_opened: 0,
            targets_drawn: 0,
            targets_skipped: 0,
            regions_drawn: 0,
            targets_flipped: 0,
            targets_released: 0,
            targets_closed: 0,
            close_requests: 0,
        }
    }
}
