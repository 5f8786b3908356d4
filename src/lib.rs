//! framepipe is the frame-pipeline scheduler of a real-time renderer.
//!
//! It owns a set of render targets, binds each target's window, cull and draw stages to the
//! driving context or to named long-lived worker threads, and drives every frame through a
//! barrier protocol:
//!
//! - [`Scheduler::open_targets`] opens windows on their window contexts
//! - [`Scheduler::render_frame`] culls and draws on every context and joins all workers
//! - [`Scheduler::sync_frame`] waits until every drawn target can flip
//! - [`Scheduler::flip_frame`] presents every drawn target
//!
//! [`Scheduler::run_frame`] performs all four in sequence. Graphics and window-system work is
//! delegated to [`RenderTarget`] implementations; [`HeadlessTarget`] records calls instead.
#![forbid(unsafe_code)]

mod foundation;

pub mod config;
pub mod observe;
pub mod scheduler;
pub mod stage;
pub mod target;

pub use crate::foundation::core::{FrameNumber, SortKey, TargetId};
pub use crate::foundation::error::{SchedulerError, SchedulerResult};

pub use crate::config::opts::SchedulerOpts;
pub use crate::config::threading::ThreadingModel;
pub use crate::observe::{FrameObserver, FrameStats, NoopObserver, SkipReason};
pub use crate::scheduler::{FlipState, Scheduler, TargetOpts};
pub use crate::stage::assignment::{Stage, StageAssignment, StageContext};
pub use crate::stage::callback::{CallbackData, CallbackId, CallbackTime};
pub use crate::stage::task::{TaskKind, TaskReport};
pub use crate::target::headless::{CallKind, CallLog, CallRecord, HeadlessControls, HeadlessTarget};
pub use crate::target::slot::TargetState;
pub use crate::target::{DisplayRegion, DrawItem, DrawableList, Rect, RenderTarget, TargetKind};
