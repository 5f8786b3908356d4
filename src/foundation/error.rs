use std::time::Duration;

use crate::foundation::core::TargetId;
use crate::scheduler::FlipState;

/// Convenience result type used throughout the crate.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Top-level error type for scheduler operations.
///
/// Per-target collaborator failures (a failed `open` or `begin_frame`) never show up here; they
/// are logged and the target is skipped. These variants cover caller mistakes and lost workers.
#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    /// Invalid input (threading-model descriptor, options).
    #[error("validation error: {0}")]
    Validation(String),

    /// The target id is not (or no longer) owned by the scheduler.
    #[error("unknown render target {0}")]
    UnknownTarget(TargetId),

    /// A queue mutation was attempted between `render_frame` and the matching `flip_frame`.
    #[error("frame in flight: {0}")]
    FrameInFlight(String),

    /// `flip_frame` was called before `sync_frame`.
    #[error("flip requested while flip state is {state:?}")]
    FlipOutOfOrder {
        /// Flip state observed when the flip was requested.
        state: FlipState,
    },

    /// A worker thread hung up its end of the handshake (panicked or exited).
    #[error("stage worker '{context}' is gone")]
    WorkerLost {
        /// Name of the worker context.
        context: String,
    },

    /// A worker did not acknowledge its task within the configured join timeout.
    #[error("stage worker '{context}' did not return to wait within {waited:?}")]
    WorkerUnresponsive {
        /// Name of the worker context.
        context: String,
        /// How long the driving context waited.
        waited: Duration,
    },

    /// An earlier worker failure left the scheduler unusable.
    #[error("scheduler poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SchedulerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn frame_in_flight(msg: impl Into<String>) -> Self {
        Self::FrameInFlight(msg.into())
    }

    pub fn poisoned(msg: impl Into<String>) -> Self {
        Self::Poisoned(msg.into())
    }

    pub fn worker_lost(context: impl Into<String>) -> Self {
        Self::WorkerLost {
            context: context.into(),
        }
    }
}
