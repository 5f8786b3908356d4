//! Worker threads and the driving-context side of their handshake.
//!
//! Each worker owns a single-slot request channel and a single-slot acknowledgement channel.
//! The worker sits in `Wait` (blocked on the request channel), executes whatever task arrives,
//! sends back a [`TaskReport`] and returns to `Wait`. Only the driving context sends requests and
//! only the worker sends acknowledgements.
//!
//! The two handle types encode the protocol: a task can only be dispatched through an
//! [`IdleWorker`], which turns into a [`BusyWorker`] that must be joined before the next dispatch.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context as _;
use tracing::{debug, error, info};

use crate::foundation::error::{SchedulerError, SchedulerResult};
use crate::stage::assignment::StageContext;
use crate::stage::queue::WorkQueue;
use crate::stage::runner::StageRunner;
use crate::stage::task::{Task, TaskKind, TaskReport};

/// A worker known to be in `Wait`.
pub(crate) struct IdleWorker {
    ctx: StageContext,
    queue: Arc<WorkQueue>,
    requests: SyncSender<Task>,
    acks: Receiver<TaskReport>,
    thread: JoinHandle<()>,
}

/// A worker that was handed a task and has not acknowledged it yet.
pub(crate) struct BusyWorker {
    idle: IdleWorker,
    kind: TaskKind,
}

impl IdleWorker {
    pub(crate) fn spawn(runner: StageRunner, thread_name: String) -> SchedulerResult<Self> {
        let (req_tx, req_rx) = mpsc::sync_channel::<Task>(1);
        let (ack_tx, ack_rx) = mpsc::sync_channel::<TaskReport>(1);
        let ctx = runner.context().clone();
        let queue = runner.queue().clone();

        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || worker_main(runner, req_rx, ack_tx))
            .with_context(|| format!("spawn stage worker thread '{thread_name}'"))?;
        info!(context = %ctx, thread = %thread_name, "stage worker started");

        Ok(Self {
            ctx,
            queue,
            requests: req_tx,
            acks: ack_rx,
            thread,
        })
    }

    pub(crate) fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Move the worker out of `Wait`. Does not block beyond the (empty) request slot.
    pub(crate) fn dispatch(self, task: Task) -> SchedulerResult<BusyWorker> {
        if self.requests.send(task).is_err() {
            error!(context = %self.ctx, ?task, "stage worker hung up before dispatch");
            return Err(SchedulerError::worker_lost(self.ctx.name()));
        }
        debug!(context = %self.ctx, ?task, "dispatched");
        Ok(BusyWorker {
            idle: self,
            kind: task.kind(),
        })
    }

    /// Terminate the worker and join its thread.
    pub(crate) fn terminate(self, timeout: Option<Duration>) -> SchedulerResult<()> {
        let busy = self.dispatch(Task::Terminate)?;
        let (idle, _) = busy.join(timeout)?;
        let IdleWorker { ctx, thread, .. } = idle;
        thread
            .join()
            .map_err(|_| SchedulerError::worker_lost(ctx.name()))?;
        info!(context = %ctx, "stage worker stopped");
        Ok(())
    }
}

impl BusyWorker {
    /// Block until the worker acknowledges its task and is back in `Wait`.
    ///
    /// With `timeout == None` this waits forever, so a stalled collaborator stalls the caller.
    pub(crate) fn join(
        self,
        timeout: Option<Duration>,
    ) -> SchedulerResult<(IdleWorker, TaskReport)> {
        let ctx = &self.idle.ctx;
        let report = match timeout {
            None => self
                .idle
                .acks
                .recv()
                .map_err(|_| SchedulerError::worker_lost(ctx.name())),
            Some(waited) => match self.idle.acks.recv_timeout(waited) {
                Ok(report) => Ok(report),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(SchedulerError::worker_lost(ctx.name()))
                }
                Err(RecvTimeoutError::Timeout) => Err(SchedulerError::WorkerUnresponsive {
                    context: ctx.name().to_string(),
                    waited,
                }),
            },
        };
        match report {
            Ok(report) => {
                debug!(context = %ctx, kind = ?self.kind, "joined");
                Ok((self.idle, report))
            }
            Err(err) => {
                error!(
                    context = %ctx,
                    kind = ?self.kind,
                    %err,
                    "stage worker failed to return to wait"
                );
                Err(err)
            }
        }
    }
}

fn worker_main(runner: StageRunner, requests: Receiver<Task>, acks: SyncSender<TaskReport>) {
    let span = tracing::debug_span!("stage_worker", context = %runner.context());
    let _enter = span.enter();

    while let Ok(task) = requests.recv() {
        let report = runner.execute(task);
        if acks.send(report).is_err() || task == Task::Terminate {
            break;
        }
    }
    debug!("stage worker exiting");
}
