use std::path::Path;
use std::time::Duration;

use crate::config::threading::ThreadingModel;
use crate::foundation::error::{SchedulerError, SchedulerResult};

/// Options controlling a [`crate::Scheduler`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerOpts {
    /// Threading model used by `make_target` when the caller does not pass one.
    pub default_threading: ThreadingModel,
    /// Upper bound on how long the driving context waits for a worker to acknowledge a task.
    ///
    /// `None` waits forever: a stalled collaborator stalls the frame. When set, expiry is
    /// reported as `WorkerUnresponsive` and the scheduler refuses further frames.
    pub join_timeout_ms: Option<u64>,
    /// Prefix for worker OS thread names (`{prefix}-{context}`).
    pub thread_name_prefix: String,
    /// Let `run_frame` open targets that are not open yet before rendering.
    pub auto_open: bool,
}

impl Default for SchedulerOpts {
    fn default() -> Self {
        Self {
            default_threading: ThreadingModel::default(),
            join_timeout_ms: None,
            thread_name_prefix: "framepipe".to_string(),
            auto_open: true,
        }
    }
}

impl SchedulerOpts {
    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.join_timeout_ms == Some(0) {
            return Err(SchedulerError::validation(
                "join_timeout_ms must be >= 1 when set",
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(SchedulerError::validation(
                "thread_name_prefix must not be empty",
            ));
        }
        Ok(())
    }

    /// Parse and validate options from JSON text.
    pub fn from_json_str(json: &str) -> SchedulerResult<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| SchedulerError::validation(format!("scheduler options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read and validate options from a JSON file.
    pub fn from_json_file(path: &Path) -> SchedulerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::Other(
                anyhow::Error::new(e).context(format!("read '{}'", path.display())),
            )
        })?;
        Self::from_json_str(&text)
    }
}
