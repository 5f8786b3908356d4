use std::fmt;
use std::sync::Arc;

use crate::foundation::core::FrameNumber;
use crate::stage::assignment::StageContext;

/// When a registered callback runs relative to its context's frame task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackTime {
    PreFrame,
    PostFrame,
}

/// Handle returned by `add_callback`, used to remove the callback again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(pub(crate) u64);

/// What a callback learns about the frame it runs in.
#[derive(Clone, Copy, Debug)]
pub struct CallbackData<'a> {
    pub context: &'a StageContext,
    pub frame: FrameNumber,
    pub time: CallbackTime,
}

pub(crate) type CallbackFn = Arc<dyn Fn(&CallbackData<'_>) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct RegisteredCallback {
    pub(crate) id: CallbackId,
    pub(crate) time: CallbackTime,
    pub(crate) func: CallbackFn,
}

impl fmt::Debug for RegisteredCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCallback")
            .field("id", &self.id)
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}
