use std::fmt;

/// One of the three decomposable units of per-target frame work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Window-system event servicing (and opening the window).
    Window,
    /// Producing drawable lists for each display region.
    Cull,
    /// Issuing GPU commands for culled lists.
    Draw,
}

impl Stage {
    /// All stages, in the order they run for one target within a frame.
    pub const ALL: [Stage; 3] = [Stage::Window, Stage::Cull, Stage::Draw];
}

/// Execution context a stage is bound to.
///
/// `Driving` is whichever thread calls into the [`crate::Scheduler`]; `Worker(name)` is a
/// long-lived background thread, spawned the first time the name is referenced.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum StageContext {
    #[default]
    Driving,
    Worker(String),
}

impl StageContext {
    /// Build a context from a descriptor name; the empty name is the driving context.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Self::Driving
        } else {
            Self::Worker(name)
        }
    }

    pub fn is_driving(&self) -> bool {
        matches!(self, Self::Driving)
    }

    /// Descriptor name of the context (`""` for the driving context).
    pub fn name(&self) -> &str {
        match self {
            Self::Driving => "",
            Self::Worker(name) => name,
        }
    }
}

impl fmt::Display for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driving => f.write_str("<driving>"),
            Self::Worker(name) => f.write_str(name),
        }
    }
}

/// Which context services each stage of one target.
///
/// The window context must be the one that receives window-system events for the target; all
/// window-system calls for a given window are serialized through it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StageAssignment {
    pub window: StageContext,
    pub cull: StageContext,
    pub draw: StageContext,
}

impl StageAssignment {
    /// All three stages on the driving context.
    pub fn driving() -> Self {
        Self::default()
    }

    pub fn new(window: StageContext, cull: StageContext, draw: StageContext) -> Self {
        Self { window, cull, draw }
    }

    /// All three stages on one context.
    pub fn single(ctx: StageContext) -> Self {
        Self {
            window: ctx.clone(),
            cull: ctx.clone(),
            draw: ctx,
        }
    }

    pub fn context_for(&self, stage: Stage) -> &StageContext {
        match stage {
            Stage::Window => &self.window,
            Stage::Cull => &self.cull,
            Stage::Draw => &self.draw,
        }
    }

    /// `true` when cull output must cross a context boundary to reach the draw stage.
    pub fn splits_cull_and_draw(&self) -> bool {
        self.cull != self.draw
    }

    /// Distinct worker contexts referenced by this assignment, in stage order.
    pub fn worker_contexts(&self) -> Vec<&StageContext> {
        let mut out: Vec<&StageContext> = Vec::with_capacity(3);
        for stage in Stage::ALL {
            let ctx = self.context_for(stage);
            if !ctx.is_driving() && !out.contains(&ctx) {
                out.push(ctx);
            }
        }
        out
    }
}
