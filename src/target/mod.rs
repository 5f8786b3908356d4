//! The render-target collaborator interface.
//!
//! The scheduler never emits graphics commands or talks to a window system itself; everything
//! it does to a target goes through [`RenderTarget`]. Window-backed, off-screen and parasite
//! (shared-buffer) targets all implement the same trait.

pub mod headless;
pub(crate) mod slot;

use smallvec::SmallVec;

pub use kurbo::Rect;

/// Broad category of a render target. Informational only; scheduling treats all kinds alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// On-screen window owned by the window system.
    Window,
    /// Off-screen buffer with its own context.
    #[default]
    Offscreen,
    /// Buffer sharing another target's storage and context.
    Parasite,
}

/// A sub-rectangle of a target that is culled and drawn independently.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DisplayRegion {
    /// Index of the region within its target.
    pub index: u32,
    /// Viewport in normalized target coordinates (`0..1` on both axes).
    pub viewport: Rect,
    /// Regions of one target are culled and drawn in ascending `sort` order.
    pub sort: i32,
    /// Inactive regions are skipped entirely.
    pub active: bool,
}

impl DisplayRegion {
    /// An active region covering the whole target.
    pub fn full(index: u32) -> Self {
        Self {
            index,
            viewport: Rect::new(0.0, 0.0, 1.0, 1.0),
            sort: 0,
            active: true,
        }
    }
}

/// Opaque handle to one drawable produced by culling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawItem(pub u64);

/// Ordered drawables culled for one display region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawableList {
    /// Index of the region these drawables were culled for.
    pub region: u32,
    pub items: SmallVec<[DrawItem; 8]>,
}

impl DrawableList {
    pub fn new(region: u32) -> Self {
        Self {
            region,
            items: SmallVec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Capability set the scheduler needs from a render destination.
///
/// Methods take `&self`: one target is touched from up to three contexts (window, cull, draw),
/// never concurrently for the same stage, so implementations keep their own interior state.
/// Failures are reported as `false` and never cross the stage boundary as errors.
///
/// Calls for one target within a frame follow stage order: window events, then `cull` for every
/// active region, then `begin_frame` / `draw` / `end_frame`. `flip` happens only after every
/// drawn target has been through `ready_flip`.
pub trait RenderTarget: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> TargetKind {
        TargetKind::Offscreen
    }

    /// Create the window or buffer and its context. Called on the window-stage context.
    fn open(&self) -> bool;

    /// Destroy the window or buffer. Called on the window-stage context after `release`.
    fn close(&self);

    /// Tear down graphics-context resources. Called on the draw-stage context.
    fn release(&self) {}

    fn display_regions(&self) -> Vec<DisplayRegion> {
        vec![DisplayRegion::full(0)]
    }

    /// Prepare to draw; `false` skips this target's draw and flip for the frame.
    fn begin_frame(&self) -> bool;

    fn cull(&self, region: &DisplayRegion) -> DrawableList;

    fn draw(&self, list: &DrawableList);

    fn end_frame(&self);

    /// Wait for outstanding GPU work so the coming flip is synchronized across targets. Called on
    /// the draw-stage context.
    fn ready_flip(&self) {}

    /// Present the completed frame. Called on the draw-stage context.
    fn flip(&self);

    /// Service window-system messages. Called only on the window-stage context.
    fn process_window_events(&self) {}

    /// `true` once the window system asked for this target to be closed.
    fn close_requested(&self) -> bool {
        false
    }
}
