use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::foundation::sync::lock;
use crate::target::{DisplayRegion, DrawItem, DrawableList, RenderTarget, TargetKind};

/// Collaborator call recorded by a [`HeadlessTarget`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Open,
    WindowEvents,
    Cull,
    BeginFrame,
    Draw,
    EndFrame,
    ReadyFlip,
    Flip,
    Release,
    Close,
}

/// One entry of a [`CallLog`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CallRecord {
    pub target: String,
    pub call: CallKind,
    /// Name of the OS thread that made the call, if it has one.
    pub thread: Option<String>,
}

/// Shared, append-only record of collaborator calls across any number of targets.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, target: &str, call: CallKind) {
        let thread = std::thread::current().name().map(str::to_string);
        lock(&self.records).push(CallRecord {
            target: target.to_string(),
            call,
            thread,
        });
    }

    /// Copy of every record so far, in call order.
    pub fn records(&self) -> Vec<CallRecord> {
        lock(&self.records).clone()
    }

    pub fn clear(&self) {
        lock(&self.records).clear();
    }

    pub fn count(&self, target: &str, call: CallKind) -> usize {
        lock(&self.records)
            .iter()
            .filter(|r| r.call == call && r.target == target)
            .count()
    }

    pub fn total(&self, call: CallKind) -> usize {
        lock(&self.records).iter().filter(|r| r.call == call).count()
    }

    /// Target names in the order `call` was made to them.
    pub fn order_of(&self, call: CallKind) -> Vec<String> {
        lock(&self.records)
            .iter()
            .filter(|r| r.call == call)
            .map(|r| r.target.clone())
            .collect()
    }

    /// Thread names that made `call` on `target`, deduplicated in first-seen order.
    pub fn threads_for(&self, target: &str, call: CallKind) -> Vec<Option<String>> {
        let mut out: Vec<Option<String>> = Vec::new();
        for r in lock(&self.records).iter() {
            if r.call == call && r.target == target && !out.contains(&r.thread) {
                out.push(r.thread.clone());
            }
        }
        out
    }
}

/// Knobs a test or demo can turn after the target has been handed to the scheduler.
#[derive(Debug, Default)]
pub struct HeadlessControls {
    fail_open: AtomicBool,
    fail_begin_frame: AtomicBool,
    close_requested: AtomicBool,
    draw_delay_us: AtomicU64,
}

impl HeadlessControls {
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_begin_frame(&self, fail: bool) {
        self.fail_begin_frame.store(fail, Ordering::Relaxed);
    }

    /// Simulate the user closing the window.
    pub fn request_close(&self) {
        self.close_requested.store(true, Ordering::Relaxed);
    }

    pub fn set_draw_delay(&self, delay: Duration) {
        let us = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.draw_delay_us.store(us, Ordering::Relaxed);
    }

    fn draw_delay(&self) -> Duration {
        Duration::from_micros(self.draw_delay_us.load(Ordering::Relaxed))
    }
}

/// CPU-only [`RenderTarget`] that renders nothing and records every call it receives.
///
/// Useful for tests, demos and measuring scheduler overhead. Culling produces
/// `items_per_region` synthetic drawables per active region.
#[derive(Debug)]
pub struct HeadlessTarget {
    name: String,
    kind: TargetKind,
    regions: u32,
    items_per_region: u32,
    log: CallLog,
    controls: Arc<HeadlessControls>,
}

impl HeadlessTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Offscreen,
            regions: 1,
            items_per_region: 4,
            log: CallLog::new(),
            controls: Arc::new(HeadlessControls::default()),
        }
    }

    /// Record into a shared log instead of a private one.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_kind(mut self, kind: TargetKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_regions(mut self, regions: u32) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_items_per_region(mut self, items: u32) -> Self {
        self.items_per_region = items;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn controls(&self) -> Arc<HeadlessControls> {
        self.controls.clone()
    }
}

impl RenderTarget for HeadlessTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TargetKind {
        self.kind
    }

    fn open(&self) -> bool {
        self.log.push(&self.name, CallKind::Open);
        !self.controls.fail_open.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.log.push(&self.name, CallKind::Close);
    }

    fn release(&self) {
        self.log.push(&self.name, CallKind::Release);
    }

    fn display_regions(&self) -> Vec<DisplayRegion> {
        let n = self.regions.max(1);
        let width = 1.0 / f64::from(n);
        (0..self.regions)
            .map(|i| {
                let x0 = f64::from(i) * width;
                DisplayRegion {
                    index: i,
                    viewport: kurbo::Rect::new(x0, 0.0, x0 + width, 1.0),
                    sort: 0,
                    active: true,
                }
            })
            .collect()
    }

    fn begin_frame(&self) -> bool {
        self.log.push(&self.name, CallKind::BeginFrame);
        !self.controls.fail_begin_frame.load(Ordering::Relaxed)
    }

    fn cull(&self, region: &DisplayRegion) -> DrawableList {
        self.log.push(&self.name, CallKind::Cull);
        let mut list = DrawableList::new(region.index);
        let base = u64::from(region.index) << 32;
        list.items
            .extend((0..self.items_per_region).map(|i| DrawItem(base | u64::from(i))));
        list
    }

    fn draw(&self, _list: &DrawableList) {
        let delay = self.controls.draw_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.log.push(&self.name, CallKind::Draw);
    }

    fn end_frame(&self) {
        self.log.push(&self.name, CallKind::EndFrame);
    }

    fn ready_flip(&self) {
        self.log.push(&self.name, CallKind::ReadyFlip);
    }

    fn flip(&self) {
        self.log.push(&self.name, CallKind::Flip);
    }

    fn process_window_events(&self) {
        self.log.push(&self.name, CallKind::WindowEvents);
    }

    fn close_requested(&self) -> bool {
        self.controls.close_requested.load(Ordering::Relaxed)
    }
}
