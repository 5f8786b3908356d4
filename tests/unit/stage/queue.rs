use super::*;
use crate::stage::assignment::StageAssignment;
use crate::target::headless::{CallKind, CallLog, HeadlessTarget};

fn slot(id: u64, key: i32, log: &CallLog) -> Arc<TargetSlot> {
    Arc::new(TargetSlot::new(
        TargetId(id),
        Box::new(HeadlessTarget::new(format!("t{id}")).with_log(log.clone())),
        key,
        StageAssignment::driving(),
    ))
}

fn ids(q: &QueueState, stage: Stage) -> Vec<u64> {
    q.targets(stage).iter().map(|s| s.id().0).collect()
}

#[test]
fn insert_is_idempotent_per_stage() {
    let log = CallLog::new();
    let mut q = QueueState::default();
    let a = slot(1, 0, &log);
    q.insert(Stage::Draw, a.clone());
    q.insert(Stage::Draw, a.clone());
    q.insert(Stage::Cull, a);
    assert_eq!(ids(&q, Stage::Draw), vec![1]);
    assert_eq!(ids(&q, Stage::Cull), vec![1]);
    assert!(!q.has_targets(Stage::Window));
}

#[test]
fn resort_orders_by_key_then_creation() {
    let log = CallLog::new();
    let mut q = QueueState::default();
    for (id, key) in [(1, 5), (2, 0), (3, 5), (4, -1)] {
        q.insert(Stage::Draw, slot(id, key, &log));
    }
    q.resort();
    assert_eq!(ids(&q, Stage::Draw), vec![4, 2, 1, 3]);
}

#[test]
fn resort_after_key_change_moves_only_that_target() {
    let log = CallLog::new();
    let mut q = QueueState::default();
    let slots: Vec<_> = (1..=5).map(|id| slot(id, id as i32 * 10, &log)).collect();
    for s in &slots {
        q.insert(Stage::Draw, s.clone());
    }
    q.resort();
    slots[0].set_sort_key(35);
    q.resort();
    assert_eq!(ids(&q, Stage::Draw), vec![2, 3, 1, 4, 5]);
}

#[test]
fn remove_reports_membership() {
    let log = CallLog::new();
    let mut q = QueueState::default();
    q.insert(Stage::Window, slot(1, 0, &log));
    assert!(q.remove(Stage::Window, TargetId(1)));
    assert!(!q.remove(Stage::Window, TargetId(1)));
    assert!(!q.contains(Stage::Window, TargetId(1)));
}

#[test]
fn close_waits_for_release() {
    let log = CallLog::new();
    let mut release_q = QueueState::default();
    let mut close_q = QueueState::default();
    let s = slot(1, 0, &log);
    s.set_state(TargetState::Closing);
    release_q.defer_release(s.clone());
    close_q.defer_close(s.clone());

    let first = close_q.drain_pending();
    assert_eq!(first, Drained::default());
    assert!(close_q.has_pending());

    assert_eq!(release_q.drain_pending().released, 1);
    assert_eq!(close_q.drain_pending().closed, 1);
    assert_eq!(s.state(), TargetState::Closed);
    assert_eq!(log.order_of(CallKind::Release), vec!["t1"]);
    assert_eq!(log.order_of(CallKind::Close), vec!["t1"]);
    assert!(!close_q.has_pending());
}
