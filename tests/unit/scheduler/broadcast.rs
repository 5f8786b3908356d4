use super::*;
use crate::stage::assignment::Stage;
use crate::stage::callback::CallbackTime;
use crate::target::headless::{CallKind, CallLog, HeadlessTarget};

fn on(model: &str) -> TargetOpts {
    TargetOpts {
        sort_key: 0,
        threading: Some(ThreadingModel::parse(model).unwrap()),
    }
}

#[test]
fn broadcast_skips_workers_without_matching_work() {
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    s.make_target(HeadlessTarget::new("a"), on("A")).unwrap();
    s.queue_for(&StageContext::named("idle")).unwrap();
    assert_eq!(s.worker_contexts().len(), 2);

    let round = s
        .broadcast(Task::Flip, |q| q.has_targets(Stage::Draw))
        .unwrap();
    assert_eq!(round.dispatched, 1);
    assert_eq!(round.completed, 1);
    assert_eq!(round.reports.len(), 2);
    assert!(round.reports[0].context.is_driving());
    assert_eq!(s.worker_contexts().len(), 2);
}

#[test]
fn existing_queue_never_spawns() {
    let s = Scheduler::new(SchedulerOpts::default()).unwrap();
    assert!(s.existing_queue(&StageContext::named("ghost")).is_none());
    assert!(s.existing_queue(&StageContext::Driving).is_some());
    assert!(s.worker_contexts().is_empty());
}

#[test]
fn worker_threads_use_the_configured_prefix() {
    let opts = SchedulerOpts {
        thread_name_prefix: "fp".to_string(),
        ..SchedulerOpts::default()
    };
    let mut s = Scheduler::new(opts).unwrap();
    let seen = Arc::new(std::sync::Mutex::new(None));
    let seen_cb = seen.clone();
    s.add_callback(StageContext::named("X"), CallbackTime::PostFrame, move |_| {
        *seen_cb.lock().unwrap() = std::thread::current().name().map(str::to_string);
    })
    .unwrap();
    s.run_frame().unwrap();
    assert_eq!(seen.lock().unwrap().as_deref(), Some("fp-X"));
}

#[test]
fn render_clears_dirty_flag_and_advances_frame() {
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    s.make_target(HeadlessTarget::new("a"), TargetOpts::default())
        .unwrap();
    assert!(s.dirty);
    let stats = s.render_frame().unwrap();
    assert!(!s.dirty);
    assert_eq!(stats.frame, FrameNumber(1));
    assert_eq!(s.frame_number(), FrameNumber(1));
    assert_eq!(s.flip_state(), FlipState::Drawing);
}

#[test]
fn retiring_an_unopened_target_makes_no_collaborator_calls() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let id = s
        .make_target(HeadlessTarget::new("t").with_log(log.clone()), on("A"))
        .unwrap();
    let slot = s.slot(id).unwrap();
    s.retire(&slot);
    assert_eq!(slot.state(), TargetState::Closed);
    s.run_frame().unwrap();
    assert_eq!(log.total(CallKind::Release), 0);
    assert_eq!(log.total(CallKind::Close), 0);
    assert_eq!(log.total(CallKind::Open), 0);
}

#[test]
fn invalid_options_are_rejected() {
    let opts = SchedulerOpts {
        thread_name_prefix: "  ".to_string(),
        ..SchedulerOpts::default()
    };
    assert!(matches!(
        Scheduler::new(opts),
        Err(SchedulerError::Validation(_))
    ));
}
