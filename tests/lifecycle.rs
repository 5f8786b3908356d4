use framepipe::{
    CallKind, CallLog, FlipState, HeadlessTarget, Scheduler, SchedulerError, SchedulerOpts,
    StageAssignment, StageContext, TargetId, TargetOpts, TargetState, ThreadingModel,
};

fn opts(model: &str) -> TargetOpts {
    TargetOpts {
        sort_key: 0,
        threading: Some(ThreadingModel::parse(model).unwrap()),
    }
}

fn add(s: &mut Scheduler, log: &CallLog, name: &str, model: &str) -> TargetId {
    s.make_target(HeadlessTarget::new(name).with_log(log.clone()), opts(model))
        .unwrap()
}

#[test]
fn each_frame_processes_exactly_the_targets_present_at_its_start() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let a = add(&mut s, &log, "a", "");
    add(&mut s, &log, "b", "A");
    s.run_frame().unwrap();

    add(&mut s, &log, "c", "A");
    s.run_frame().unwrap();
    assert_eq!(log.count("a", CallKind::BeginFrame), 2);
    assert_eq!(log.count("b", CallKind::BeginFrame), 2);
    assert_eq!(log.count("c", CallKind::BeginFrame), 1);

    s.remove_target(a).unwrap();
    assert_eq!(s.target_state(a), None);
    assert_eq!(log.count("a", CallKind::Close), 0);

    s.run_frame().unwrap();
    assert_eq!(log.count("a", CallKind::BeginFrame), 2);
    assert_eq!(log.count("a", CallKind::Flip), 2);
    assert_eq!(log.count("a", CallKind::Release), 1);
    assert_eq!(log.count("a", CallKind::Close), 1);
    assert_eq!(log.count("b", CallKind::BeginFrame), 3);
    assert_eq!(log.count("c", CallKind::BeginFrame), 2);

    s.run_frame().unwrap();
    assert_eq!(log.count("a", CallKind::Release), 1);
    assert_eq!(log.count("a", CallKind::Close), 1);
}

#[test]
fn removal_releases_on_draw_context_then_closes_on_window_context() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let id = add(&mut s, &log, "w", "W:C/D");
    s.run_frame().unwrap();
    assert_eq!(
        log.threads_for("w", CallKind::Open),
        vec![Some("framepipe-W".to_string())]
    );

    s.remove_target(id).unwrap();
    s.run_frame().unwrap();

    assert_eq!(
        log.threads_for("w", CallKind::Release),
        vec![Some("framepipe-D".to_string())]
    );
    assert_eq!(
        log.threads_for("w", CallKind::Close),
        vec![Some("framepipe-W".to_string())]
    );
    let calls: Vec<CallKind> = log
        .records()
        .into_iter()
        .filter(|r| matches!(r.call, CallKind::Release | CallKind::Close))
        .map(|r| r.call)
        .collect();
    assert_eq!(calls, vec![CallKind::Release, CallKind::Close]);
}

#[test]
fn mutations_are_rejected_while_a_frame_is_in_flight() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let a = add(&mut s, &log, "a", "A");
    s.open_targets().unwrap();

    s.render_frame().unwrap();
    assert_eq!(s.flip_state(), FlipState::Drawing);

    let err = s
        .make_target(HeadlessTarget::new("late"), TargetOpts::default())
        .unwrap_err();
    assert!(matches!(err, SchedulerError::FrameInFlight(_)), "{err}");
    assert!(matches!(
        s.remove_target(a).unwrap_err(),
        SchedulerError::FrameInFlight(_)
    ));
    assert!(matches!(
        s.set_target_stage_assignment(a, StageAssignment::driving())
            .unwrap_err(),
        SchedulerError::FrameInFlight(_)
    ));
    assert!(matches!(
        s.open_targets().unwrap_err(),
        SchedulerError::FrameInFlight(_)
    ));
    s.set_sort_key(a, 4).unwrap();

    s.sync_frame().unwrap();
    assert!(matches!(
        s.remove_target(a).unwrap_err(),
        SchedulerError::FrameInFlight(_)
    ));
    s.flip_frame().unwrap();

    s.remove_target(a).unwrap();
    assert!(matches!(
        s.remove_target(a).unwrap_err(),
        SchedulerError::UnknownTarget(id) if id == a
    ));
}

#[test]
fn failed_open_skips_only_that_target() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let bad_target = HeadlessTarget::new("bad").with_log(log.clone());
    bad_target.controls().set_fail_open(true);
    let bad = s.make_target(bad_target, opts("A")).unwrap();
    let good = add(&mut s, &log, "good", "A");

    assert_eq!(s.open_targets().unwrap(), 1);
    assert_eq!(s.target_state(bad), Some(TargetState::Closed));
    assert_eq!(s.target_state(good), Some(TargetState::Open));

    let stats = s.run_frame().unwrap();
    assert_eq!(stats.targets_drawn, 1);
    assert_eq!(log.count("bad", CallKind::Cull), 0);
    assert_eq!(log.count("bad", CallKind::BeginFrame), 0);
    assert_eq!(log.count("good", CallKind::Flip), 1);

    s.remove_target(bad).unwrap();
    s.run_frame().unwrap();
    assert_eq!(log.count("bad", CallKind::Release), 0);
    assert_eq!(log.count("bad", CallKind::Close), 0);
}

#[test]
fn window_close_request_is_honored_at_the_frame_boundary() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let t = HeadlessTarget::new("win").with_log(log.clone());
    let controls = t.controls();
    let win = s.make_target(t, opts("A")).unwrap();
    add(&mut s, &log, "other", "A");
    s.run_frame().unwrap();

    controls.request_close();
    let stats = s.run_frame().unwrap();
    assert_eq!(stats.targets_drawn, 1);
    assert_eq!(log.count("win", CallKind::BeginFrame), 1);
    assert_eq!(log.count("win", CallKind::Release), 1);
    assert_eq!(log.count("win", CallKind::Close), 1);
    assert_eq!(s.target_state(win), Some(TargetState::Closed));
    assert!(s.target_ids().contains(&win));

    s.run_frame().unwrap();
    assert_eq!(log.count("win", CallKind::BeginFrame), 1);
    assert_eq!(log.count("other", CallKind::BeginFrame), 3);

    s.remove_target(win).unwrap();
    s.terminate_threads().unwrap();
    assert_eq!(log.count("win", CallKind::Close), 1);
}

#[test]
fn reassignment_moves_work_to_the_new_context() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let id = add(&mut s, &log, "t", "");
    s.run_frame().unwrap();
    assert!(s.worker_contexts().is_empty());

    let moved = StageAssignment::new(
        StageContext::Driving,
        StageContext::named("R"),
        StageContext::named("R"),
    );
    s.set_target_stage_assignment(id, moved.clone()).unwrap();
    assert_eq!(s.target_assignment(id), Some(moved));
    assert_eq!(s.worker_contexts(), vec![StageContext::named("R")]);

    log.clear();
    s.run_frame().unwrap();
    assert_eq!(
        log.threads_for("t", CallKind::Draw),
        vec![Some("framepipe-R".to_string())]
    );
    assert_eq!(log.count("t", CallKind::Flip), 1);
}

#[test]
fn open_target_keeps_its_window_context() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let id = add(&mut s, &log, "t", "W:C/D");
    let pending = add(&mut s, &log, "p", "W:C/D");
    s.run_frame().unwrap();
    let late = add(&mut s, &log, "late", "W:C/D");

    let elsewhere = ThreadingModel::parse("X:C/D").unwrap().assignment();
    let err = s
        .set_target_stage_assignment(id, elsewhere.clone())
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Validation(_)), "{err}");
    assert_eq!(
        s.target_assignment(id),
        Some(ThreadingModel::parse("W:C/D").unwrap().assignment())
    );

    let same_window = ThreadingModel::parse("W:E").unwrap().assignment();
    s.set_target_stage_assignment(pending, same_window).unwrap();
    s.set_target_stage_assignment(late, elsewhere).unwrap();

    s.run_frame().unwrap();
    assert_eq!(
        log.threads_for("late", CallKind::Open),
        vec![Some("framepipe-X".to_string())]
    );
    assert_eq!(
        log.threads_for("p", CallKind::Draw).last().cloned(),
        Some(Some("framepipe-E".to_string()))
    );

    s.remove_target(id).unwrap();
    s.run_frame().unwrap();
    assert_eq!(
        log.threads_for("t", CallKind::Close),
        vec![Some("framepipe-W".to_string())]
    );
}

#[test]
fn terminate_threads_releases_and_closes_everything_once() {
    let log = CallLog::new();
    let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
    let ids = [
        add(&mut s, &log, "a", ""),
        add(&mut s, &log, "b", "A"),
        add(&mut s, &log, "c", "A/B"),
        add(&mut s, &log, "d", "B"),
    ];
    s.run_frame().unwrap();
    let late = add(&mut s, &log, "late", "B");

    s.terminate_threads().unwrap();
    assert!(s.worker_contexts().is_empty());
    for id in ids.into_iter().chain([late]) {
        assert_eq!(s.target_state(id), Some(TargetState::Closed));
    }
    for name in ["a", "b", "c", "d"] {
        assert_eq!(log.count(name, CallKind::Release), 1, "{name}");
        assert_eq!(log.count(name, CallKind::Close), 1, "{name}");
    }
    assert_eq!(log.count("late", CallKind::Open), 0);
    assert_eq!(log.count("late", CallKind::Close), 0);

    drop(s);
    assert_eq!(log.total(CallKind::Close), 4);
}

#[test]
fn dropping_the_scheduler_closes_open_targets() {
    let log = CallLog::new();
    {
        let mut s = Scheduler::new(SchedulerOpts::default()).unwrap();
        add(&mut s, &log, "a", "A");
        add(&mut s, &log, "b", "");
        s.run_frame().unwrap();
    }
    assert_eq!(log.count("a", CallKind::Close), 1);
    assert_eq!(log.count("b", CallKind::Close), 1);
    assert_eq!(
        log.threads_for("a", CallKind::Close),
        vec![Some("framepipe-A".to_string())]
    );
}
