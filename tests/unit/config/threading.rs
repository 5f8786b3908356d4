use super::*;

#[test]
fn empty_model_is_single_threaded() {
    let m = ThreadingModel::parse("").unwrap();
    assert!(m.is_single_threaded());
    assert_eq!(m.assignment(), StageAssignment::driving());
    assert_eq!(m.to_string(), "");
}

#[test]
fn bare_name_puts_cull_and_draw_together() {
    let m = ThreadingModel::parse("A").unwrap();
    let a = StageContext::named("A");
    assert_eq!(m.assignment(), StageAssignment::single(a));
    assert_eq!(m.to_string(), "A");
}

#[test]
fn slash_splits_cull_and_draw_and_window_follows_draw() {
    let m = ThreadingModel::parse("cull/draw").unwrap();
    let asg = m.assignment();
    assert_eq!(asg.cull, StageContext::named("cull"));
    assert_eq!(asg.draw, StageContext::named("draw"));
    assert_eq!(asg.window, StageContext::named("draw"));
}

#[test]
fn leading_slash_culls_on_driving_context() {
    let asg = ThreadingModel::parse("/B").unwrap().assignment();
    assert_eq!(asg.cull, StageContext::Driving);
    assert_eq!(asg.draw, StageContext::named("B"));
}

#[test]
fn window_prefix_overrides_window_context() {
    let m = ThreadingModel::parse("W:A/B").unwrap();
    assert_eq!(m.window_name(), "W");
    assert_eq!(m.assignment().window, StageContext::named("W"));
    assert_eq!(m.to_string(), "W:A/B");
    assert_eq!(ThreadingModel::parse(&m.to_string()).unwrap(), m);
}

#[test]
fn rejects_extra_separators_and_bad_names() {
    assert!(ThreadingModel::parse("A/B/C").is_err());
    assert!(ThreadingModel::parse("W:X:A").is_err());
    let err = ThreadingModel::parse("a b").unwrap_err();
    assert!(err.to_string().contains("invalid character"));
}

#[test]
fn serde_uses_string_form() {
    let m: ThreadingModel = serde_json::from_str("\"A/B\"").unwrap();
    assert_eq!(m, ThreadingModel::new("A", "B"));
    assert_eq!(serde_json::to_string(&m).unwrap(), "\"A/B\"");
    assert!(serde_json::from_str::<ThreadingModel>("\"A/B/C\"").is_err());
}
