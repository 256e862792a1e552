use stagerun::{
    BoundedWindow, PaneInfo, TimeDomain, TimerBundleTracker, TimerRecord, Timestamp,
};

fn window() -> BoundedWindow {
    BoundedWindow::interval(Timestamp::from_millis(0), Timestamp::from_millis(10_000))
}

fn set(tag: &str, fire: i64) -> TimerRecord<String> {
    TimerRecord::set(
        "key-a".to_string(),
        tag,
        vec![window()],
        Timestamp::from_millis(fire),
        Timestamp::from_millis(fire),
        PaneInfo::NO_FIRING,
    )
}

#[test]
fn later_set_supersedes_earlier_one() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    tracker.record(
        &"key-a".to_string(),
        &window(),
        "retry",
        TimeDomain::EventTime,
        set("", 100),
    );
    tracker.record(
        &"key-a".to_string(),
        &window(),
        "retry",
        TimeDomain::EventTime,
        set("", 200),
    );

    let outputs = tracker.take_outputs();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0, "retry");
    assert_eq!(outputs[0].1.fire_timestamp, Timestamp::from_millis(200));
}

#[test]
fn superseded_fire_time_leaves_no_ordered_entry() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    let key = "key-a".to_string();
    tracker.record(&key, &window(), "retry", TimeDomain::EventTime, set("", 100));
    tracker.record(&key, &window(), "retry", TimeDomain::EventTime, set("", 200));

    let group = tracker.group_mut(&key, &window());
    let popped = group
        .pop_earlier(TimeDomain::EventTime, Timestamp::from_millis(300))
        .expect("the live record is there");
    assert_eq!(popped.1.fire_timestamp, Timestamp::from_millis(200));
    assert!(group
        .pop_earlier(TimeDomain::EventTime, Timestamp::from_millis(300))
        .is_none());
}

#[test]
fn clear_emits_tombstone_record() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    let key = "key-a".to_string();
    tracker.record(&key, &window(), "retry", TimeDomain::EventTime, set("", 100));
    tracker.record(
        &key,
        &window(),
        "retry",
        TimeDomain::EventTime,
        TimerRecord::cleared(key.clone(), "", vec![window()]),
    );

    let outputs = tracker.take_outputs();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].1.cleared);

    // A cleared cell has nothing left to fire inline.
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    tracker.record(&key, &window(), "retry", TimeDomain::EventTime, set("", 100));
    tracker.record(
        &key,
        &window(),
        "retry",
        TimeDomain::EventTime,
        TimerRecord::cleared(key.clone(), "", vec![window()]),
    );
    assert!(tracker
        .group_mut(&key, &window())
        .pop_earlier(TimeDomain::EventTime, Timestamp::from_millis(300))
        .is_none());
}

#[test]
fn pop_earlier_is_inclusive_and_fire_ordered() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    let key = "key-a".to_string();
    tracker.record(&key, &window(), "b", TimeDomain::EventTime, set("", 150));
    tracker.record(&key, &window(), "a", TimeDomain::EventTime, set("", 120));
    tracker.record(&key, &window(), "c", TimeDomain::EventTime, set("", 400));

    let group = tracker.group_mut(&key, &window());
    let first = group
        .pop_earlier(TimeDomain::EventTime, Timestamp::from_millis(150))
        .expect("120 fires first");
    assert_eq!(first.0, "a");
    let second = group
        .pop_earlier(TimeDomain::EventTime, Timestamp::from_millis(150))
        .expect("150 is included");
    assert_eq!(second.0, "b");
    assert!(group
        .pop_earlier(TimeDomain::EventTime, Timestamp::from_millis(150))
        .is_none());
}

#[test]
fn domains_are_drained_independently() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    let key = "key-a".to_string();
    tracker.record(&key, &window(), "event", TimeDomain::EventTime, set("", 100));
    tracker.record(
        &key,
        &window(),
        "wall",
        TimeDomain::ProcessingTime,
        set("", 100),
    );

    let group = tracker.group_mut(&key, &window());
    let popped = group
        .pop_earlier(TimeDomain::ProcessingTime, Timestamp::from_millis(500))
        .expect("processing-time entry");
    assert_eq!(popped.0, "wall");
    assert!(group
        .pop_earlier(TimeDomain::ProcessingTime, Timestamp::from_millis(500))
        .is_none());
}

#[test]
fn tombstone_insert_skips_fire_order_index() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    let key = "key-a".to_string();
    let group = tracker.group_mut(&key, &window());
    group.insert_tombstone("retry", TimerRecord::cleared(key.clone(), "", vec![window()]));
    assert!(group
        .pop_earlier(TimeDomain::EventTime, Timestamp::MAX)
        .is_none());
    let outputs = tracker.take_outputs();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].1.cleared);
}

#[test]
fn dynamic_tags_keep_separate_cells() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    let key = "key-a".to_string();
    tracker.record(
        &key,
        &window(),
        "tfs-family",
        TimeDomain::EventTime,
        set("tag-1", 100),
    );
    tracker.record(
        &key,
        &window(),
        "tfs-family",
        TimeDomain::EventTime,
        set("tag-2", 200),
    );

    let outputs = tracker.take_outputs();
    assert_eq!(outputs.len(), 2);
    let tags: Vec<&str> = outputs.iter().map(|(_, r)| r.dynamic_tag.as_str()).collect();
    assert_eq!(tags, vec!["tag-1", "tag-2"]);
}

#[test]
fn keys_and_windows_are_tracked_separately() {
    let mut tracker: TimerBundleTracker<String> = TimerBundleTracker::new();
    let other_window =
        BoundedWindow::interval(Timestamp::from_millis(10_000), Timestamp::from_millis(20_000));
    tracker.record(
        &"key-a".to_string(),
        &window(),
        "retry",
        TimeDomain::EventTime,
        set("", 100),
    );
    let mut other = set("", 300);
    other.user_key = "key-b".to_string();
    other.windows = vec![other_window.clone()];
    tracker.record(
        &"key-b".to_string(),
        &other_window,
        "retry",
        TimeDomain::EventTime,
        other,
    );

    assert_eq!(tracker.take_outputs().len(), 2);
    assert!(tracker.is_empty());
}
