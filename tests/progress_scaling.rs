use std::collections::BTreeMap;

use stagerun::{encode_progress, scale_progress, Progress, ProgressReporter};

#[test]
fn scales_element_progress_across_windows() {
    let scaled = scale_progress(Progress::from_parts(0.3, 0.7), 2, 5);
    assert!((scaled.completed - 2.3).abs() < 1e-9);
    assert!((scaled.remaining - 2.7).abs() < 1e-9);
}

#[test]
fn first_window_untouched_element_spans_all_windows() {
    let scaled = scale_progress(Progress::from_parts(0.0, 1.0), 0, 2);
    assert_eq!(scaled.completed, 0.0);
    assert_eq!(scaled.remaining, 2.0);
}

#[test]
fn degenerate_progress_counts_as_all_remaining() {
    let scaled = scale_progress(Progress::from_parts(0.0, 0.0), 1, 4);
    assert_eq!(scaled.completed, 1.0);
    assert_eq!(scaled.remaining, 3.0);
    assert_eq!(Progress::from_parts(0.0, 0.0).completed_fraction(), 0.0);
}

#[test]
fn completed_monotone_as_claims_advance() {
    let mut last = f64::MIN;
    for claimed in 0..=10 {
        let progress = Progress::from_parts(claimed as f64, (10 - claimed) as f64);
        let scaled = scale_progress(progress, 1, 3);
        assert!(scaled.completed >= last);
        last = scaled.completed;
    }
}

#[test]
fn encodes_single_element_double_sequence() {
    let encoded = encode_progress(2.5);
    assert_eq!(encoded.len(), 12);
    assert_eq!(&encoded[..4], &1i32.to_be_bytes());
    assert_eq!(&encoded[4..], &2.5f64.to_bits().to_be_bytes());
}

#[test]
fn zero_progress_encodes_zero_bits() {
    let encoded = encode_progress(0.0);
    assert_eq!(&encoded[4..], &[0u8; 8]);
}

#[test]
fn reporter_fills_both_short_ids() {
    let reporter = ProgressReporter::new("s1", "s2");
    let mut monitoring_data = BTreeMap::new();
    reporter.report(Progress::from_parts(1.5, 0.5), &mut monitoring_data);
    assert_eq!(monitoring_data.len(), 2);
    assert_eq!(monitoring_data["s1"], encode_progress(1.5));
    assert_eq!(monitoring_data["s2"], encode_progress(0.5));
}
