use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use stagerun::{
    construct_split_result, BoundedWindow, Coder, CoderError, DurationMillis, ElementRestriction,
    PaneInfo, SizedElementRestriction, SizedWindowedSplitResult, Timestamp, WindowedValue,
    WireTimestamp,
};

struct JsonCoder;

impl<T: Serialize + DeserializeOwned> Coder<T> for JsonCoder {
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> Result<(), CoderError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|source| CoderError::with_source("json encode", source))?;
        out.extend_from_slice(&bytes);
        Ok(())
    }

    fn decode(&self, data: &mut &[u8]) -> Result<T, CoderError> {
        let value = serde_json::from_slice(data)
            .map_err(|source| CoderError::with_source("json decode", source))?;
        *data = &[];
        Ok(value)
    }
}

type Root = WindowedValue<SizedElementRestriction<String, (u64, u64), i64>>;

fn window(i: i64) -> BoundedWindow {
    BoundedWindow::interval(
        Timestamp::from_millis(i * 1000),
        Timestamp::from_millis((i + 1) * 1000),
    )
}

fn root(restriction: (u64, u64), state: i64, windows: Vec<BoundedWindow>, size: f64) -> Root {
    WindowedValue::new(
        SizedElementRestriction::new(
            ElementRestriction::new("value".to_string(), restriction, state),
            size,
        ),
        Timestamp::from_millis(100),
        windows,
        PaneInfo::ON_TIME_AND_ONLY,
    )
}

fn output_ids() -> Vec<String> {
    vec!["out".to_string(), "side".to_string()]
}

#[test]
fn wire_timestamp_splits_millis_into_seconds_and_nanos() {
    assert_eq!(
        WireTimestamp::from_millis(1500),
        WireTimestamp {
            seconds: 1,
            nanos: 500_000_000
        }
    );
    assert_eq!(
        WireTimestamp::from_millis(999),
        WireTimestamp {
            seconds: 0,
            nanos: 999_000_000
        }
    );
}

#[test]
fn element_split_residual_carries_delay_and_watermarks() {
    let split = SizedWindowedSplitResult {
        primary_in_fully_processed_windows: None,
        primary_split: Some(root((0, 5), 7, vec![window(0)], 5.0)),
        residual_split: Some(root((5, 10), 9, vec![window(0)], 5.0)),
        residual_in_unprocessed_windows: Some(root((0, 10), 7, vec![window(1)], 10.0)),
    };

    let result = construct_split_result(
        Some(&split),
        None,
        &JsonCoder,
        Timestamp::from_millis(2500),
        Timestamp::from_millis(4500),
        "transform-1",
        "main-in",
        &output_ids(),
        DurationMillis::from_millis(10),
    )
    .expect("encoding succeeds");

    assert_eq!(result.primary_roots.len(), 1);
    assert_eq!(result.residual_roots.len(), 2);
    for application in &result.primary_roots {
        assert_eq!(application.transform_id, "transform-1");
        assert_eq!(application.input_id, "main-in");
    }

    // Unprocessed-window residual: initial watermark, no delay.
    let unprocessed = &result.residual_roots[0];
    assert_eq!(unprocessed.requested_time_delay_ms, 0);
    assert_eq!(
        unprocessed.output_watermarks,
        output_ids()
            .into_iter()
            .map(|id| (id, WireTimestamp::from_millis(2500)))
            .collect::<BTreeMap<_, _>>()
    );

    // Element-split residual: pre-split watermark and the resume delay.
    let element_split = &result.residual_roots[1];
    assert_eq!(element_split.requested_time_delay_ms, 10);
    assert_eq!(
        element_split.output_watermarks["out"],
        WireTimestamp::from_millis(4500)
    );
}

#[test]
fn minimum_watermark_produces_empty_watermark_map() {
    let split = SizedWindowedSplitResult {
        primary_in_fully_processed_windows: None,
        primary_split: Some(root((0, 5), 7, vec![window(0)], 5.0)),
        residual_split: Some(root((5, 10), 7, vec![window(0)], 5.0)),
        residual_in_unprocessed_windows: Some(root((0, 10), 7, vec![window(1)], 10.0)),
    };

    let result = construct_split_result(
        Some(&split),
        None,
        &JsonCoder,
        Timestamp::MIN,
        Timestamp::MIN,
        "transform-1",
        "main-in",
        &output_ids(),
        DurationMillis::ZERO,
    )
    .expect("encoding succeeds");

    for residual in &result.residual_roots {
        assert!(residual.output_watermarks.is_empty());
    }
}

#[test]
fn encoded_roots_round_trip_through_the_full_input_coder() {
    let original = root((2, 8), 3, vec![window(0), window(1)], 6.0);
    let split = SizedWindowedSplitResult {
        primary_in_fully_processed_windows: Some(original.clone()),
        primary_split: None,
        residual_split: None,
        residual_in_unprocessed_windows: None,
    };

    let result = construct_split_result(
        Some(&split),
        None,
        &JsonCoder,
        Timestamp::from_millis(2500),
        Timestamp::from_millis(2500),
        "transform-1",
        "main-in",
        &output_ids(),
        DurationMillis::ZERO,
    )
    .expect("encoding succeeds");

    assert_eq!(result.primary_roots.len(), 1);
    assert!(result.residual_roots.is_empty());
    let mut data = result.primary_roots[0].element.as_slice();
    let decoded: Root = JsonCoder.decode(&mut data).expect("decoding succeeds");
    assert_eq!(decoded, original);
}

#[test]
fn fully_processed_primary_without_element_split_has_single_roots() {
    let split = SizedWindowedSplitResult {
        primary_in_fully_processed_windows: Some(root((0, 10), 7, vec![window(0)], 10.0)),
        primary_split: None,
        residual_split: None,
        residual_in_unprocessed_windows: Some(root((0, 10), 7, vec![window(1)], 10.0)),
    };

    let result = construct_split_result(
        Some(&split),
        None,
        &JsonCoder,
        Timestamp::from_millis(2500),
        Timestamp::from_millis(2500),
        "transform-1",
        "main-in",
        &output_ids(),
        DurationMillis::ZERO,
    )
    .expect("encoding succeeds");

    assert_eq!(result.primary_roots.len(), 1);
    assert_eq!(result.residual_roots.len(), 1);
}
