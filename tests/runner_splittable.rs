use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use stagerun::{
    BoundedWindow, BundleApplication, Coder, CoderError, DelayedBundleApplication,
    DurationMillis, ElementRestriction, IncompleteRestrictionError, OutputConsumer, PaneInfo,
    ProcessContinuation, Progress, RestrictionTracker, RunnerConfig, RunnerError, RunnerParts,
    SizedElementRestriction, SplitListener, SplitOutcome, Timestamp, TransformRunner,
    UserContext, UserFn, UserFnDescriptor, WatermarkEstimator, WindowedValue, WireTimestamp,
    PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS_URN,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OffsetRange {
    from: u64,
    to: u64,
}

struct RangeTracker {
    range: OffsetRange,
    last_claimed: Option<u64>,
}

impl RangeTracker {
    fn done_up_to(&self) -> u64 {
        self.last_claimed
            .map(|claimed| claimed + 1)
            .unwrap_or(self.range.from)
    }
}

impl RestrictionTracker for RangeTracker {
    type Restriction = OffsetRange;
    type Position = u64;

    fn try_claim(&mut self, position: &u64) -> bool {
        if *position >= self.range.to {
            return false;
        }
        self.last_claimed = Some(*position);
        true
    }

    fn current_restriction(&self) -> OffsetRange {
        self.range.clone()
    }

    fn try_split(&mut self, fraction_of_remainder: f64) -> Option<SplitOutcome<OffsetRange>> {
        let done = self.done_up_to();
        if done >= self.range.to {
            return None;
        }
        let remaining = (self.range.to - done) as f64;
        let split_at = done + (remaining * fraction_of_remainder).round() as u64;
        if split_at >= self.range.to {
            return None;
        }
        let outcome = SplitOutcome::new(
            OffsetRange {
                from: self.range.from,
                to: split_at.max(done),
            },
            OffsetRange {
                from: split_at.max(done),
                to: self.range.to,
            },
        );
        self.range = outcome.primary.clone();
        Some(outcome)
    }

    fn check_done(&self) -> Result<(), IncompleteRestrictionError> {
        let done = self.done_up_to();
        if done >= self.range.to {
            Ok(())
        } else {
            Err(IncompleteRestrictionError(format!(
                "positions [{done}, {}) were never claimed",
                self.range.to
            )))
        }
    }

    fn progress(&self) -> Option<Progress> {
        let done = self.done_up_to();
        Some(Progress::from_parts(
            (done - self.range.from) as f64,
            (self.range.to - done) as f64,
        ))
    }
}

struct ManualEstimator {
    watermark: Timestamp,
    observed: Arc<Mutex<Vec<Timestamp>>>,
}

impl WatermarkEstimator for ManualEstimator {
    type State = Timestamp;

    fn current_watermark(&self) -> Timestamp {
        self.watermark
    }

    fn state(&self) -> Timestamp {
        self.watermark
    }

    fn observe_timestamp(&mut self, timestamp: Timestamp) {
        self.observed.lock().unwrap().push(timestamp);
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    ClaimAll,
    ClaimOneThenResume(i64),
    StopWithoutClaiming,
}

struct RangeFn {
    mode: Mode,
    observed: Arc<Mutex<Vec<Timestamp>>>,
}

impl UserFn for RangeFn {
    type In = String;
    type Out = String;
    type Restriction = OffsetRange;
    type Position = u64;
    type WatermarkState = Timestamp;
    type Key = String;

    fn process_element(
        &mut self,
        cx: &mut UserContext<'_, Self>,
    ) -> Result<ProcessContinuation, RunnerError> {
        let tracker = cx.restriction_tracker()?;
        let restriction = cx.restriction()?;
        let value = cx.element()?;
        match self.mode {
            Mode::ClaimAll => {
                let mut position = restriction.from;
                while tracker.try_claim(&position) {
                    cx.output(format!("{value}:{position}"))?;
                    position += 1;
                }
                Ok(ProcessContinuation::stop())
            }
            Mode::ClaimOneThenResume(delay_ms) => {
                if tracker.try_claim(&restriction.from) {
                    cx.output(format!("{value}:{}", restriction.from))?;
                }
                Ok(ProcessContinuation::resume()
                    .with_resume_delay(DurationMillis::from_millis(delay_ms)))
            }
            Mode::StopWithoutClaiming => Ok(ProcessContinuation::stop()),
        }
    }

    fn new_tracker(
        &mut self,
        restriction: OffsetRange,
    ) -> Result<stagerun::BoxedTracker<OffsetRange, u64>, RunnerError> {
        Ok(Box::new(RangeTracker {
            range: restriction,
            last_claimed: None,
        }))
    }

    fn new_watermark_estimator(
        &mut self,
        state: Timestamp,
    ) -> Result<stagerun::BoxedEstimator<Timestamp>, RunnerError> {
        Ok(Box::new(ManualEstimator {
            watermark: state,
            observed: Arc::clone(&self.observed),
        }))
    }
}

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

type SplitLog = Arc<Mutex<Vec<(Vec<BundleApplication>, Vec<DelayedBundleApplication>)>>>;

struct RecordingListener(SplitLog);

impl SplitListener for RecordingListener {
    fn split(
        &mut self,
        primary_roots: Vec<BundleApplication>,
        residual_roots: Vec<DelayedBundleApplication>,
    ) {
        self.0.lock().unwrap().push((primary_roots, residual_roots));
    }
}

type OutputLog = Arc<Mutex<Vec<WindowedValue<String>>>>;

fn config() -> RunnerConfig {
    RunnerConfig {
        transform_id: "transform-1".to_string(),
        transform_urn: PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS_URN.to_string(),
        main_input_id: "in".to_string(),
        main_output_tag: "out".to_string(),
        output_ids: vec!["out".to_string()],
        allowed_lateness: DurationMillis::ZERO,
        work_completed_short_id: "wc".to_string(),
        work_remaining_short_id: "wr".to_string(),
    }
}

fn descriptor(observes_timestamps: bool) -> UserFnDescriptor {
    UserFnDescriptor {
        has_new_tracker: true,
        has_new_watermark_estimator: true,
        has_get_size: true,
        estimator_observes_timestamps: observes_timestamps,
        ..UserFnDescriptor::default()
    }
}

fn window(i: i64) -> BoundedWindow {
    BoundedWindow::interval(
        Timestamp::from_millis(i * 1000),
        Timestamp::from_millis((i + 1) * 1000),
    )
}

fn sized_element(
    range: OffsetRange,
    watermark_ms: i64,
    windows: Vec<BoundedWindow>,
) -> WindowedValue<SizedElementRestriction<String, OffsetRange, Timestamp>> {
    let size = (range.to - range.from) as f64;
    WindowedValue::new(
        SizedElementRestriction::new(
            ElementRestriction::new(
                "element".to_string(),
                range,
                Timestamp::from_millis(watermark_ms),
            ),
            size,
        ),
        Timestamp::from_millis(100),
        windows,
        PaneInfo::ON_TIME_AND_ONLY,
    )
}

struct Harness {
    runner: TransformRunner<RangeFn>,
    outputs: OutputLog,
    splits: SplitLog,
    observed: Arc<Mutex<Vec<Timestamp>>>,
}

fn harness(mode: Mode, observes_timestamps: bool) -> Harness {
    let outputs: OutputLog = Arc::new(Mutex::new(Vec::new()));
    let splits: SplitLog = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outputs);
    let consumer: OutputConsumer<String> = Box::new(move |output| {
        sink.lock().unwrap().push(output);
        Ok(())
    });
    let mut parts = RunnerParts::new(
        RangeFn {
            mode,
            observed: Arc::clone(&observed),
        },
        descriptor(observes_timestamps),
        config(),
    );
    parts.consumers.insert("out".to_string(), consumer);
    parts.split_listener = Box::new(RecordingListener(Arc::clone(&splits)));
    parts.sizer = Some(Arc::new(|range: &OffsetRange| (range.to - range.from) as f64));
    parts.full_input_coder = Some(Arc::new(JsonCoder));
    Harness {
        runner: TransformRunner::new(parts).expect("valid configuration"),
        outputs,
        splits,
        observed,
    }
}

#[test]
fn processes_each_window_with_a_fresh_restriction() {
    let h = harness(Mode::ClaimAll, false);
    h.runner
        .process_sized_element_and_restriction(sized_element(
            OffsetRange { from: 0, to: 3 },
            500,
            vec![window(0), window(1)],
        ))
        .unwrap();

    let outputs = h.outputs.lock().unwrap();
    assert_eq!(outputs.len(), 6);
    assert!(outputs[..3].iter().all(|o| o.windows == vec![window(0)]));
    assert!(outputs[3..].iter().all(|o| o.windows == vec![window(1)]));
    assert!(h.splits.lock().unwrap().is_empty());
    // The element finished: nothing left for the split path.
    assert!(h.runner.get_progress().is_none());
}

#[test]
fn unclaimed_restriction_fails_check_done() {
    let h = harness(Mode::StopWithoutClaiming, false);
    let err = h
        .runner
        .process_sized_element_and_restriction(sized_element(
            OffsetRange { from: 0, to: 3 },
            500,
            vec![window(0)],
        ))
        .expect_err("restriction was not fully claimed");
    assert!(matches!(err, RunnerError::RestrictionIncomplete(_)));
}

#[test]
fn resume_continuation_checkpoints_the_remainder() {
    let h = harness(Mode::ClaimOneThenResume(10), false);
    h.runner
        .process_sized_element_and_restriction(sized_element(
            OffsetRange { from: 0, to: 3 },
            500,
            vec![window(0)],
        ))
        .unwrap();

    // One position was claimed and emitted.
    assert_eq!(h.outputs.lock().unwrap().len(), 1);

    let splits = h.splits.lock().unwrap();
    assert_eq!(splits.len(), 1);
    let (primary_roots, residual_roots) = &splits[0];
    assert_eq!(primary_roots.len(), 1);
    assert_eq!(residual_roots.len(), 1);

    let residual = &residual_roots[0];
    assert_eq!(residual.requested_time_delay_ms, 10);
    assert_eq!(
        residual.output_watermarks["out"],
        WireTimestamp::from_millis(500)
    );

    let mut data = residual.application.element.as_slice();
    let decoded: WindowedValue<SizedElementRestriction<String, OffsetRange, Timestamp>> =
        JsonCoder.decode(&mut data).expect("residual decodes");
    assert_eq!(decoded.value.element.restriction, OffsetRange { from: 1, to: 3 });
    assert_eq!(decoded.value.size, 2.0);
    assert_eq!(
        decoded.value.element.watermark_state,
        Timestamp::from_millis(500)
    );

    let mut data = primary_roots[0].element.as_slice();
    let decoded: WindowedValue<SizedElementRestriction<String, OffsetRange, Timestamp>> =
        JsonCoder.decode(&mut data).expect("primary decodes");
    assert_eq!(decoded.value.element.restriction, OffsetRange { from: 0, to: 1 });
    assert_eq!(decoded.value.size, 1.0);
}

#[test]
fn observing_estimator_sees_every_output_timestamp() {
    let h = harness(Mode::ClaimAll, true);
    h.runner
        .process_sized_element_and_restriction(sized_element(
            OffsetRange { from: 0, to: 2 },
            500,
            vec![window(0)],
        ))
        .unwrap();

    let observed = h.observed.lock().unwrap();
    assert_eq!(*observed, vec![Timestamp::from_millis(100); 2]);
}

#[test]
fn splittable_configuration_requires_sizer_and_coder() {
    let mut parts = RunnerParts::new(
        RangeFn {
            mode: Mode::ClaimAll,
            observed: Arc::new(Mutex::new(Vec::new())),
        },
        descriptor(false),
        config(),
    );
    let consumer: OutputConsumer<String> = Box::new(|_| Ok(()));
    parts.consumers.insert("out".to_string(), consumer);
    // Neither sizer nor coder: construction fails fast.
    assert!(TransformRunner::new(parts).is_err());
}

#[test]
fn plain_elements_are_rejected_by_the_splittable_strategy() {
    let h = harness(Mode::ClaimAll, false);
    let element = WindowedValue::in_window(
        "plain".to_string(),
        Timestamp::from_millis(100),
        window(0),
        PaneInfo::ON_TIME_AND_ONLY,
    );
    assert!(h.runner.process_element(element).is_err());
}

#[test]
fn progress_snapshot_encodes_under_short_ids() {
    // Progress is only observable while an element is live; between
    // elements the monitoring map stays empty.
    let h = harness(Mode::ClaimAll, false);
    let mut monitoring_data = BTreeMap::new();
    h.runner.report_progress(&mut monitoring_data);
    assert!(monitoring_data.is_empty());
}
