use log::debug;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::element::payload::{ElementRestriction, SizedElementRestriction};
use crate::element::window::BoundedWindow;
use crate::element::windowed_value::WindowedValue;
use crate::error::RunnerError;
use crate::runner::context::{ContextError, ContextRole, UserContext};
use crate::runner::interfaces::{
    BundleFinalizationCallback, BundleFinalizer, Coder, OutputConsumer, RestrictionSizer,
    SideInputAccessor, SplitListener, StateAccessor, StateCell, StateError, TimerSink,
};
use crate::sdf::restriction::TrackerHandle;
use crate::sdf::watermark::WatermarkEstimatorHandle;
use crate::split::compute::{
    compute_split_for_process, ElementSplitter, SizedWindowedSplitResult, WindowSplitContext,
    WindowedSplitResult,
};
use crate::split::progress::{scale_progress, Progress, ProgressReporter};
use crate::split::result::{
    construct_split_result, BundleApplication, DelayedBundleApplication, SplitResult,
};
use crate::time::clock::ProcessingClock;
use crate::time::domain::{DurationMillis, TimeDomain, Timestamp};
use crate::timers::record::TimerRecord;
use crate::timers::tracker::TimerBundleTracker;
use crate::user_fn::descriptor::{
    ConfigError, RunnerConfig, UserFnDescriptor, PAR_DO_URN,
    PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS_URN, TIMER_FAMILY_PREFIX,
};
use crate::user_fn::invoker::UserFn;

/// Full input coder for a splittable transform: value plus restriction,
/// watermark state, size, and windowing metadata.
pub type FullInputCoder<F> = Arc<
    dyn Coder<
        WindowedValue<
            SizedElementRestriction<
                <F as UserFn>::In,
                <F as UserFn>::Restriction,
                <F as UserFn>::WatermarkState,
            >,
        >,
    >,
>;

/// How elements are dispatched to the user transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionStrategy {
    ParDo { window_observing: bool },
    SplittableProcess,
}

/// Timer tracker plus the outgoing sinks, present only when the transform
/// declares timer families.
pub(crate) struct TimerMachine<K> {
    pub(crate) tracker: Mutex<TimerBundleTracker<K>>,
    sinks: BTreeMap<String, TimerSink<K>>,
}

/// Per-element cursor state shared with the split thread.
///
/// All fields are only meaningful while an element or timer is live; the
/// split lock (the mutex around this struct) serializes installation,
/// teardown, and concurrent reads.
pub(crate) struct Cursor<F: UserFn> {
    pub(crate) element: Option<WindowedValue<F::In>>,
    pub(crate) current_key: Option<F::Key>,
    pub(crate) windows: Vec<BoundedWindow>,
    pub(crate) window_current_index: i64,
    pub(crate) window_stop_index: usize,
    pub(crate) current_window: Option<BoundedWindow>,
    pub(crate) restriction: Option<F::Restriction>,
    pub(crate) watermark_state: Option<F::WatermarkState>,
    pub(crate) tracker: Option<TrackerHandle<F::Restriction, F::Position>>,
    pub(crate) estimator: Option<WatermarkEstimatorHandle<F::WatermarkState>>,
    pub(crate) initial_watermark: Option<Timestamp>,
    pub(crate) current_timer: Option<TimerRecord<F::Key>>,
    pub(crate) current_time_domain: Option<TimeDomain>,
}

impl<F: UserFn> Cursor<F> {
    fn new() -> Self {
        Cursor {
            element: None,
            current_key: None,
            windows: Vec::new(),
            window_current_index: -1,
            window_stop_index: 0,
            current_window: None,
            restriction: None,
            watermark_state: None,
            tracker: None,
            estimator: None,
            initial_watermark: None,
            current_timer: None,
            current_time_domain: None,
        }
    }

    fn reset_element(&mut self) {
        self.element = None;
        self.current_key = None;
        self.windows = Vec::new();
        self.window_current_index = -1;
        self.window_stop_index = 0;
        self.current_window = None;
        self.restriction = None;
        self.watermark_state = None;
        self.tracker = None;
        self.estimator = None;
        self.initial_watermark = None;
    }

    fn reset_timer(&mut self) {
        self.current_key = None;
        self.current_window = None;
        self.current_timer = None;
        self.current_time_domain = None;
    }
}

/// Everything the contexts and the split thread may touch; the user fn
/// itself stays outside so no lock is held across user hook invocations.
pub(crate) struct Shared<F: UserFn> {
    pub(crate) config: RunnerConfig,
    pub(crate) descriptor: UserFnDescriptor,
    pub(crate) cursor: Mutex<Cursor<F>>,
    pub(crate) timers: Option<TimerMachine<F::Key>>,
    pub(crate) consumers: BTreeMap<String, OutputConsumer<F::Out>>,
    pub(crate) state: Mutex<Box<dyn StateAccessor<F::Key>>>,
    pub(crate) side_inputs: Box<dyn SideInputAccessor>,
    pub(crate) finalizer: Mutex<Box<dyn BundleFinalizer>>,
    pub(crate) split_listener: Mutex<Box<dyn SplitListener>>,
    pub(crate) sizer: Option<Arc<dyn RestrictionSizer<F::Restriction>>>,
    pub(crate) full_input_coder: Option<FullInputCoder<F>>,
    pub(crate) clock: Mutex<Box<dyn ProcessingClock>>,
}

/// Collaborators wired into a [`TransformRunner`] at construction.
pub struct RunnerParts<F: UserFn> {
    pub user_fn: F,
    pub descriptor: UserFnDescriptor,
    pub config: RunnerConfig,
    pub consumers: BTreeMap<String, OutputConsumer<F::Out>>,
    pub timer_sinks: BTreeMap<String, TimerSink<F::Key>>,
    pub state: Box<dyn StateAccessor<F::Key>>,
    pub side_inputs: Box<dyn SideInputAccessor>,
    pub split_listener: Box<dyn SplitListener>,
    pub finalizer: Box<dyn BundleFinalizer>,
    pub sizer: Option<Arc<dyn RestrictionSizer<F::Restriction>>>,
    pub full_input_coder: Option<FullInputCoder<F>>,
    pub clock: Box<dyn ProcessingClock>,
}

impl<F: UserFn> RunnerParts<F> {
    /// Starts from no-op collaborators; callers fill in what the
    /// transform actually uses.
    pub fn new(user_fn: F, descriptor: UserFnDescriptor, config: RunnerConfig) -> Self {
        RunnerParts {
            user_fn,
            descriptor,
            config,
            consumers: BTreeMap::new(),
            timer_sinks: BTreeMap::new(),
            state: Box::new(UnconfiguredStateAccessor),
            side_inputs: Box::new(UnconfiguredSideInputs),
            split_listener: Box::new(DiscardingSplitListener),
            finalizer: Box::new(DiscardingFinalizer),
            sizer: None,
            full_input_coder: None,
            clock: Box::new(crate::time::clock::SystemClock::new()),
        }
    }
}

/// Drives one user transform instance over the lifetime of a bundle.
///
/// The processing thread feeds elements and timers; a second thread may
/// call [`TransformRunner::get_progress`] and [`TransformRunner::try_split`]
/// at any time.
pub struct TransformRunner<F: UserFn> {
    shared: Shared<F>,
    strategy: ExecutionStrategy,
    user: Mutex<F>,
    torn_down: AtomicBool,
}

impl<F: UserFn> TransformRunner<F> {
    pub fn new(parts: RunnerParts<F>) -> Result<Self, ConfigError> {
        let strategy = match parts.config.transform_urn.as_str() {
            PAR_DO_URN => ExecutionStrategy::ParDo {
                window_observing: parts.descriptor.process_observes_windows
                    || !parts.descriptor.side_input_tags.is_empty(),
            },
            PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS_URN => ExecutionStrategy::SplittableProcess,
            other => {
                return Err(ConfigError::UnknownUrn {
                    urn: other.to_string(),
                })
            }
        };

        if !parts.consumers.contains_key(&parts.config.main_output_tag) {
            return Err(ConfigError::MissingMainOutput {
                tag: parts.config.main_output_tag.clone(),
            });
        }

        if strategy == ExecutionStrategy::SplittableProcess {
            if !parts.descriptor.has_new_tracker {
                return Err(ConfigError::MissingSplittableCapability {
                    capability: "a new_tracker hook",
                });
            }
            if !parts.descriptor.has_new_watermark_estimator {
                return Err(ConfigError::MissingSplittableCapability {
                    capability: "a watermark estimator hook",
                });
            }
            if parts.sizer.is_none() {
                return Err(ConfigError::MissingSplittableCapability {
                    capability: "a restriction sizer",
                });
            }
            if parts.full_input_coder.is_none() {
                return Err(ConfigError::MissingSplittableCapability {
                    capability: "a full input coder",
                });
            }
        }

        let timers = if parts.descriptor.timer_families.is_empty() {
            None
        } else {
            let mut sinks = parts.timer_sinks;
            for family in parts.descriptor.timer_families.keys() {
                if !sinks.contains_key(family) {
                    return Err(ConfigError::MissingTimerSink {
                        family: family.clone(),
                    });
                }
            }
            sinks.retain(|family, _| parts.descriptor.timer_families.contains_key(family));
            Some(TimerMachine {
                tracker: Mutex::new(TimerBundleTracker::new()),
                sinks,
            })
        };

        Ok(TransformRunner {
            shared: Shared {
                config: parts.config,
                descriptor: parts.descriptor,
                cursor: Mutex::new(Cursor::new()),
                timers,
                consumers: parts.consumers,
                state: Mutex::new(parts.state),
                side_inputs: parts.side_inputs,
                finalizer: Mutex::new(parts.finalizer),
                split_listener: Mutex::new(parts.split_listener),
                sizer: parts.sizer,
                full_input_coder: parts.full_input_coder,
                clock: Mutex::new(parts.clock),
            },
            strategy,
            user: Mutex::new(parts.user_fn),
            torn_down: AtomicBool::new(false),
        })
    }

    /// Invokes the user start-bundle hook; no element context is live.
    pub fn start_bundle(&self) -> Result<(), RunnerError> {
        let mut user = self.user.lock().unwrap();
        let mut cx = UserContext::new(&self.shared, ContextRole::StartBundle, false, false);
        user.start_bundle(&mut cx)
    }

    /// Dispatches one plain element according to the transform's strategy.
    pub fn process_element(&self, element: WindowedValue<F::In>) -> Result<(), RunnerError> {
        let window_observing = match self.strategy {
            ExecutionStrategy::ParDo { window_observing } => window_observing,
            ExecutionStrategy::SplittableProcess => {
                return Err(ConfigError::InputMismatch {
                    strategy: "splittable",
                    input: "plain elements",
                }
                .into())
            }
        };

        let mut user = self.user.lock().unwrap();
        {
            let mut cursor = self.shared.cursor.lock().unwrap();
            cursor.current_key = F::element_key(&element.value);
            cursor.element = Some(element);
        }

        let result = if window_observing {
            let windows = {
                let cursor = self.shared.cursor.lock().unwrap();
                cursor.element.as_ref().map(|e| e.windows.clone()).unwrap_or_default()
            };
            let mut outcome = Ok(());
            for window in windows {
                self.shared.cursor.lock().unwrap().current_window = Some(window);
                let mut cx = UserContext::new(&self.shared, ContextRole::Process, true, false);
                if let Err(err) = user.process_element(&mut cx) {
                    outcome = Err(err);
                    break;
                }
            }
            outcome
        } else {
            let mut cx = UserContext::new(&self.shared, ContextRole::Process, false, false);
            user.process_element(&mut cx).map(|_| ())
        };

        self.shared.cursor.lock().unwrap().reset_element();
        result
    }

    /// Runs the splittable loop for one sized element-and-restriction:
    /// one tracker and watermark estimator per window, concurrent splits
    /// honored between windows, self-checkpoints forwarded to the split
    /// listener.
    pub fn process_sized_element_and_restriction(
        &self,
        element: WindowedValue<SizedElementRestriction<F::In, F::Restriction, F::WatermarkState>>,
    ) -> Result<(), RunnerError> {
        if self.strategy != ExecutionStrategy::SplittableProcess {
            return Err(ConfigError::InputMismatch {
                strategy: "non-splittable",
                input: "sized restriction pairs",
            }
            .into());
        }

        let restriction = element.value.element.restriction.clone();
        let watermark_state = element.value.element.watermark_state.clone();
        let base = WindowedValue::new(
            element.value.element.value,
            element.timestamp,
            element.windows,
            element.pane,
        );

        let mut user = self.user.lock().unwrap();
        {
            let mut cursor = self.shared.cursor.lock().unwrap();
            cursor.current_key = F::element_key(&base.value);
            cursor.windows = base.windows.clone();
            cursor.window_current_index = -1;
            cursor.window_stop_index = base.windows.len();
            cursor.element = Some(base);
        }

        loop {
            let step = (|| -> Result<bool, RunnerError> {
                {
                    let mut cursor = self.shared.cursor.lock().unwrap();
                    cursor.window_current_index += 1;
                    if cursor.window_current_index as usize >= cursor.window_stop_index {
                        cursor.reset_element();
                        return Ok(false);
                    }
                    let index = cursor.window_current_index as usize;
                    cursor.current_window = Some(cursor.windows[index].clone());
                    cursor.restriction = Some(restriction.clone());
                    cursor.watermark_state = Some(watermark_state.clone());
                    let tracker = TrackerHandle::observe(user.new_tracker(restriction.clone())?);
                    cursor.tracker = Some(tracker);
                    let estimator = WatermarkEstimatorHandle::thread_safe(
                        user.new_watermark_estimator(watermark_state.clone())?,
                    );
                    cursor.initial_watermark = Some(estimator.current_watermark());
                    cursor.estimator = Some(estimator);
                }

                // The split lock must not be held while user code runs.
                let mut cx = UserContext::new(&self.shared, ContextRole::Process, true, true);
                let continuation = user.process_element(&mut cx)?;

                let tracker = self
                    .shared
                    .cursor
                    .lock()
                    .unwrap()
                    .tracker
                    .clone()
                    .ok_or(ContextError::NoActiveElement)?;
                if !continuation.should_resume {
                    tracker.check_done()?;
                    return Ok(true);
                }

                // The user wants to resume later: checkpoint the remainder.
                // The runner may already have stolen it through a split, in
                // which case the restriction must be done.
                match self.try_split_internal(0.0, continuation.resume_delay, false)? {
                    None => tracker.check_done()?,
                    Some(split) => {
                        self.shared
                            .split_listener
                            .lock()
                            .unwrap()
                            .split(split.primary_roots, split.residual_roots);
                    }
                }
                Ok(true)
            })();

            match step {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(err) => {
                    self.shared.cursor.lock().unwrap().reset_element();
                    return Err(err);
                }
            }
        }
    }

    /// Fires a delivered timer, first draining any timers this bundle
    /// scheduled at or before its fire timestamp in the same domain.
    pub fn process_timer(
        &self,
        family_or_id: &str,
        record: TimerRecord<F::Key>,
    ) -> Result<(), RunnerError> {
        let machine = self
            .shared
            .timers
            .as_ref()
            .ok_or_else(|| ConfigError::UnknownTimerFamily {
                family: family_or_id.to_string(),
            })?;
        let spec = self
            .shared
            .descriptor
            .timer_family(family_or_id)
            .ok_or_else(|| ConfigError::UnknownTimerFamily {
                family: family_or_id.to_string(),
            })?;
        let time_domain = spec.time_domain;

        let mut user = self.user.lock().unwrap();
        let result = (|| -> Result<(), RunnerError> {
            for window in record.windows.clone() {
                {
                    let mut cursor = self.shared.cursor.lock().unwrap();
                    cursor.current_key = Some(record.user_key.clone());
                    cursor.current_window = Some(window.clone());
                    cursor.current_time_domain = Some(time_domain);
                }

                loop {
                    // Pop under the lock, insert the tombstone, then fire
                    // outside the lock so the hook can set timers again.
                    let next = {
                        let mut tracker = machine.tracker.lock().unwrap();
                        let group = tracker.group_mut(&record.user_key, &window);
                        match group.pop_earlier(time_domain, record.fire_timestamp) {
                            None => None,
                            Some((family, earlier)) => {
                                if group.superseded(&family, &earlier) {
                                    Some(None)
                                } else {
                                    group.insert_tombstone(
                                        &family,
                                        TimerRecord::cleared(
                                            earlier.user_key.clone(),
                                            earlier.dynamic_tag.clone(),
                                            earlier.windows.clone(),
                                        ),
                                    );
                                    Some(Some((family, earlier)))
                                }
                            }
                        }
                    };
                    let (family, earlier) = match next {
                        None => break,
                        Some(None) => continue,
                        Some(Some(popped)) => popped,
                    };
                    let (timer_id, family_id) = if earlier.dynamic_tag.is_empty() {
                        (family.clone(), String::new())
                    } else {
                        (earlier.dynamic_tag.clone(), family.clone())
                    };
                    self.shared.cursor.lock().unwrap().current_timer = Some(earlier);
                    let mut cx = UserContext::new(&self.shared, ContextRole::OnTimer, true, false);
                    user.on_timer(&timer_id, &family_id, &mut cx)?;
                }

                let superseded = machine
                    .tracker
                    .lock()
                    .unwrap()
                    .group_mut(&record.user_key, &window)
                    .superseded(family_or_id, &record);
                if !superseded {
                    let is_family = family_or_id.starts_with(TIMER_FAMILY_PREFIX);
                    let (timer_id, family_id) = if is_family {
                        (String::new(), family_or_id.to_string())
                    } else {
                        (family_or_id.to_string(), String::new())
                    };
                    self.shared.cursor.lock().unwrap().current_timer = Some(record.clone());
                    let mut cx = UserContext::new(&self.shared, ContextRole::OnTimer, true, false);
                    user.on_timer(&timer_id, &family_id, &mut cx)?;
                }
            }
            Ok(())
        })();

        self.shared.cursor.lock().unwrap().reset_timer();
        result
    }

    /// Invokes the user on-window-expiration hook once per window of the
    /// expiring timer.
    pub fn process_on_window_expiration(
        &self,
        record: TimerRecord<F::Key>,
    ) -> Result<(), RunnerError> {
        let mut user = self.user.lock().unwrap();
        {
            let mut cursor = self.shared.cursor.lock().unwrap();
            cursor.current_key = Some(record.user_key.clone());
            cursor.current_timer = Some(record.clone());
        }
        let result = (|| -> Result<(), RunnerError> {
            for window in record.windows.clone() {
                self.shared.cursor.lock().unwrap().current_window = Some(window);
                let mut cx =
                    UserContext::new(&self.shared, ContextRole::OnWindowExpiration, true, false);
                user.on_window_expiration(&mut cx)?;
            }
            Ok(())
        })();
        self.shared.cursor.lock().unwrap().reset_timer();
        result
    }

    /// Finishes the bundle: user hook, then timer flush, then state
    /// finalization.
    pub fn finish_bundle(&self) -> Result<(), RunnerError> {
        {
            let mut user = self.user.lock().unwrap();
            let mut cx = UserContext::new(&self.shared, ContextRole::FinishBundle, false, false);
            user.finish_bundle(&mut cx)?;
        }

        if let Some(machine) = &self.shared.timers {
            let outputs = machine.tracker.lock().unwrap().take_outputs();
            if !outputs.is_empty() {
                debug!(
                    "flushing {} timer record(s) for {}",
                    outputs.len(),
                    self.shared.config.transform_id
                );
            }
            for (family_or_id, record) in outputs {
                let sink = machine.sinks.get(&family_or_id).ok_or_else(|| {
                    ConfigError::MissingTimerSink {
                        family: family_or_id.clone(),
                    }
                })?;
                sink(record);
            }
        }

        self.shared.state.lock().unwrap().finalize()?;
        Ok(())
    }

    /// Invokes the user teardown hook. Valid exactly once.
    pub fn tear_down(&self) -> Result<(), RunnerError> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Err(RunnerError::AlreadyTornDown);
        }
        self.user.lock().unwrap().teardown()
    }

    /// Scaled progress across the live window range, or `None` between
    /// elements or when the tracker cannot estimate progress. Safe to call
    /// from the split thread.
    pub fn get_progress(&self) -> Option<Progress> {
        let cursor = self.shared.cursor.lock().unwrap();
        let tracker = cursor.tracker.as_ref()?;
        cursor.current_window.as_ref()?;
        let progress = tracker.progress()?;
        Some(scale_progress(
            progress,
            cursor.window_current_index as usize,
            cursor.window_stop_index,
        ))
    }

    /// Fraction of total element work completed, for downstream callers.
    pub fn completed_fraction(&self) -> f64 {
        self.get_progress()
            .map(|progress| progress.completed_fraction())
            .unwrap_or(0.0)
    }

    /// Writes the encoded progress snapshot under the configured short ids.
    pub fn report_progress(&self, monitoring_data: &mut BTreeMap<String, Vec<u8>>) {
        if let Some(progress) = self.get_progress() {
            ProgressReporter::new(
                self.shared.config.work_completed_short_id.clone(),
                self.shared.config.work_remaining_short_id.clone(),
            )
            .report(progress, monitoring_data);
        }
    }

    /// Attempts a dynamic split at the given fraction of remaining work.
    /// Safe to call from the split thread; returns `None` between elements.
    pub fn try_split(&self, fraction_of_remainder: f64) -> Result<Option<SplitResult>, RunnerError> {
        self.try_split_internal(fraction_of_remainder, DurationMillis::ZERO, true)
    }

    /// Runner-requested checkpoint: split at fraction zero with a resume
    /// delay. Refused until the current tracker has observed a successful
    /// claim.
    pub fn checkpoint(
        &self,
        resume_delay: DurationMillis,
    ) -> Result<Option<SplitResult>, RunnerError> {
        self.try_split_internal(0.0, resume_delay, true)
    }

    fn try_split_internal(
        &self,
        fraction_of_remainder: f64,
        resume_delay: DurationMillis,
        require_claim_for_checkpoint: bool,
    ) -> Result<Option<SplitResult>, RunnerError> {
        let (sized, initial_watermark, watermark_and_state) = {
            let mut cursor = self.shared.cursor.lock().unwrap();
            // Nothing to split between element and restriction processing.
            let Some(tracker) = cursor.tracker.clone() else {
                return Ok(None);
            };
            // A checkpoint on an unclaimed tracker would ship the whole
            // restriction back as residual.
            if fraction_of_remainder == 0.0
                && require_claim_for_checkpoint
                && !tracker.was_claimed()
            {
                return Ok(None);
            }
            let Some(estimator) = cursor.estimator.clone() else {
                return Ok(None);
            };
            // Capture the watermark before slicing so the lower bound
            // applies to the residual.
            let watermark_and_state = estimator.watermark_and_state();

            let split = {
                let (Some(element), Some(restriction), Some(watermark_state)) = (
                    cursor.element.as_ref(),
                    cursor.restriction.as_ref(),
                    cursor.watermark_state.as_ref(),
                ) else {
                    return Ok(None);
                };
                let cx = WindowSplitContext {
                    element,
                    restriction,
                    watermark_state,
                    windows: &cursor.windows,
                    current_window_index: cursor.window_current_index as usize,
                    stop_window_index: cursor.window_stop_index,
                };
                compute_split_for_process(
                    &cx,
                    fraction_of_remainder,
                    ElementSplitter::Tracker {
                        handle: &tracker,
                        watermark_and_state: &watermark_and_state,
                    },
                )
            };
            let Some(split) = split else {
                return Ok(None);
            };
            cursor.window_stop_index = split.new_stop_index;
            debug!(
                "split {} at fraction {fraction_of_remainder}: window stop index now {}",
                self.shared.config.transform_id, split.new_stop_index
            );

            let sizer = self.shared.sizer.as_ref().ok_or(
                ConfigError::MissingSplittableCapability {
                    capability: "a restriction sizer",
                },
            )?;
            let sized = size_windowed_split(split.window_split, sizer.as_ref());
            let initial_watermark = cursor.initial_watermark.unwrap_or(Timestamp::MIN);
            (sized, initial_watermark, watermark_and_state)
        };

        // Encoding happens outside the split lock.
        let coder = self.shared.full_input_coder.as_ref().ok_or(
            ConfigError::MissingSplittableCapability {
                capability: "a full input coder",
            },
        )?;
        let result = construct_split_result(
            Some(&sized),
            None,
            coder.as_ref(),
            initial_watermark,
            watermark_and_state.0,
            &self.shared.config.transform_id,
            &self.shared.config.main_input_id,
            &self.shared.config.output_ids,
            resume_delay,
        )?;
        Ok(Some(result))
    }
}

/// Pairs each present split root with its restriction size hint.
fn size_windowed_split<V: Clone, R: Clone, S: Clone>(
    split: WindowedSplitResult<V, R, S>,
    sizer: &dyn RestrictionSizer<R>,
) -> SizedWindowedSplitResult<V, R, S> {
    let full_size = split
        .primary_in_fully_processed_windows
        .as_ref()
        .or(split.residual_in_unprocessed_windows.as_ref())
        .map(|root| sizer.size(&root.value.restriction))
        .unwrap_or(0.0);
    let sized_with = |root: Option<WindowedValue<ElementRestriction<V, R, S>>>,
                      size: Option<f64>| {
        root.map(|root| {
            let size = size.unwrap_or_else(|| sizer.size(&root.value.restriction));
            root.map_value(|element| SizedElementRestriction::new(element, size))
        })
    };
    SizedWindowedSplitResult {
        primary_in_fully_processed_windows: sized_with(
            split.primary_in_fully_processed_windows,
            Some(full_size),
        ),
        primary_split: sized_with(split.primary_split, None),
        residual_split: sized_with(split.residual_split, None),
        residual_in_unprocessed_windows: sized_with(
            split.residual_in_unprocessed_windows,
            Some(full_size),
        ),
    }
}

struct UnconfiguredStateAccessor;

impl<K> StateAccessor<K> for UnconfiguredStateAccessor {
    fn state(
        &mut self,
        state_id: &str,
        _key: &K,
        _window: &BoundedWindow,
    ) -> Result<Box<dyn StateCell>, StateError> {
        Err(StateError::new(format!(
            "no state channel configured for {state_id}"
        )))
    }

    fn finalize(&mut self) -> Result<(), StateError> {
        Ok(())
    }
}

struct UnconfiguredSideInputs;

impl SideInputAccessor for UnconfiguredSideInputs {
    fn get(&self, tag: &str, _window: &BoundedWindow) -> Result<Vec<u8>, StateError> {
        Err(StateError::new(format!("no side input configured for {tag}")))
    }
}

struct DiscardingSplitListener;

impl SplitListener for DiscardingSplitListener {
    fn split(
        &mut self,
        _primary_roots: Vec<BundleApplication>,
        _residual_roots: Vec<DelayedBundleApplication>,
    ) {
    }
}

struct DiscardingFinalizer;

impl BundleFinalizer for DiscardingFinalizer {
    fn register(&mut self, _callback: BundleFinalizationCallback) {}
}
