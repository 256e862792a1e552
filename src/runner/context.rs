use thiserror::Error;

use crate::element::window::BoundedWindow;
use crate::element::windowed_value::{PaneInfo, WindowedValue};
use crate::error::{RunnerError, UserCodeError};
use crate::runner::interfaces::{BundleFinalizationCallback, StateCell};
use crate::runner::transform::Shared;
use crate::sdf::restriction::TrackerHandle;
use crate::sdf::watermark::WatermarkEstimatorHandle;
use crate::time::domain::{DurationMillis, TimeDomain, Timestamp};
use crate::timers::handle::{TimerFamilyHandle, TimerHandle};
use crate::user_fn::invoker::UserFn;

/// Which lifecycle hook the context is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    StartBundle,
    Process,
    FinishBundle,
    OnTimer,
    OnWindowExpiration,
}

impl ContextRole {
    fn as_str(self) -> &'static str {
        match self {
            ContextRole::StartBundle => "start-bundle",
            ContextRole::Process => "process-element",
            ContextRole::FinishBundle => "finish-bundle",
            ContextRole::OnTimer => "on-timer",
            ContextRole::OnWindowExpiration => "on-window-expiration",
        }
    }
}

/// Rejected context operations: wrong role, missing capability, or a
/// timestamp outside the allowed bounds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("{operation} is not available in the {role} context")]
    Unsupported {
        operation: &'static str,
        role: &'static str,
    },
    #[error("cannot access {operation} in a non-window-observing context")]
    RequiresWindowObserving { operation: &'static str },
    #[error("unknown output tag {tag}")]
    UnknownOutputTag { tag: String },
    #[error("no state declaration found for {state_id}")]
    UnknownState { state_id: String },
    #[error("unknown timer family {family}")]
    UnknownTimerFamily { family: String },
    #[error("unknown side input {tag}")]
    UnknownSideInput { tag: String },
    #[error("accessing {operation} in unkeyed context")]
    UnkeyedAccess { operation: &'static str },
    #[error(
        "Cannot output with timestamp {timestamp}. Output timestamps must be no \
         earlier than the timestamp of the current input ({input_timestamp}) minus \
         the allowed skew ({allowed_skew}) and no later than {max}."
    )]
    OutputTimestampOutOfBounds {
        timestamp: Timestamp,
        input_timestamp: Timestamp,
        allowed_skew: DurationMillis,
        max: Timestamp,
    },
    #[error("no element is being processed")]
    NoActiveElement,
}

/// The view user hooks get of the runner.
///
/// One type serves every lifecycle role; operations a role does not
/// support return a descriptive [`ContextError`] instead of existing on a
/// parallel class hierarchy. Live element state is looked up on each call
/// so the split path can observe a consistent cursor.
pub struct UserContext<'a, F: UserFn> {
    shared: &'a Shared<F>,
    role: ContextRole,
    window_observing: bool,
    splittable: bool,
}

impl<'a, F: UserFn> UserContext<'a, F> {
    pub(crate) fn new(
        shared: &'a Shared<F>,
        role: ContextRole,
        window_observing: bool,
        splittable: bool,
    ) -> Self {
        UserContext {
            shared,
            role,
            window_observing,
            splittable,
        }
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }

    fn require_role(
        &self,
        operation: &'static str,
        roles: &[ContextRole],
    ) -> Result<(), ContextError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ContextError::Unsupported {
                operation,
                role: self.role.as_str(),
            })
        }
    }

    fn live_element(&self) -> Result<WindowedValue<F::In>, ContextError> {
        self.shared
            .cursor
            .lock()
            .unwrap()
            .element
            .clone()
            .ok_or(ContextError::NoActiveElement)
    }

    fn live_timer(&self) -> Result<crate::timers::record::TimerRecord<F::Key>, ContextError> {
        self.shared
            .cursor
            .lock()
            .unwrap()
            .current_timer
            .clone()
            .ok_or(ContextError::NoActiveElement)
    }

    fn live_window(&self) -> Result<BoundedWindow, ContextError> {
        self.shared
            .cursor
            .lock()
            .unwrap()
            .current_window
            .clone()
            .ok_or(ContextError::NoActiveElement)
    }

    /// The value under processing.
    pub fn element(&self) -> Result<F::In, RunnerError> {
        self.require_role("element", &[ContextRole::Process])?;
        Ok(self.live_element()?.value)
    }

    /// Event timestamp of the element, or the hold timestamp of the firing
    /// timer.
    pub fn timestamp(&self) -> Result<Timestamp, RunnerError> {
        match self.role {
            ContextRole::Process => Ok(self.live_element()?.timestamp),
            ContextRole::OnTimer | ContextRole::OnWindowExpiration => {
                Ok(self.live_timer()?.hold_timestamp)
            }
            _ => Err(ContextError::Unsupported {
                operation: "timestamp",
                role: self.role.as_str(),
            }
            .into()),
        }
    }

    /// The window being processed; requires a window-observing context.
    pub fn window(&self) -> Result<BoundedWindow, RunnerError> {
        self.require_role(
            "window",
            &[
                ContextRole::Process,
                ContextRole::OnTimer,
                ContextRole::OnWindowExpiration,
            ],
        )?;
        if self.role == ContextRole::Process && !self.window_observing {
            return Err(ContextError::RequiresWindowObserving { operation: "window" }.into());
        }
        Ok(self.live_window()?)
    }

    pub fn pane(&self) -> Result<PaneInfo, RunnerError> {
        match self.role {
            ContextRole::Process => Ok(self.live_element()?.pane),
            ContextRole::OnTimer | ContextRole::OnWindowExpiration => Ok(self.live_timer()?.pane),
            _ => Err(ContextError::Unsupported {
                operation: "pane",
                role: self.role.as_str(),
            }
            .into()),
        }
    }

    /// The user key of the firing timer.
    pub fn key(&self) -> Result<F::Key, RunnerError> {
        self.require_role(
            "key",
            &[ContextRole::OnTimer, ContextRole::OnWindowExpiration],
        )?;
        self.shared
            .cursor
            .lock()
            .unwrap()
            .current_key
            .clone()
            .ok_or_else(|| ContextError::NoActiveElement.into())
    }

    /// When the firing timer was scheduled to fire.
    pub fn fire_timestamp(&self) -> Result<Timestamp, RunnerError> {
        self.require_role("fire_timestamp", &[ContextRole::OnTimer])?;
        Ok(self.live_timer()?.fire_timestamp)
    }

    pub fn time_domain(&self) -> Result<TimeDomain, RunnerError> {
        self.require_role("time_domain", &[ContextRole::OnTimer])?;
        self.shared
            .cursor
            .lock()
            .unwrap()
            .current_time_domain
            .ok_or_else(|| ContextError::NoActiveElement.into())
    }

    fn check_output_timestamp(
        &self,
        timestamp: Timestamp,
        reference: Timestamp,
    ) -> Result<(), ContextError> {
        let skew = self.shared.descriptor.allowed_timestamp_skew;
        let lower_bound = reference.saturating_sub(skew);
        if timestamp < lower_bound || timestamp > Timestamp::MAX {
            return Err(ContextError::OutputTimestampOutOfBounds {
                timestamp,
                input_timestamp: reference,
                allowed_skew: skew,
                max: Timestamp::MAX,
            });
        }
        Ok(())
    }

    fn deliver(&self, tag: &str, output: WindowedValue<F::Out>) -> Result<(), RunnerError> {
        if self.shared.descriptor.estimator_observes_timestamps {
            let estimator = self.shared.cursor.lock().unwrap().estimator.clone();
            if let Some(estimator) = estimator {
                estimator.observe_timestamp(output.timestamp);
            }
        }
        let consumer =
            self.shared
                .consumers
                .get(tag)
                .ok_or_else(|| ContextError::UnknownOutputTag {
                    tag: tag.to_string(),
                })?;
        consumer(output).map_err(|source| RunnerError::UserCode(UserCodeError::wrap(source)))
    }

    /// Builds the default windowed value for the current role: element
    /// timestamp and windows for process contexts, the firing timer's hold
    /// and pane for timer contexts.
    fn default_output(&self, value: F::Out) -> Result<WindowedValue<F::Out>, RunnerError> {
        match self.role {
            ContextRole::Process => {
                let element = self.live_element()?;
                if self.window_observing {
                    let window = self.live_window()?;
                    Ok(WindowedValue::in_window(
                        value,
                        element.timestamp,
                        window,
                        element.pane,
                    ))
                } else {
                    Ok(element.with_value(value))
                }
            }
            ContextRole::OnTimer | ContextRole::OnWindowExpiration => {
                let timer = self.live_timer()?;
                let window = self.live_window()?;
                if self.role == ContextRole::OnTimer {
                    // A timer without an output hold cannot produce output
                    // at its hold timestamp.
                    self.check_output_timestamp(timer.hold_timestamp, timer.hold_timestamp)?;
                }
                Ok(WindowedValue::in_window(
                    value,
                    timer.hold_timestamp,
                    window,
                    timer.pane,
                ))
            }
            _ => Err(ContextError::Unsupported {
                operation: "output",
                role: self.role.as_str(),
            }
            .into()),
        }
    }

    /// Emits to the main output with the role's default timestamp.
    pub fn output(&mut self, value: F::Out) -> Result<(), RunnerError> {
        let output = self.default_output(value)?;
        self.deliver(&self.shared.config.main_output_tag.clone(), output)
    }

    /// Emits to a tagged output with the role's default timestamp.
    pub fn output_tagged(&mut self, tag: &str, value: F::Out) -> Result<(), RunnerError> {
        let output = self.default_output(value)?;
        self.deliver(tag, output)
    }

    fn reference_timestamp(&self) -> Result<Timestamp, ContextError> {
        match self.role {
            ContextRole::Process => Ok(self.live_element()?.timestamp),
            ContextRole::OnTimer | ContextRole::OnWindowExpiration => {
                Ok(self.live_timer()?.hold_timestamp)
            }
            _ => Err(ContextError::Unsupported {
                operation: "output_with_timestamp",
                role: self.role.as_str(),
            }),
        }
    }

    /// Emits to the main output at an explicit timestamp, validated
    /// against the allowed skew.
    pub fn output_with_timestamp(
        &mut self,
        value: F::Out,
        timestamp: Timestamp,
    ) -> Result<(), RunnerError> {
        self.output_tagged_with_timestamp(&self.shared.config.main_output_tag.clone(), value, timestamp)
    }

    pub fn output_tagged_with_timestamp(
        &mut self,
        tag: &str,
        value: F::Out,
        timestamp: Timestamp,
    ) -> Result<(), RunnerError> {
        let reference = self.reference_timestamp()?;
        self.check_output_timestamp(timestamp, reference)?;
        let output = match self.role {
            ContextRole::Process => {
                let element = self.live_element()?;
                if self.window_observing {
                    let window = self.live_window()?;
                    WindowedValue::in_window(value, timestamp, window, element.pane)
                } else {
                    WindowedValue::new(value, timestamp, element.windows, element.pane)
                }
            }
            _ => {
                let timer = self.live_timer()?;
                let window = self.live_window()?;
                WindowedValue::in_window(value, timestamp, window, timer.pane)
            }
        };
        self.deliver(tag, output)
    }

    /// Emits a fully specified windowed value.
    pub fn output_windowed(
        &mut self,
        value: F::Out,
        timestamp: Timestamp,
        windows: Vec<BoundedWindow>,
        pane: PaneInfo,
    ) -> Result<(), RunnerError> {
        self.output_tagged_windowed(
            &self.shared.config.main_output_tag.clone(),
            value,
            timestamp,
            windows,
            pane,
        )
    }

    pub fn output_tagged_windowed(
        &mut self,
        tag: &str,
        value: F::Out,
        timestamp: Timestamp,
        windows: Vec<BoundedWindow>,
        pane: PaneInfo,
    ) -> Result<(), RunnerError> {
        let reference = self.reference_timestamp()?;
        self.check_output_timestamp(timestamp, reference)?;
        self.deliver(tag, WindowedValue::new(value, timestamp, windows, pane))
    }

    /// Finish-bundle output: explicit timestamp and window, no-firing pane.
    pub fn output_at(
        &mut self,
        value: F::Out,
        timestamp: Timestamp,
        window: BoundedWindow,
    ) -> Result<(), RunnerError> {
        self.output_tagged_at(&self.shared.config.main_output_tag.clone(), value, timestamp, window)
    }

    pub fn output_tagged_at(
        &mut self,
        tag: &str,
        value: F::Out,
        timestamp: Timestamp,
        window: BoundedWindow,
    ) -> Result<(), RunnerError> {
        self.require_role("output_at", &[ContextRole::FinishBundle])?;
        self.deliver(
            tag,
            WindowedValue::in_window(value, timestamp, window, PaneInfo::NO_FIRING),
        )
    }

    fn current_key(&self, operation: &'static str) -> Result<F::Key, ContextError> {
        self.shared
            .cursor
            .lock()
            .unwrap()
            .current_key
            .clone()
            .ok_or(ContextError::UnkeyedAccess { operation })
    }

    /// Binds a declared state cell for the current key and window.
    pub fn state(&mut self, state_id: &str) -> Result<Box<dyn StateCell>, RunnerError> {
        self.require_role(
            "state",
            &[
                ContextRole::Process,
                ContextRole::OnTimer,
                ContextRole::OnWindowExpiration,
            ],
        )?;
        if self.role == ContextRole::Process && !self.window_observing {
            return Err(ContextError::RequiresWindowObserving { operation: "state" }.into());
        }
        if !self.shared.descriptor.state_ids.contains(state_id) {
            return Err(ContextError::UnknownState {
                state_id: state_id.to_string(),
            }
            .into());
        }
        let key = self.current_key("state")?;
        let window = self.live_window()?;
        Ok(self
            .shared
            .state
            .lock()
            .unwrap()
            .state(state_id, &key, &window)?)
    }

    /// Reads a materialized side input for the current window.
    pub fn side_input(&self, tag: &str) -> Result<Vec<u8>, RunnerError> {
        self.require_role("side_input", &[ContextRole::Process])?;
        if !self.window_observing {
            return Err(ContextError::RequiresWindowObserving {
                operation: "side_input",
            }
            .into());
        }
        if !self.shared.descriptor.side_input_tags.contains(tag) {
            return Err(ContextError::UnknownSideInput {
                tag: tag.to_string(),
            }
            .into());
        }
        let window = self.live_window()?;
        Ok(self.shared.side_inputs.get(tag, &window)?)
    }

    /// Handle for a declared plain timer.
    pub fn timer(&self, timer_id: &str) -> Result<TimerHandle<'a, F::Key>, RunnerError> {
        self.timer_handle("timer", timer_id, String::new())
    }

    /// Handle factory for a declared timer family.
    pub fn timer_family(
        &self,
        family_id: &str,
    ) -> Result<TimerFamilyHandle<'a, F::Key>, RunnerError> {
        self.require_role("timer_family", &[ContextRole::Process, ContextRole::OnTimer])?;
        if self.role == ContextRole::Process && !self.window_observing {
            return Err(ContextError::RequiresWindowObserving {
                operation: "timer_family",
            }
            .into());
        }
        let spec = self
            .shared
            .descriptor
            .timer_family(family_id)
            .ok_or_else(|| ContextError::UnknownTimerFamily {
                family: family_id.to_string(),
            })?;
        let machine =
            self.shared
                .timers
                .as_ref()
                .ok_or_else(|| ContextError::UnknownTimerFamily {
                    family: family_id.to_string(),
                })?;
        let key = self.current_key("timer_family")?;
        let window = self.live_window()?;
        let (hold_base, fire_base, pane) = self.timer_bases(spec.time_domain)?;
        Ok(TimerFamilyHandle::new(
            &machine.tracker,
            family_id.to_string(),
            key,
            window,
            hold_base,
            fire_base,
            pane,
            spec.time_domain,
            self.shared.config.allowed_lateness,
            self.shared.descriptor.allowed_timestamp_skew,
        ))
    }

    fn timer_handle(
        &self,
        operation: &'static str,
        family_or_id: &str,
        dynamic_tag: String,
    ) -> Result<TimerHandle<'a, F::Key>, RunnerError> {
        self.require_role(operation, &[ContextRole::Process, ContextRole::OnTimer])?;
        if self.role == ContextRole::Process && !self.window_observing {
            return Err(ContextError::RequiresWindowObserving { operation }.into());
        }
        let spec = self
            .shared
            .descriptor
            .timer_family(family_or_id)
            .ok_or_else(|| ContextError::UnknownTimerFamily {
                family: family_or_id.to_string(),
            })?;
        let machine =
            self.shared
                .timers
                .as_ref()
                .ok_or_else(|| ContextError::UnknownTimerFamily {
                    family: family_or_id.to_string(),
                })?;
        let key = self.current_key(operation)?;
        let window = self.live_window()?;
        let (hold_base, fire_base, pane) = self.timer_bases(spec.time_domain)?;
        Ok(TimerHandle::new(
            &machine.tracker,
            family_or_id.to_string(),
            key,
            dynamic_tag,
            window,
            hold_base,
            fire_base,
            pane,
            spec.time_domain,
            self.shared.config.allowed_lateness,
            self.shared.descriptor.allowed_timestamp_skew,
        ))
    }

    /// Hold base is the element timestamp or the firing timer's hold; the
    /// fire base is wall clock for processing-time timers.
    fn timer_bases(
        &self,
        time_domain: TimeDomain,
    ) -> Result<(Timestamp, Timestamp, PaneInfo), RunnerError> {
        let (hold_base, event_fire_base, pane) = match self.role {
            ContextRole::Process => {
                let element = self.live_element()?;
                (element.timestamp, element.timestamp, element.pane)
            }
            _ => {
                let timer = self.live_timer()?;
                (timer.hold_timestamp, timer.fire_timestamp, timer.pane)
            }
        };
        let fire_base = match time_domain {
            TimeDomain::EventTime => event_fire_base,
            TimeDomain::ProcessingTime => self.shared.clock.lock().unwrap().now(),
        };
        Ok((hold_base, fire_base, pane))
    }

    /// The restriction installed for the current splittable invocation.
    pub fn restriction(&self) -> Result<F::Restriction, RunnerError> {
        self.require_splittable("restriction")?;
        self.shared
            .cursor
            .lock()
            .unwrap()
            .restriction
            .clone()
            .ok_or_else(|| ContextError::NoActiveElement.into())
    }

    pub fn watermark_estimator_state(&self) -> Result<F::WatermarkState, RunnerError> {
        self.require_splittable("watermark_estimator_state")?;
        self.shared
            .cursor
            .lock()
            .unwrap()
            .watermark_state
            .clone()
            .ok_or_else(|| ContextError::NoActiveElement.into())
    }

    /// Shared tracker for the current restriction; claims flow through it.
    pub fn restriction_tracker(
        &self,
    ) -> Result<TrackerHandle<F::Restriction, F::Position>, RunnerError> {
        self.require_splittable("restriction_tracker")?;
        self.shared
            .cursor
            .lock()
            .unwrap()
            .tracker
            .clone()
            .ok_or_else(|| ContextError::NoActiveElement.into())
    }

    /// Thread-safe view of the live watermark estimator.
    pub fn watermark_estimator(
        &self,
    ) -> Result<WatermarkEstimatorHandle<F::WatermarkState>, RunnerError> {
        self.require_splittable("watermark_estimator")?;
        self.shared
            .cursor
            .lock()
            .unwrap()
            .estimator
            .clone()
            .ok_or_else(|| ContextError::NoActiveElement.into())
    }

    fn require_splittable(&self, operation: &'static str) -> Result<(), ContextError> {
        self.require_role(operation, &[ContextRole::Process])?;
        if !self.splittable {
            return Err(ContextError::Unsupported {
                operation,
                role: self.role.as_str(),
            });
        }
        Ok(())
    }

    /// Registers a callback to run after the runner commits this bundle.
    pub fn register_finalization(
        &mut self,
        callback: BundleFinalizationCallback,
    ) -> Result<(), RunnerError> {
        self.require_role(
            "register_finalization",
            &[
                ContextRole::StartBundle,
                ContextRole::Process,
                ContextRole::FinishBundle,
            ],
        )?;
        self.shared.finalizer.lock().unwrap().register(callback);
        Ok(())
    }
}
