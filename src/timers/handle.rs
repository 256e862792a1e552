use std::sync::Mutex;
use thiserror::Error;

use crate::element::window::BoundedWindow;
use crate::element::windowed_value::PaneInfo;
use crate::time::domain::{garbage_collection_time, DurationMillis, TimeDomain, Timestamp};
use crate::timers::record::TimerRecord;
use crate::timers::tracker::TimerBundleTracker;

/// Rejected timer modifications. All validation happens at set time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error(
        "attempted to set event time timer for {target} but that is after \
         the expiration of window {expiry}"
    )]
    AfterWindowExpiration { target: Timestamp, expiry: Timestamp },
    #[error(
        "cannot set timer with output timestamp {output}. Output timestamps must be \
         no earlier than the hold timestamp ({hold}) minus the allowed skew \
         ({allowed_skew}) and no later than {max}"
    )]
    OutputTimestampOutOfBounds {
        output: Timestamp,
        hold: Timestamp,
        allowed_skew: DurationMillis,
        max: Timestamp,
    },
    #[error(
        "attempted to set an event-time timer with an output timestamp of {output} \
         that is after the timer firing timestamp {fire}"
    )]
    OutputAfterFiring { output: Timestamp, fire: Timestamp },
    #[error(
        "attempted to set an event-time timer with a firing timestamp of {fire} \
         that is after the expiration of window {expiry}"
    )]
    FiringAfterWindowExpiration { fire: Timestamp, expiry: Timestamp },
    #[error(
        "attempted to set a processing-time timer with an output timestamp of {output} \
         that is after the expiration of window {expiry}"
    )]
    OutputAfterWindowExpiration { output: Timestamp, expiry: Timestamp },
}

/// Handle user code sets, reschedules, or clears one timer through.
///
/// The fire target is either absolute (`set`) or derived from the firing
/// base plus `offset`, optionally aligned to a `align` period boundary
/// (`set_relative`). The output hold defaults per time domain and can be
/// overridden or disabled before setting.
pub struct TimerHandle<'a, K> {
    tracker: &'a Mutex<TimerBundleTracker<K>>,
    family_or_id: String,
    user_key: K,
    dynamic_tag: String,
    window: BoundedWindow,
    hold_base: Timestamp,
    fire_base: Timestamp,
    pane: PaneInfo,
    time_domain: TimeDomain,
    allowed_lateness: DurationMillis,
    allowed_skew: DurationMillis,
    output_timestamp: Option<Timestamp>,
    no_output_timestamp: bool,
    period: DurationMillis,
    offset: DurationMillis,
}

impl<'a, K: Clone + Ord> TimerHandle<'a, K> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tracker: &'a Mutex<TimerBundleTracker<K>>,
        family_or_id: String,
        user_key: K,
        dynamic_tag: String,
        window: BoundedWindow,
        hold_base: Timestamp,
        fire_base: Timestamp,
        pane: PaneInfo,
        time_domain: TimeDomain,
        allowed_lateness: DurationMillis,
        allowed_skew: DurationMillis,
    ) -> Self {
        TimerHandle {
            tracker,
            family_or_id,
            user_key,
            dynamic_tag,
            window,
            hold_base,
            fire_base,
            pane,
            time_domain,
            allowed_lateness,
            allowed_skew,
            output_timestamp: None,
            no_output_timestamp: false,
            period: DurationMillis::ZERO,
            offset: DurationMillis::ZERO,
        }
    }

    /// Offset added to the firing base by [`TimerHandle::set_relative`].
    pub fn offset(&mut self, offset: DurationMillis) -> &mut Self {
        self.offset = offset;
        self
    }

    /// Period boundary [`TimerHandle::set_relative`] rounds the target up to.
    pub fn align(&mut self, period: DurationMillis) -> &mut Self {
        self.period = period;
        self
    }

    pub fn with_output_timestamp(&mut self, output_timestamp: Timestamp) -> &mut Self {
        self.output_timestamp = Some(output_timestamp);
        self.no_output_timestamp = false;
        self
    }

    pub fn with_no_output_timestamp(&mut self) -> &mut Self {
        self.output_timestamp = None;
        self.no_output_timestamp = true;
        self
    }

    /// The firing base relative targets are computed from.
    pub fn current_relative_time(&self) -> Timestamp {
        self.fire_base
    }

    /// Schedules the timer at an absolute instant.
    pub fn set(&mut self, absolute_time: Timestamp) -> Result<(), TimerError> {
        if self.time_domain == TimeDomain::EventTime {
            let expiry = garbage_collection_time(&self.window, self.allowed_lateness);
            if absolute_time > expiry {
                return Err(TimerError::AfterWindowExpiration {
                    target: absolute_time,
                    expiry,
                });
            }
        }
        let record = self.record_for(absolute_time)?;
        self.push(record);
        Ok(())
    }

    /// Schedules the timer relative to the firing base, honoring the
    /// configured offset and alignment period.
    pub fn set_relative(&mut self) -> Result<(), TimerError> {
        let target = if self.period.is_zero() {
            self.fire_base.saturating_add(self.offset)
        } else {
            let shifted = self.fire_base.saturating_add(self.offset);
            let since_boundary = shifted.millis().rem_euclid(self.period.millis());
            if since_boundary == 0 {
                self.fire_base
            } else {
                self.fire_base
                    .saturating_add(self.period)
                    .saturating_sub(DurationMillis::from_millis(since_boundary))
            }
        };
        let target = self.clamp_to_window_expiry(target);
        let record = self.record_for(target)?;
        self.push(record);
        Ok(())
    }

    /// Buffers a tombstone for this timer's (family, tag, window).
    pub fn clear(&mut self) {
        let record = TimerRecord::cleared(
            self.user_key.clone(),
            self.dynamic_tag.clone(),
            vec![self.window.clone()],
        );
        self.push(record);
    }

    /// Event-time targets may not pass the window expiry; relative targets
    /// are pulled back to it rather than rejected.
    fn clamp_to_window_expiry(&self, target: Timestamp) -> Timestamp {
        if self.time_domain == TimeDomain::EventTime {
            let expiry = garbage_collection_time(&self.window, self.allowed_lateness);
            if target > expiry {
                return expiry;
            }
        }
        target
    }

    fn push(&self, record: TimerRecord<K>) {
        self.tracker.lock().unwrap().record(
            &self.user_key,
            &self.window,
            &self.family_or_id,
            self.time_domain,
            record,
        );
    }

    fn record_for(&self, scheduled: Timestamp) -> Result<TimerRecord<K>, TimerError> {
        let mut output = self.output_timestamp;
        if let Some(ts) = output {
            let lower_bound = self.hold_base.saturating_sub(self.allowed_skew);
            if ts < lower_bound || ts > Timestamp::MAX {
                return Err(TimerError::OutputTimestampOutOfBounds {
                    output: ts,
                    hold: self.hold_base,
                    allowed_skew: self.allowed_skew,
                    max: Timestamp::MAX,
                });
            }
        }

        // Default the hold to the delivery time for event-time timers and
        // to the element/firing-timer hold for processing-time timers.
        if !self.no_output_timestamp && output.is_none() {
            output = Some(match self.time_domain {
                TimeDomain::EventTime => scheduled,
                TimeDomain::ProcessingTime => self.hold_base,
            });
        }

        let hold = match output {
            Some(ts) => {
                let expiry = garbage_collection_time(&self.window, self.allowed_lateness);
                match self.time_domain {
                    TimeDomain::EventTime => {
                        if ts > scheduled {
                            return Err(TimerError::OutputAfterFiring {
                                output: ts,
                                fire: scheduled,
                            });
                        }
                        if scheduled > expiry {
                            return Err(TimerError::FiringAfterWindowExpiration {
                                fire: scheduled,
                                expiry,
                            });
                        }
                    }
                    TimeDomain::ProcessingTime => {
                        if ts > expiry {
                            return Err(TimerError::OutputAfterWindowExpiration {
                                output: ts,
                                expiry,
                            });
                        }
                    }
                }
                ts
            }
            None => Timestamp::NO_OUTPUT_HOLD,
        };

        Ok(TimerRecord::set(
            self.user_key.clone(),
            self.dynamic_tag.clone(),
            vec![self.window.clone()],
            scheduled,
            hold,
            self.pane,
        ))
    }
}

/// Creates per-tag [`TimerHandle`]s that share one family id and context.
pub struct TimerFamilyHandle<'a, K> {
    tracker: &'a Mutex<TimerBundleTracker<K>>,
    family_id: String,
    user_key: K,
    window: BoundedWindow,
    hold_base: Timestamp,
    fire_base: Timestamp,
    pane: PaneInfo,
    time_domain: TimeDomain,
    allowed_lateness: DurationMillis,
    allowed_skew: DurationMillis,
}

impl<'a, K: Clone + Ord> TimerFamilyHandle<'a, K> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tracker: &'a Mutex<TimerBundleTracker<K>>,
        family_id: String,
        user_key: K,
        window: BoundedWindow,
        hold_base: Timestamp,
        fire_base: Timestamp,
        pane: PaneInfo,
        time_domain: TimeDomain,
        allowed_lateness: DurationMillis,
        allowed_skew: DurationMillis,
    ) -> Self {
        TimerFamilyHandle {
            tracker,
            family_id,
            user_key,
            window,
            hold_base,
            fire_base,
            pane,
            time_domain,
            allowed_lateness,
            allowed_skew,
        }
    }

    pub fn get(&self, dynamic_tag: impl Into<String>) -> TimerHandle<'a, K> {
        TimerHandle::new(
            self.tracker,
            self.family_id.clone(),
            self.user_key.clone(),
            dynamic_tag.into(),
            self.window.clone(),
            self.hold_base,
            self.fire_base,
            self.pane,
            self.time_domain,
            self.allowed_lateness,
            self.allowed_skew,
        )
    }

    pub fn set(&self, dynamic_tag: impl Into<String>, absolute_time: Timestamp) -> Result<(), TimerError> {
        self.get(dynamic_tag).set(absolute_time)
    }
}
