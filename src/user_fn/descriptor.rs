use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::time::domain::{DurationMillis, TimeDomain};

/// Transform payload identifier for a plain element-wise transform.
pub const PAR_DO_URN: &str = "beam:transform:pardo:v1";

/// Transform payload identifier for splittable sized element-and-restriction
/// processing.
pub const PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS_URN: &str =
    "beam:transform:sdf_process_sized_element_and_restrictions:v1";

/// Local names carrying this prefix denote timer families with dynamic
/// tags; all other names denote plain single-tag timers.
pub const TIMER_FAMILY_PREFIX: &str = "tfs-";

/// Malformed runner configuration; detected before any element flows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown transform urn {urn}")]
    UnknownUrn { urn: String },
    #[error("main output tag {tag} has no registered consumer")]
    MissingMainOutput { tag: String },
    #[error("timer family {family} has no outgoing sink")]
    MissingTimerSink { family: String },
    #[error("timer family {family} is not declared by the transform")]
    UnknownTimerFamily { family: String },
    #[error("splittable transform requires {capability}")]
    MissingSplittableCapability { capability: &'static str },
    #[error("{strategy} transforms do not accept {input}")]
    InputMismatch {
        strategy: &'static str,
        input: &'static str,
    },
}

/// Time-domain declaration for one timer family or plain timer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFamilySpec {
    pub time_domain: TimeDomain,
}

impl TimerFamilySpec {
    pub fn event_time() -> Self {
        TimerFamilySpec {
            time_domain: TimeDomain::EventTime,
        }
    }

    pub fn processing_time() -> Self {
        TimerFamilySpec {
            time_domain: TimeDomain::ProcessingTime,
        }
    }
}

/// What the user transform declares: which lifecycle hooks exist and what
/// each observes. Drives strategy selection and context capabilities.
#[derive(Debug, Clone, Default)]
pub struct UserFnDescriptor {
    pub has_start_bundle: bool,
    pub has_finish_bundle: bool,
    pub has_on_timer: bool,
    pub has_on_window_expiration: bool,
    pub has_new_tracker: bool,
    pub has_new_watermark_estimator: bool,
    pub has_get_size: bool,
    pub process_observes_windows: bool,
    pub new_tracker_observes_windows: bool,
    pub get_size_observes_windows: bool,
    pub estimator_observes_windows: bool,
    pub estimator_observes_timestamps: bool,
    pub allowed_timestamp_skew: DurationMillis,
    pub timer_families: BTreeMap<String, TimerFamilySpec>,
    pub state_ids: BTreeSet<String>,
    pub side_input_tags: BTreeSet<String>,
}

impl UserFnDescriptor {
    pub fn timer_family(&self, family_or_id: &str) -> Option<&TimerFamilySpec> {
        self.timer_families.get(family_or_id)
    }
}

/// Identity and wiring of the transform instance within its bundle
/// descriptor.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub transform_id: String,
    pub transform_urn: String,
    pub main_input_id: String,
    pub main_output_tag: String,
    pub output_ids: Vec<String>,
    pub allowed_lateness: DurationMillis,
    pub work_completed_short_id: String,
    pub work_remaining_short_id: String,
}
