//! Per-transform execution core for a portable pipeline worker.
//!
//! The crate drives one user transform instance over the lifetime of a
//! bundle: element dispatch across windows, splittable restriction
//! processing with concurrent dynamic splits, event-time and
//! processing-time timers, keyed state routing, and progress reporting.
//! Bundle orchestration, wire codecs, and the remote state channel are
//! host concerns consumed through the capability traits in
//! [`runner::interfaces`].

pub mod element {
    pub mod payload;
    pub mod window;
    pub mod windowed_value;

    pub use payload::*;
    pub use window::*;
    pub use windowed_value::*;
}

pub mod time {
    pub mod clock;
    pub mod domain;

    pub use clock::*;
    pub use domain::*;
}

pub mod sdf {
    pub mod restriction;
    pub mod watermark;

    pub use restriction::*;
    pub use watermark::*;
}

pub mod timers {
    pub mod handle;
    pub mod record;
    pub mod tracker;

    pub use handle::*;
    pub use record::*;
    pub use tracker::*;
}

pub mod split {
    pub mod compute;
    pub mod progress;
    pub mod result;

    pub use compute::*;
    pub use progress::*;
    pub use result::*;
}

pub mod user_fn {
    pub mod descriptor;
    pub mod invoker;

    pub use descriptor::*;
    pub use invoker::*;
}

pub mod runner {
    pub mod context;
    pub mod interfaces;
    pub mod transform;

    pub use context::*;
    pub use interfaces::*;
    pub use transform::*;
}

pub mod error;

pub use element::{
    BoundedWindow, ElementRestriction, PaneInfo, PaneTiming, SizedElementRestriction,
    WindowedValue,
};
pub use error::{RunnerError, UserCodeError};
pub use runner::{
    BundleFinalizationCallback, BundleFinalizer, Coder, CoderError, ContextError, ContextRole,
    FullInputCoder, OutputConsumer, RestrictionSizer, RunnerParts, SideInputAccessor,
    SplitListener, StateAccessor, StateCell, StateError, TimerSink, TransformRunner, UserContext,
};
pub use sdf::{
    BoxedEstimator, BoxedTracker, IncompleteRestrictionError, RestrictionTracker, SplitOutcome,
    TrackerHandle, WatermarkEstimator, WatermarkEstimatorHandle,
};
pub use split::{
    compute_split_for_process, compute_window_split_result, construct_split_result,
    encode_progress, scale_progress, BundleApplication, DelayedBundleApplication,
    DownstreamSplitter, ElementSplitter, Progress, ProgressReporter, SizedWindowedSplitResult,
    SplitResult, SplitResultsWithStopIndex, WindowSplitContext, WindowedSplitResult,
    WireTimestamp,
};
pub use time::{
    garbage_collection_time, DurationMillis, ProcessingClock, SystemClock, TimeDomain, Timestamp,
};
pub use timers::{TimerBundleTracker, TimerError, TimerFamilyHandle, TimerHandle, TimerRecord};
pub use user_fn::{
    ConfigError, ProcessContinuation, RunnerConfig, TimerFamilySpec, UserFn, UserFnDescriptor,
    PAR_DO_URN, PROCESS_SIZED_ELEMENTS_AND_RESTRICTIONS_URN, TIMER_FAMILY_PREFIX,
};
