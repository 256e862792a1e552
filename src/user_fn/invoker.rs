use std::hash::Hash;

use crate::error::RunnerError;
use crate::runner::context::UserContext;
use crate::sdf::restriction::BoxedTracker;
use crate::sdf::watermark::BoxedEstimator;
use crate::time::domain::DurationMillis;

/// Whether a splittable process invocation wants to be resumed later, and
/// after how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessContinuation {
    pub should_resume: bool,
    pub resume_delay: DurationMillis,
}

impl ProcessContinuation {
    /// The restriction is fully processed.
    pub fn stop() -> Self {
        ProcessContinuation {
            should_resume: false,
            resume_delay: DurationMillis::ZERO,
        }
    }

    /// Processing should continue from the unclaimed remainder.
    pub fn resume() -> Self {
        ProcessContinuation {
            should_resume: true,
            resume_delay: DurationMillis::ZERO,
        }
    }

    pub fn with_resume_delay(mut self, resume_delay: DurationMillis) -> Self {
        self.resume_delay = resume_delay;
        self
    }
}

/// The user transform the runner drives.
///
/// Implementations provide whichever lifecycle hooks their
/// [`crate::user_fn::UserFnDescriptor`] declares; the defaults cover the
/// rest. Hooks run on the processing thread and receive a role-gated
/// [`UserContext`].
pub trait UserFn: Send + 'static {
    type In: Clone + Send + 'static;
    type Out: Send + 'static;
    type Restriction: Clone + Send + 'static;
    type Position: Send + 'static;
    type WatermarkState: Clone + Send + 'static;
    type Key: Clone + Eq + Hash + Ord + Send + 'static;

    /// Extracts the user key from an element. `None` marks the transform
    /// as unkeyed; state and timer access then fail fast.
    fn element_key(_value: &Self::In) -> Option<Self::Key> {
        None
    }

    fn start_bundle(&mut self, _cx: &mut UserContext<'_, Self>) -> Result<(), RunnerError>
    where
        Self: Sized,
    {
        Ok(())
    }

    fn process_element(
        &mut self,
        cx: &mut UserContext<'_, Self>,
    ) -> Result<ProcessContinuation, RunnerError>
    where
        Self: Sized;

    fn finish_bundle(&mut self, _cx: &mut UserContext<'_, Self>) -> Result<(), RunnerError>
    where
        Self: Sized,
    {
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), RunnerError> {
        Ok(())
    }

    fn on_timer(
        &mut self,
        _timer_id: &str,
        _family_id: &str,
        _cx: &mut UserContext<'_, Self>,
    ) -> Result<(), RunnerError>
    where
        Self: Sized,
    {
        Err(RunnerError::unsupported_hook("on_timer"))
    }

    fn on_window_expiration(&mut self, _cx: &mut UserContext<'_, Self>) -> Result<(), RunnerError>
    where
        Self: Sized,
    {
        Err(RunnerError::unsupported_hook("on_window_expiration"))
    }

    /// Builds a fresh tracker over the restriction about to be processed.
    fn new_tracker(
        &mut self,
        _restriction: Self::Restriction,
    ) -> Result<BoxedTracker<Self::Restriction, Self::Position>, RunnerError> {
        Err(RunnerError::unsupported_hook("new_tracker"))
    }

    /// Builds a fresh watermark estimator from the serialized state.
    fn new_watermark_estimator(
        &mut self,
        _state: Self::WatermarkState,
    ) -> Result<BoxedEstimator<Self::WatermarkState>, RunnerError> {
        Err(RunnerError::unsupported_hook("new_watermark_estimator"))
    }
}
