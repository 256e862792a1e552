use std::sync::{Arc, Mutex};

use crate::time::domain::Timestamp;

/// User-provided estimator of the lower bound on future output
/// event-times for a splittable element.
pub trait WatermarkEstimator: Send {
    type State;

    /// Current lower bound on output timestamps.
    fn current_watermark(&self) -> Timestamp;

    /// Serializable state a residual resumes from.
    fn state(&self) -> Self::State;

    /// Invoked with each output timestamp when the transform declares a
    /// timestamp-observing estimator.
    fn observe_timestamp(&mut self, _timestamp: Timestamp) {}
}

pub type BoxedEstimator<S> = Box<dyn WatermarkEstimator<State = S> + Send>;

/// Thread-safe wrapper over the live estimator.
///
/// The split path reads `(watermark, state)` while the processing thread
/// reports output timestamps; taking both under one lock keeps the pair
/// internally consistent.
pub struct WatermarkEstimatorHandle<S> {
    inner: Arc<Mutex<BoxedEstimator<S>>>,
}

impl<S> Clone for WatermarkEstimatorHandle<S> {
    fn clone(&self) -> Self {
        WatermarkEstimatorHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> WatermarkEstimatorHandle<S> {
    pub fn thread_safe(estimator: BoxedEstimator<S>) -> Self {
        WatermarkEstimatorHandle {
            inner: Arc::new(Mutex::new(estimator)),
        }
    }

    pub fn current_watermark(&self) -> Timestamp {
        self.inner.lock().unwrap().current_watermark()
    }

    /// Consistent snapshot of the watermark and the state it corresponds to.
    pub fn watermark_and_state(&self) -> (Timestamp, S) {
        let guard = self.inner.lock().unwrap();
        (guard.current_watermark(), guard.state())
    }

    pub fn observe_timestamp(&self, timestamp: Timestamp) {
        self.inner.lock().unwrap().observe_timestamp(timestamp);
    }
}
