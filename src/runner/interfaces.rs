use std::error::Error;
use thiserror::Error as ThisError;

use crate::element::window::BoundedWindow;
use crate::element::windowed_value::WindowedValue;
use crate::split::result::{BundleApplication, DelayedBundleApplication};
use crate::timers::record::TimerRecord;

/// Wire codec capability. Concrete codecs live on the host side; the core
/// only round-trips opaque bytes through them.
pub trait Coder<T>: Send + Sync {
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> Result<(), CoderError>;
    fn decode(&self, data: &mut &[u8]) -> Result<T, CoderError>;
}

/// Failure while encoding or decoding through a [`Coder`].
#[derive(Debug, ThisError)]
#[error("coder failure: {message}")]
pub struct CoderError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl CoderError {
    pub fn new(message: impl Into<String>) -> Self {
        CoderError {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        CoderError {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Failure on the remote state channel or a side-input lookup.
#[derive(Debug, ThisError)]
#[error("state channel failure: {message}")]
pub struct StateError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl StateError {
    pub fn new(message: impl Into<String>) -> Self {
        StateError {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        StateError {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// One user-state cell routed through the remote state channel. Values are
/// opaque encoded bytes; the user's state coder stays on their side.
pub trait StateCell: Send {
    fn read(&mut self) -> Result<Vec<Vec<u8>>, StateError>;
    fn append(&mut self, value: Vec<u8>) -> Result<(), StateError>;
    fn clear(&mut self) -> Result<(), StateError>;
}

/// Remote state channel scoped to this transform.
pub trait StateAccessor<K>: Send {
    /// Binds the cell for a declared state id under the given key and
    /// window.
    fn state(
        &mut self,
        state_id: &str,
        key: &K,
        window: &BoundedWindow,
    ) -> Result<Box<dyn StateCell>, StateError>;

    /// Flushes pending writes at bundle finish.
    fn finalize(&mut self) -> Result<(), StateError>;
}

/// Materialized side-input lookup; values are encoded with the view's
/// coder on the host side.
pub trait SideInputAccessor: Send + Sync {
    fn get(&self, tag: &str, window: &BoundedWindow) -> Result<Vec<u8>, StateError>;
}

/// Receives the primary/residual roots of a split decided while the
/// bundle is still running.
pub trait SplitListener: Send {
    fn split(
        &mut self,
        primary_roots: Vec<BundleApplication>,
        residual_roots: Vec<DelayedBundleApplication>,
    );
}

/// Callback user code registers to run after the runner commits the
/// bundle's output.
pub type BundleFinalizationCallback = Box<dyn FnOnce() -> Result<(), Box<dyn Error + Send + Sync>> + Send>;

/// Registry for end-of-bundle callbacks.
pub trait BundleFinalizer: Send {
    fn register(&mut self, callback: BundleFinalizationCallback);
}

/// Size hint for a restriction, used to weigh split roots.
///
/// Invoked from the split thread concurrently with element processing, so
/// it is a shared capability rather than an exclusive user-fn hook.
pub trait RestrictionSizer<R>: Send + Sync {
    fn size(&self, restriction: &R) -> f64;
}

impl<R, F> RestrictionSizer<R> for F
where
    F: Fn(&R) -> f64 + Send + Sync,
{
    fn size(&self, restriction: &R) -> f64 {
        self(restriction)
    }
}

/// Downstream consumer for one output tag.
pub type OutputConsumer<T> =
    Box<dyn Fn(WindowedValue<T>) -> Result<(), Box<dyn Error + Send + Sync>> + Send + Sync>;

/// Outgoing sink for one timer family's records.
pub type TimerSink<K> = Box<dyn Fn(TimerRecord<K>) + Send + Sync>;
