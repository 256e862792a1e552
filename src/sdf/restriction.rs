use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::split::progress::Progress;

/// Raised by [`RestrictionTracker::check_done`] when an element finished
/// processing without claiming its whole restriction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("restriction not fully processed: {0}")]
pub struct IncompleteRestrictionError(pub String);

/// Primary/residual pair produced by a restriction split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome<R> {
    pub primary: R,
    pub residual: R,
}

impl<R> SplitOutcome<R> {
    pub fn new(primary: R, residual: R) -> Self {
        SplitOutcome { primary, residual }
    }
}

/// Interactive cursor over a restriction.
///
/// `try_claim` and `check_done` run on the processing thread while
/// `try_split` and `progress` may be driven from the split thread; the
/// runner serializes access through [`TrackerHandle`], so implementations
/// need no internal locking.
pub trait RestrictionTracker: Send {
    type Restriction;
    type Position;

    /// Attempts to claim the position; `false` means the restriction is
    /// exhausted and processing must stop.
    fn try_claim(&mut self, position: &Self::Position) -> bool;

    /// The restriction as it stands, shrunk by any splits taken so far.
    fn current_restriction(&self) -> Self::Restriction;

    /// Splits off the given fraction of remaining work, returning the
    /// primary/residual restrictions, or `None` when nothing remains.
    fn try_split(&mut self, fraction_of_remainder: f64) -> Option<SplitOutcome<Self::Restriction>>;

    /// Verifies every position of the restriction was claimed.
    fn check_done(&self) -> Result<(), IncompleteRestrictionError>;

    /// Work completed/remaining, when the tracker can estimate it.
    fn progress(&self) -> Option<Progress> {
        None
    }
}

pub type BoxedTracker<R, P> = Box<dyn RestrictionTracker<Restriction = R, Position = P> + Send>;

/// Shared view of the live tracker that observes claim outcomes.
///
/// One handle clone serves user code on the processing thread, another the
/// split path; a successful `try_claim` flips the claimed flag so a
/// zero-work checkpoint can be refused.
pub struct TrackerHandle<R, P> {
    inner: Arc<Mutex<BoxedTracker<R, P>>>,
    claimed: Arc<AtomicBool>,
}

impl<R, P> Clone for TrackerHandle<R, P> {
    fn clone(&self) -> Self {
        TrackerHandle {
            inner: Arc::clone(&self.inner),
            claimed: Arc::clone(&self.claimed),
        }
    }
}

impl<R, P> TrackerHandle<R, P> {
    pub fn observe(tracker: BoxedTracker<R, P>) -> Self {
        TrackerHandle {
            inner: Arc::new(Mutex::new(tracker)),
            claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn try_claim(&self, position: &P) -> bool {
        let claimed = self.inner.lock().unwrap().try_claim(position);
        if claimed {
            self.claimed.store(true, Ordering::Relaxed);
        }
        claimed
    }

    /// Whether any claim succeeded since the current element began.
    pub fn was_claimed(&self) -> bool {
        self.claimed.load(Ordering::Relaxed)
    }

    pub fn current_restriction(&self) -> R {
        self.inner.lock().unwrap().current_restriction()
    }

    pub fn try_split(&self, fraction_of_remainder: f64) -> Option<SplitOutcome<R>> {
        self.inner.lock().unwrap().try_split(fraction_of_remainder)
    }

    pub fn check_done(&self) -> Result<(), IncompleteRestrictionError> {
        self.inner.lock().unwrap().check_done()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.inner.lock().unwrap().progress()
    }
}
