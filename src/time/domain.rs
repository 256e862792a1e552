use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use crate::element::window::BoundedWindow;

/// Whether a timer or hold tracks element time or wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeDomain {
    EventTime,
    ProcessingTime,
}

impl TimeDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeDomain::EventTime => "event-time",
            TimeDomain::ProcessingTime => "processing-time",
        }
    }
}

impl fmt::Display for TimeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Millisecond instant on the shared pipeline timeline.
///
/// The representable range is `[Timestamp::MIN, Timestamp::MAX]`; the one
/// value beyond it, [`Timestamp::NO_OUTPUT_HOLD`], marks a timer that
/// carries no output hold and must never be used as an element timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Lowest representable instant; arithmetic underflow clamps here.
    pub const MIN: Timestamp = Timestamp(i64::MIN / 1000);
    /// Highest representable instant for element and timer timestamps.
    pub const MAX: Timestamp = Timestamp(i64::MAX / 1000);
    /// Sentinel one millisecond past [`Timestamp::MAX`] used for timers
    /// whose output hold has been disabled.
    pub const NO_OUTPUT_HOLD: Timestamp = Timestamp(i64::MAX / 1000 + 1);

    pub const fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Adds a duration, clamping to [`Timestamp::MAX`] on overflow.
    pub fn saturating_add(self, duration: DurationMillis) -> Self {
        match self.0.checked_add(duration.millis()) {
            Some(millis) if millis <= Self::MAX.0 => Timestamp(millis),
            _ => Self::MAX,
        }
    }

    /// Subtracts a duration, clamping to [`Timestamp::MIN`] on underflow.
    pub fn saturating_sub(self, duration: DurationMillis) -> Self {
        match self.0.checked_sub(duration.millis()) {
            Some(millis) if millis >= Self::MIN.0 => Timestamp(millis),
            _ => Self::MIN,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl Add<DurationMillis> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: DurationMillis) -> Timestamp {
        Timestamp(self.0 + rhs.millis())
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = DurationMillis;

    fn sub(self, rhs: Timestamp) -> DurationMillis {
        DurationMillis::from_millis(self.0 - rhs.0)
    }
}

/// Millisecond span between two instants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct DurationMillis(i64);

impl DurationMillis {
    pub const ZERO: DurationMillis = DurationMillis(0);

    pub const fn from_millis(millis: i64) -> Self {
        DurationMillis(millis)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DurationMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Instant after which a window's contents may be dropped: window end plus
/// the allowed lateness, clamped to [`Timestamp::MAX`].
pub fn garbage_collection_time(
    window: &BoundedWindow,
    allowed_lateness: DurationMillis,
) -> Timestamp {
    window.max_timestamp().saturating_add(allowed_lateness)
}
