use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::domain::{DurationMillis, Timestamp};

const GLOBAL_WINDOW_SLACK: DurationMillis = DurationMillis::from_millis(86_400_000);

/// Event-time subdivision an element belongs to.
///
/// The runner only needs the window's deadline; coders for concrete window
/// types stay on the host side of the [`crate::runner::Coder`] boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BoundedWindow {
    /// The single window covering all of event time.
    Global,
    /// Half-open interval `[start, end)`.
    Interval { start: Timestamp, end: Timestamp },
}

impl BoundedWindow {
    pub fn interval(start: Timestamp, end: Timestamp) -> Self {
        BoundedWindow::Interval { start, end }
    }

    /// Latest timestamp an element in this window may carry.
    pub fn max_timestamp(&self) -> Timestamp {
        match self {
            // Held back from the end of time so downstream GC holds fit.
            BoundedWindow::Global => Timestamp::MAX.saturating_sub(GLOBAL_WINDOW_SLACK),
            BoundedWindow::Interval { end, .. } => {
                end.saturating_sub(DurationMillis::from_millis(1))
            }
        }
    }
}

impl fmt::Display for BoundedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundedWindow::Global => f.write_str("global"),
            BoundedWindow::Interval { start, end } => write!(f, "[{start}, {end})"),
        }
    }
}
