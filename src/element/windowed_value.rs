use serde::{Deserialize, Serialize};

use crate::element::window::BoundedWindow;
use crate::time::domain::Timestamp;

/// Which trigger firing produced a value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum PaneTiming {
    Early,
    OnTime,
    Late,
    #[default]
    Unknown,
}

/// Firing metadata carried alongside every element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PaneInfo {
    pub timing: PaneTiming,
    pub is_first: bool,
    pub is_last: bool,
    pub index: i64,
    pub on_time_index: i64,
}

impl PaneInfo {
    /// Pane used for values that were not produced by a trigger firing.
    pub const NO_FIRING: PaneInfo = PaneInfo {
        timing: PaneTiming::Unknown,
        is_first: true,
        is_last: true,
        index: 0,
        on_time_index: 0,
    };

    pub const ON_TIME_AND_ONLY: PaneInfo = PaneInfo {
        timing: PaneTiming::OnTime,
        is_first: true,
        is_last: true,
        index: 0,
        on_time_index: 0,
    };
}

impl Default for PaneInfo {
    fn default() -> Self {
        PaneInfo::NO_FIRING
    }
}

/// An element paired with its event timestamp, window set, and pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedValue<T> {
    pub value: T,
    pub timestamp: Timestamp,
    pub windows: Vec<BoundedWindow>,
    pub pane: PaneInfo,
}

impl<T> WindowedValue<T> {
    pub fn new(
        value: T,
        timestamp: Timestamp,
        windows: Vec<BoundedWindow>,
        pane: PaneInfo,
    ) -> Self {
        WindowedValue {
            value,
            timestamp,
            windows,
            pane,
        }
    }

    /// Places a value in a single window.
    pub fn in_window(value: T, timestamp: Timestamp, window: BoundedWindow, pane: PaneInfo) -> Self {
        WindowedValue::new(value, timestamp, vec![window], pane)
    }

    /// Places a value in the global window with the lowest timestamp.
    pub fn in_global_window(value: T) -> Self {
        WindowedValue::new(
            value,
            Timestamp::MIN,
            vec![BoundedWindow::Global],
            PaneInfo::NO_FIRING,
        )
    }

    /// Swaps the payload while keeping timestamp, windows, and pane.
    pub fn with_value<U>(&self, value: U) -> WindowedValue<U> {
        WindowedValue {
            value,
            timestamp: self.timestamp,
            windows: self.windows.clone(),
            pane: self.pane,
        }
    }

    pub fn map_value<U>(self, f: impl FnOnce(T) -> U) -> WindowedValue<U> {
        WindowedValue {
            value: f(self.value),
            timestamp: self.timestamp,
            windows: self.windows,
            pane: self.pane,
        }
    }
}
