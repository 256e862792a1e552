use std::collections::BTreeMap;

/// Work completed and remaining for one element or one scaled element
/// position, as non-negative reals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    pub completed: f64,
    pub remaining: f64,
}

impl Progress {
    pub fn from_parts(completed: f64, remaining: f64) -> Self {
        debug_assert!(completed >= 0.0 && remaining >= 0.0);
        Progress {
            completed,
            remaining,
        }
    }

    /// Fraction of the element already done, in `[0, 1]`.
    ///
    /// Degenerate trackers that report no work at all count as
    /// all-remaining.
    pub fn completed_fraction(&self) -> f64 {
        let total = self.completed + self.remaining;
        if total > 0.0 {
            self.completed / total
        } else {
            0.0
        }
    }
}

/// Scales element progress across the live window range: completion lands
/// at `window_index + completed_fraction` and the remainder stretches to
/// `stop_window_index`.
pub fn scale_progress(
    progress: Progress,
    window_index: usize,
    stop_window_index: usize,
) -> Progress {
    let completed = window_index as f64 + progress.completed_fraction();
    let remaining = stop_window_index as f64 - completed;
    Progress::from_parts(completed, remaining.max(0.0))
}

/// Encodes one progress value as a single-element sequence of IEEE-754
/// doubles: a 4-byte big-endian count followed by the 8-byte big-endian
/// bit pattern.
pub fn encode_progress(value: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    out.extend_from_slice(&1i32.to_be_bytes());
    out.extend_from_slice(&value.to_bits().to_be_bytes());
    out
}

/// Fills the monitoring map with the encoded work-completed and
/// work-remaining snapshot under the pre-registered short ids.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    pub work_completed_short_id: String,
    pub work_remaining_short_id: String,
}

impl ProgressReporter {
    pub fn new(
        work_completed_short_id: impl Into<String>,
        work_remaining_short_id: impl Into<String>,
    ) -> Self {
        ProgressReporter {
            work_completed_short_id: work_completed_short_id.into(),
            work_remaining_short_id: work_remaining_short_id.into(),
        }
    }

    pub fn report(&self, progress: Progress, monitoring_data: &mut BTreeMap<String, Vec<u8>>) {
        monitoring_data.insert(
            self.work_completed_short_id.clone(),
            encode_progress(progress.completed),
        );
        monitoring_data.insert(
            self.work_remaining_short_id.clone(),
            encode_progress(progress.remaining),
        );
    }
}
