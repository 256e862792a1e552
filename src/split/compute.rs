use crate::element::payload::{ElementRestriction, SizedElementRestriction};
use crate::element::window::BoundedWindow;
use crate::element::windowed_value::WindowedValue;
use crate::sdf::restriction::{SplitOutcome, TrackerHandle};
use crate::split::progress::{scale_progress, Progress};
use crate::split::result::SplitResult;
use crate::time::domain::Timestamp;

/// Split and progress surface of a downstream consumer that owns the
/// element, used when the restriction is processed by a fused step instead
/// of a local tracker.
pub trait DownstreamSplitter {
    /// Attempts a split at the given fraction of remaining work, returning
    /// already-encoded primary/residual roots.
    fn try_split(&self, fraction_of_remainder: f64) -> Option<SplitResult>;

    /// Fraction of the element already completed, in `[0, 1]`.
    fn completed_fraction(&self) -> f64;
}

/// Where element-level splits are routed: exactly one of a local tracker
/// (with the watermark snapshot captured before slicing) or a downstream
/// splitter.
pub enum ElementSplitter<'a, R, P, S> {
    Tracker {
        handle: &'a TrackerHandle<R, P>,
        watermark_and_state: &'a (Timestamp, S),
    },
    Downstream(&'a dyn DownstreamSplitter),
}

/// Immutable view of the element under split consideration.
pub struct WindowSplitContext<'a, V, R, S> {
    pub element: &'a WindowedValue<V>,
    pub restriction: &'a R,
    pub watermark_state: &'a S,
    pub windows: &'a [BoundedWindow],
    pub current_window_index: usize,
    pub stop_window_index: usize,
}

/// The four optional roots a windowed split produces. Their window sets
/// partition the element's original windows.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedSplitResult<V, R, S> {
    pub primary_in_fully_processed_windows: Option<WindowedValue<ElementRestriction<V, R, S>>>,
    pub primary_split: Option<WindowedValue<ElementRestriction<V, R, S>>>,
    pub residual_split: Option<WindowedValue<ElementRestriction<V, R, S>>>,
    pub residual_in_unprocessed_windows: Option<WindowedValue<ElementRestriction<V, R, S>>>,
}

/// [`WindowedSplitResult`] with each present root annotated with its size
/// hint, ready for wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedWindowedSplitResult<V, R, S> {
    pub primary_in_fully_processed_windows:
        Option<WindowedValue<SizedElementRestriction<V, R, S>>>,
    pub primary_split: Option<WindowedValue<SizedElementRestriction<V, R, S>>>,
    pub residual_split: Option<WindowedValue<SizedElementRestriction<V, R, S>>>,
    pub residual_in_unprocessed_windows:
        Option<WindowedValue<SizedElementRestriction<V, R, S>>>,
}

/// Outcome of [`compute_split_for_process`]: the windowed roots, an
/// optional downstream element split, and the window index processing must
/// stop at.
#[derive(Debug)]
pub struct SplitResultsWithStopIndex<V, R, S> {
    pub window_split: WindowedSplitResult<V, R, S>,
    pub downstream_split: Option<SplitResult>,
    pub new_stop_index: usize,
}

fn windowed_root<V: Clone, R: Clone, S: Clone>(
    element: &WindowedValue<V>,
    restriction: &R,
    watermark_state: &S,
    windows: Vec<BoundedWindow>,
) -> Option<WindowedValue<ElementRestriction<V, R, S>>> {
    if windows.is_empty() {
        return None;
    }
    Some(WindowedValue::new(
        ElementRestriction::new(
            element.value.clone(),
            restriction.clone(),
            watermark_state.clone(),
        ),
        element.timestamp,
        windows,
        element.pane,
    ))
}

/// Slices the element's windows around the current one and attaches the
/// optional element-level split restrictions.
pub fn compute_window_split_result<V: Clone, R: Clone, S: Clone>(
    cx: &WindowSplitContext<'_, V, R, S>,
    to_index: usize,
    from_index: usize,
    element_split: Option<(&SplitOutcome<R>, &S)>,
) -> WindowedSplitResult<V, R, S> {
    let current_window = &cx.windows[cx.current_window_index];
    let primary_windows = cx.windows[..to_index].to_vec();
    let residual_windows = cx.windows[from_index..cx.stop_window_index].to_vec();

    WindowedSplitResult {
        primary_in_fully_processed_windows: windowed_root(
            cx.element,
            cx.restriction,
            cx.watermark_state,
            primary_windows,
        ),
        primary_split: element_split.map(|(outcome, _)| {
            WindowedValue::in_window(
                ElementRestriction::new(
                    cx.element.value.clone(),
                    outcome.primary.clone(),
                    cx.watermark_state.clone(),
                ),
                cx.element.timestamp,
                current_window.clone(),
                cx.element.pane,
            )
        }),
        residual_split: element_split.map(|(outcome, residual_state)| {
            WindowedValue::in_window(
                ElementRestriction::new(
                    cx.element.value.clone(),
                    outcome.residual.clone(),
                    residual_state.clone(),
                ),
                cx.element.timestamp,
                current_window.clone(),
                cx.element.pane,
            )
        }),
        residual_in_unprocessed_windows: windowed_root(
            cx.element,
            cx.restriction,
            cx.watermark_state,
            residual_windows,
        ),
    }
}

/// Pure split decision for a live element.
///
/// When the desired fraction lands past the current window the split snaps
/// to the nearest window boundary within `[current+1, stop-1]` and no
/// element-level split happens; otherwise the element splitter is asked to
/// split at the fraction rescaled to the current window. On the last live
/// window only an element-level split is possible and `None` means the
/// split did not happen.
pub fn compute_split_for_process<V: Clone, R: Clone, P, S: Clone>(
    cx: &WindowSplitContext<'_, V, R, S>,
    fraction_of_remainder: f64,
    splitter: ElementSplitter<'_, R, P, S>,
) -> Option<SplitResultsWithStopIndex<V, R, S>> {
    let cur = cx.current_window_index;
    let stop = cx.stop_window_index;
    debug_assert!(cur < stop);

    if cur != stop - 1 {
        let element_progress = match &splitter {
            ElementSplitter::Tracker { handle, .. } => handle
                .progress()
                .unwrap_or_else(|| Progress::from_parts(0.0, 1.0)),
            ElementSplitter::Downstream(delegate) => {
                let completed = delegate.completed_fraction();
                Progress::from_parts(completed, 1.0 - completed)
            }
        };
        let scaled = scale_progress(element_progress, cur, stop);
        let scaled_fraction_remaining = scaled.remaining * fraction_of_remainder;
        let completed_fraction = element_progress.completed_fraction();
        let remaining_fraction = 1.0 - completed_fraction;

        if scaled_fraction_remaining >= remaining_fraction {
            // The split lands past the current window: stop at the nearest
            // window boundary, keeping at least one window of residual.
            let advance = (completed_fraction + scaled_fraction_remaining)
                .round()
                .max(1.0) as usize;
            let new_stop = (cur + advance).min(stop - 1);
            let window_split = compute_window_split_result(cx, new_stop, new_stop, None);
            Some(SplitResultsWithStopIndex {
                window_split,
                downstream_split: None,
                new_stop_index: new_stop,
            })
        } else {
            let mut downstream_split = None;
            let element_split = match &splitter {
                ElementSplitter::Tracker {
                    handle,
                    watermark_and_state,
                } => handle
                    .try_split(scaled_fraction_remaining / remaining_fraction)
                    .map(|outcome| (outcome, &watermark_and_state.1)),
                ElementSplitter::Downstream(delegate) => {
                    downstream_split = delegate.try_split(scaled_fraction_remaining);
                    None
                }
            };
            let new_stop = cur + 1;
            let to_index = if element_split.is_none() && downstream_split.is_none() {
                new_stop
            } else {
                cur
            };
            let window_split = compute_window_split_result(
                cx,
                to_index,
                new_stop,
                element_split.as_ref().map(|(outcome, state)| (outcome, *state)),
            );
            Some(SplitResultsWithStopIndex {
                window_split,
                downstream_split,
                new_stop_index: new_stop,
            })
        }
    } else {
        let mut downstream_split = None;
        let element_split = match &splitter {
            ElementSplitter::Tracker {
                handle,
                watermark_and_state,
            } => handle
                .try_split(fraction_of_remainder)
                .map(|outcome| (outcome, &watermark_and_state.1)),
            ElementSplitter::Downstream(delegate) => {
                downstream_split = delegate.try_split(fraction_of_remainder);
                None
            }
        };
        if element_split.is_none() && downstream_split.is_none() {
            return None;
        }
        let window_split = compute_window_split_result(
            cx,
            cur,
            stop,
            element_split.as_ref().map(|(outcome, state)| (outcome, *state)),
        );
        Some(SplitResultsWithStopIndex {
            window_split,
            downstream_split,
            new_stop_index: stop,
        })
    }
}
