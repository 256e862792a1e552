use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::element::payload::SizedElementRestriction;
use crate::element::windowed_value::WindowedValue;
use crate::runner::interfaces::{Coder, CoderError};
use crate::split::compute::SizedWindowedSplitResult;
use crate::time::domain::{DurationMillis, Timestamp};

/// Seconds/nanos timestamp as carried on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTimestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl WireTimestamp {
    pub fn from_millis(millis: i64) -> Self {
        WireTimestamp {
            seconds: millis / 1000,
            nanos: (millis % 1000) as i32 * 1_000_000,
        }
    }

    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        WireTimestamp::from_millis(timestamp.millis())
    }
}

/// Work the worker keeps or hands back: one element encoded with the full
/// input coder, addressed at a transform input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleApplication {
    pub transform_id: String,
    pub input_id: String,
    pub element: Vec<u8>,
}

/// Residual work returned to the runner, with the delay before it should
/// be rescheduled and the output watermarks it resumes under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedBundleApplication {
    pub application: BundleApplication,
    pub requested_time_delay_ms: i64,
    pub output_watermarks: BTreeMap<String, WireTimestamp>,
}

/// Ordered primary/residual roots handed to the enclosing framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitResult {
    pub primary_roots: Vec<BundleApplication>,
    pub residual_roots: Vec<DelayedBundleApplication>,
}

fn encode_root<V, R, S>(
    coder: &dyn Coder<WindowedValue<SizedElementRestriction<V, R, S>>>,
    root: &WindowedValue<SizedElementRestriction<V, R, S>>,
    transform_id: &str,
    input_id: &str,
) -> Result<BundleApplication, CoderError> {
    let mut element = Vec::new();
    coder.encode(root, &mut element)?;
    Ok(BundleApplication {
        transform_id: transform_id.to_string(),
        input_id: input_id.to_string(),
        element,
    })
}

fn watermark_map(watermark: Timestamp, output_ids: &[String]) -> BTreeMap<String, WireTimestamp> {
    if watermark == Timestamp::MIN {
        return BTreeMap::new();
    }
    output_ids
        .iter()
        .map(|id| (id.clone(), WireTimestamp::from_timestamp(watermark)))
        .collect()
}

/// Encodes a windowed split (or a downstream pass-through) into the wire
/// shape returned to the runner.
///
/// Residuals in unprocessed windows resume under the watermark captured
/// when the element was installed; the element-split residual resumes
/// under the watermark captured immediately before the split. A minimum
/// watermark produces an empty map.
#[allow(clippy::too_many_arguments)]
pub fn construct_split_result<V, R, S>(
    windowed_split: Option<&SizedWindowedSplitResult<V, R, S>>,
    downstream_split: Option<SplitResult>,
    full_input_coder: &dyn Coder<WindowedValue<SizedElementRestriction<V, R, S>>>,
    initial_watermark: Timestamp,
    residual_watermark: Timestamp,
    transform_id: &str,
    main_input_id: &str,
    output_ids: &[String],
    resume_delay: DurationMillis,
) -> Result<SplitResult, CoderError> {
    // An element-level split comes from the windowed result or from
    // downstream, never both.
    debug_assert!(
        windowed_split.map_or(true, |split| split.residual_split.is_none())
            || downstream_split.is_none()
    );

    let mut primary_roots = Vec::new();
    let mut residual_roots = Vec::new();

    if let Some(split) = windowed_split {
        if let Some(root) = &split.primary_in_fully_processed_windows {
            primary_roots.push(encode_root(
                full_input_coder,
                root,
                transform_id,
                main_input_id,
            )?);
        }
        if let Some(root) = &split.residual_in_unprocessed_windows {
            // The current window's watermark holds and resume delay do not
            // apply to windows that never started processing.
            let application = encode_root(full_input_coder, root, transform_id, main_input_id)?;
            residual_roots.push(DelayedBundleApplication {
                application,
                requested_time_delay_ms: 0,
                output_watermarks: watermark_map(initial_watermark, output_ids),
            });
        }
        if let (Some(primary), Some(residual)) = (&split.primary_split, &split.residual_split) {
            primary_roots.push(encode_root(
                full_input_coder,
                primary,
                transform_id,
                main_input_id,
            )?);
            let application =
                encode_root(full_input_coder, residual, transform_id, main_input_id)?;
            residual_roots.push(DelayedBundleApplication {
                application,
                requested_time_delay_ms: resume_delay.millis(),
                output_watermarks: watermark_map(residual_watermark, output_ids),
            });
        }
    }

    if let Some(downstream) = downstream_split {
        primary_roots.extend(downstream.primary_roots);
        residual_roots.extend(downstream.residual_roots);
    }

    Ok(SplitResult {
        primary_roots,
        residual_roots,
    })
}
