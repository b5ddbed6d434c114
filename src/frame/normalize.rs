//! Series normalization: resample heterogeneous series onto one axis.
//!
//! Steps:
//! 1. label every observation with the period it falls in (`Frequency::period_end`)
//! 2. keep observations whose period lies inside the requested range
//! 3. per period keep the last present value (missing only if the whole period is missing)
//! 4. build the axis: observed dates for daily frames, every period end otherwise
//! 5. apply the fill policy
//!
//! Normalizing the series of an already-aligned frame returns the same frame.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::{debug, info};

use crate::domain::{DateRange, FillPolicy, Frequency, Series};
use crate::error::PipelineError;
use crate::frame::{AlignedFrame, Column};

/// Caller-selected normalization settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub frequency: Frequency,
    pub range: DateRange,
    pub fill: FillPolicy,
}

/// Align and fill in one step.
pub fn normalize(series: &[Series], options: &NormalizeOptions) -> Result<AlignedFrame, PipelineError> {
    let frame = align(series, options.frequency, &options.range)?;
    Ok(apply_fill(&frame, options.fill))
}

/// Resample `series` onto a shared `frequency` axis without filling gaps.
pub fn align(series: &[Series], frequency: Frequency, range: &DateRange) -> Result<AlignedFrame, PipelineError> {
    range.validate()?;
    if series.is_empty() {
        return Err(PipelineError::validation("No series to normalize."));
    }
    for (i, s) in series.iter().enumerate() {
        if series[..i].iter().any(|other| other.id == s.id) {
            return Err(PipelineError::validation(format!("Series '{}' supplied more than once.", s.id)));
        }
    }

    let lo = range.start.map(|d| frequency.period_end(d));
    let hi = range.end.map(|d| frequency.period_end(d));

    let buckets: Vec<BTreeMap<NaiveDate, Option<f64>>> = series
        .iter()
        .map(|s| bucket_series(s, frequency, lo, hi))
        .collect();

    let occupied: BTreeSet<NaiveDate> = buckets.iter().flat_map(|b| b.keys().copied()).collect();
    let (Some(&first), Some(&last)) = (occupied.first(), occupied.last()) else {
        return Err(PipelineError::validation(format!(
            "Requested date range {} has no overlap with any input series.",
            range.describe()
        )));
    };

    let axis: Vec<NaiveDate> = match frequency {
        Frequency::Daily => occupied.into_iter().collect(),
        _ => {
            let mut axis = Vec::new();
            let mut date = first;
            while date <= last {
                axis.push(date);
                date = frequency.next_period_end(date);
            }
            axis
        }
    };

    let columns = series
        .iter()
        .zip(&buckets)
        .map(|(s, bucket)| {
            let values = axis.iter().map(|d| bucket.get(d).copied().flatten()).collect();
            Column::new(s.id.clone(), values)
        })
        .collect();

    debug!(
        "aligned {} series onto {} {} periods ({first} .. {last})",
        series.len(),
        axis.len(),
        frequency.display_name()
    );

    AlignedFrame::new(frequency, axis, columns)
}

fn bucket_series(
    series: &Series,
    frequency: Frequency,
    lo: Option<NaiveDate>,
    hi: Option<NaiveDate>,
) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut observations: Vec<_> = series.observations.iter().collect();
    observations.sort_by_key(|o| o.date);

    let mut bucket = BTreeMap::new();
    for obs in observations {
        let label = frequency.period_end(obs.date);
        if lo.is_some_and(|l| label < l) || hi.is_some_and(|h| label > h) {
            continue;
        }
        let slot = bucket.entry(label).or_insert(None);
        if obs.value.is_some() {
            *slot = obs.value;
        }
    }
    bucket
}

/// Apply a fill policy, returning a new frame.
///
/// Forward fill never fills backwards, so leading gaps stay explicit.
pub fn apply_fill(frame: &AlignedFrame, policy: FillPolicy) -> AlignedFrame {
    match policy {
        FillPolicy::ExplicitGap => frame.clone(),
        FillPolicy::ForwardFill => {
            let columns = frame
                .columns()
                .iter()
                .map(|col| {
                    let mut last = None;
                    let values = col
                        .values
                        .iter()
                        .map(|v| {
                            if v.is_some() {
                                last = *v;
                            }
                            last
                        })
                        .collect();
                    Column::new(col.id.clone(), values)
                })
                .collect();
            // Same axis and ids as `frame`, so the invariants still hold.
            AlignedFrame::new(frame.frequency(), frame.dates().to_vec(), columns).unwrap_or_else(|_| frame.clone())
        }
    }
}

/// Drop columns whose missing ratio is at or above `threshold`.
///
/// Returns the reduced frame and the ids that were dropped.
pub fn drop_sparse_columns(frame: &AlignedFrame, threshold: f64) -> (AlignedFrame, Vec<String>) {
    if frame.is_empty() {
        return (frame.clone(), Vec::new());
    }
    let n = frame.len() as f64;
    let mut dropped = Vec::new();
    let kept = frame.retain_columns(|col| {
        let ratio = col.missing_count() as f64 / n;
        if ratio >= threshold {
            dropped.push(col.id.clone());
            false
        } else {
            true
        }
    });
    for id in &dropped {
        info!("dropping sparse column {id} (missing ratio >= {threshold:.2})");
    }
    (kept, dropped)
}
