//! Column arithmetic with explicit missing values.

use chrono::NaiveDate;

use crate::domain::RecessionWindow;

/// Combine two aligned columns; missing on either side gives missing.
pub fn zip_with(
    a: &[Option<f64>],
    b: &[Option<f64>],
    f: impl Fn(f64, f64) -> Option<f64>,
) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => f(*x, *y),
            _ => None,
        })
        .collect()
}

/// Division that refuses a zero denominator.
pub fn safe_div(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 { None } else { Some(num / den) }
}

/// `(x_t / x_{t-p} - 1) * 100`.
pub fn pct_change(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    lagged(values, periods, |now, base| safe_div(now, base).map(|r| (r - 1.0) * 100.0))
}

/// `x_t - x_{t-p}`.
pub fn change(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    lagged(values, periods, |now, base| Some(now - base))
}

fn lagged(values: &[Option<f64>], periods: usize, f: impl Fn(f64, f64) -> Option<f64>) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let base = i.checked_sub(periods)?;
            match (values[i], values[base]) {
                (Some(now), Some(base)) => f(now, base),
                _ => None,
            }
        })
        .collect()
}

/// Trailing mean; a window containing any missing value is missing.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).checked_sub(window)?;
            let slice = &values[start..=i];
            let sum = slice.iter().try_fold(0.0, |acc, v| v.map(|x| acc + x))?;
            Some(sum / window as f64)
        })
        .collect()
}

pub fn recession_flag(dates: &[NaiveDate], windows: &[RecessionWindow]) -> Vec<Option<f64>> {
    dates
        .iter()
        .map(|&d| Some(if windows.iter().any(|w| w.contains(d)) { 1.0 } else { 0.0 }))
        .collect()
}

/// Replace NaN/inf with the missing marker.
pub fn finite_only(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    values.into_iter().map(|v| v.filter(|x| x.is_finite())).collect()
}
