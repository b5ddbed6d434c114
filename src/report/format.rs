//! Formatting helpers shared by the renderers, plus terminal summaries.
//!
//! Every missing value is rendered as `NA`; nothing here ever prints `NaN`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::data::Acquisition;
use crate::frame::AlignedFrame;
use crate::report::{RenderMeta, Snapshot};

/// Marker for a missing value in every output format.
pub const MISSING: &str = "NA";

pub fn fmt_value(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => MISSING.to_string(),
    }
}

pub fn fmt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| MISSING.to_string())
}

/// Descriptive statistics over the present values of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    pub latest: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub missing: usize,
    pub total: usize,
}

pub fn column_stats(frame: &AlignedFrame, id: &str) -> Option<ColumnStats> {
    let points = frame.points(id)?;
    let present: Vec<(NaiveDate, f64)> = points.iter().filter_map(|(d, v)| v.map(|v| (*d, v))).collect();

    let min = present.iter().map(|(_, v)| *v).reduce(f64::min);
    let max = present.iter().map(|(_, v)| *v).reduce(f64::max);
    let mean = if present.is_empty() {
        None
    } else {
        Some(present.iter().map(|(_, v)| v).sum::<f64>() / present.len() as f64)
    };

    Some(ColumnStats {
        first: present.first().map(|(d, _)| *d),
        last: present.last().map(|(d, _)| *d),
        latest: present.last().map(|(_, v)| *v),
        min,
        max,
        mean,
        missing: points.len() - present.len(),
        total: points.len(),
    })
}

/// One recession window with the range of a column inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecessionRow {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub months: i32,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub fn recession_rows(snapshot: &Snapshot, column: Option<&str>) -> Vec<RecessionRow> {
    let points = column.and_then(|c| snapshot.frame.points(c)).unwrap_or_default();
    snapshot
        .recessions
        .iter()
        .map(|w| {
            let inside = points
                .iter()
                .filter(|(d, _)| w.contains(*d))
                .filter_map(|(_, v)| *v);
            let (min, max) = inside.fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), v| {
                (Some(lo.map_or(v, |lo| lo.min(v))), Some(hi.map_or(v, |hi| hi.max(v))))
            });
            RecessionRow {
                label: w.display_label(),
                start: w.start,
                end: w.end,
                months: months_between(w.start, w.end),
                min,
                max,
            }
        })
        .collect()
}

/// Whole months from the month of `start` to the month of `end`.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32
}

/// Header plus rows for a date-indexed table section (labels in the header).
pub fn table_cells(snapshot: &Snapshot, columns: &[&str], last: Option<usize>) -> (Vec<String>, Vec<Vec<String>>) {
    let frame = &snapshot.frame;
    let mut header = vec!["Date".to_string()];
    header.extend(columns.iter().map(|c| snapshot.label(c).to_string()));

    let skip = last.map_or(0, |n| frame.len().saturating_sub(n));
    let rows = frame
        .dates()
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, date)| {
            let mut row = vec![date.to_string()];
            for c in columns {
                let v = frame.column(c).and_then(|col| col.values[i]);
                row.push(fmt_value(v));
            }
            row
        })
        .collect();

    (header, rows)
}

/// Header plus rows for a summary section.
pub fn summary_cells(snapshot: &Snapshot, columns: &[&str]) -> (Vec<String>, Vec<Vec<String>>) {
    let header = ["Column", "First", "Last", "Latest", "Min", "Max", "Mean", "Missing"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows = columns
        .iter()
        .filter_map(|c| column_stats(&snapshot.frame, c).map(|s| (c, s)))
        .map(|(c, s)| {
            vec![
                snapshot.label(c).to_string(),
                fmt_date(s.first),
                fmt_date(s.last),
                fmt_value(s.latest),
                fmt_value(s.min),
                fmt_value(s.max),
                fmt_value(s.mean),
                format!("{}/{}", s.missing, s.total),
            ]
        })
        .collect();
    (header, rows)
}

/// Header plus rows for a recession section.
pub fn recession_cells(snapshot: &Snapshot, column: Option<&str>) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header: Vec<String> = ["Recession", "Start", "End", "Months"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if let Some(c) = column {
        header.push(format!("{} min", snapshot.label(c)));
        header.push(format!("{} max", snapshot.label(c)));
    }
    let rows = recession_rows(snapshot, column)
        .into_iter()
        .map(|r| {
            let mut row = vec![r.label, r.start.to_string(), r.end.to_string(), r.months.to_string()];
            if column.is_some() {
                row.push(fmt_value(r.min));
                row.push(fmt_value(r.max));
            }
            row
        })
        .collect();
    (header, rows)
}

/// Columns with at least one missing value: (label, missing, total).
pub fn gap_counts(snapshot: &Snapshot) -> Vec<(String, usize, usize)> {
    snapshot
        .frame
        .columns()
        .iter()
        .filter(|c| c.missing_count() > 0)
        .map(|c| (snapshot.label(&c.id).to_string(), c.missing_count(), c.values.len()))
        .collect()
}

/// Metadata as (field, value) pairs, in display order.
pub fn meta_fields(meta: &RenderMeta) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    if let Some(at) = &meta.generated_at {
        out.push(("Generated at", at.clone()));
    }
    out.push(("Source", meta.source.clone()));
    out.push(("Range", meta.range.describe()));
    out.push(("Frequency", meta.frequency.display_name().to_string()));
    out.push(("Fill", meta.fill.display_name().to_string()));
    out
}

/// Per-series acquisition status for `fmr fetch`. `groups` maps id to group name.
pub fn format_fetch_summary(acquisition: &Acquisition, groups: &BTreeMap<String, String>) -> String {
    let group = |id: &str| truncate(groups.get(id).map(String::as_str).unwrap_or("-"), 14);
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<14} {:<10} {:>8} {:<10} {:<10} {:<10}",
        "id", "group", "frequency", "obs", "first", "last", "status"
    )
    .trim_end());
    out.push('\n');
    out.push_str(&format!(
        "{:-<24} {:-<14} {:-<10} {:-<8} {:-<10} {:-<10} {:-<10}",
        "", "", "", "", "", "", ""
    )
    .trim_end());
    out.push('\n');

    for s in &acquisition.series {
        out.push_str(
            format!(
                "{:<24} {:<14} {:<10} {:>8} {:<10} {:<10} {:<10}",
                truncate(&s.id, 24),
                group(&s.id),
                s.frequency.display_name(),
                s.observations.len(),
                fmt_date(s.first_date()),
                fmt_date(s.last_date()),
                "ok"
            )
            .trim_end(),
        );
        out.push('\n');
    }
    for f in &acquisition.failures {
        out.push_str(
            format!(
                "{:<24} {:<14} {:<10} {:>8} {:<10} {:<10} {:<10}",
                truncate(&f.id, 24),
                group(&f.id),
                "-",
                0,
                MISSING,
                MISSING,
                "not found"
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Terminal summary after a report run.
pub fn format_run_summary(snapshot: &Snapshot, meta: &RenderMeta, output: Option<&Path>) -> String {
    let mut out = String::new();

    out.push_str("=== fmr - FRED macro report ===\n");
    for (field, value) in meta_fields(meta) {
        out.push_str(&format!("{field}: {value}\n"));
    }
    out.push_str(&format!(
        "Frame: {} dates x {} columns\n",
        snapshot.frame.len(),
        snapshot.frame.columns().len()
    ));

    let gaps = gap_counts(snapshot);
    if !gaps.is_empty() {
        out.push_str("\nMissing values:\n");
        for (label, missing, total) in gaps {
            out.push_str(&format!("  {:<32} {missing}/{total}\n", truncate(&label, 32)));
        }
    }
    if !snapshot.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &snapshot.warnings {
            out.push_str(&format!("  {}: {}\n", w.subject, w.message));
        }
    }
    if let Some(path) = output {
        out.push_str(&format!("\nWrote {}\n", path.display()));
    }

    out
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
