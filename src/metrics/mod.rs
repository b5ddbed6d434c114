//! Derived-metric engine.
//!
//! A metric is a named, pure transform over one or more frame columns
//! (spreads, growth rates, flags). Computing a metric never mutates the input
//! frame and is deterministic: the same frame yields bit-identical output.
//!
//! Missing inputs propagate: if any input is missing at a date, the metric is
//! missing at that date. Undefined arithmetic (zero base, non-finite result)
//! also yields the missing marker rather than a number.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::domain::RecessionWindow;
use crate::error::PipelineError;
use crate::frame::{AlignedFrame, Column};

pub mod transform;

/// The operation a metric applies. Tagged by `op` in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Transform {
    /// `long - short`, e.g. 10Y minus 2Y.
    Spread { long: String, short: String },
    /// `numerator / denominator`.
    Ratio { numerator: String, denominator: String },
    /// Percentage change over `periods` rows, e.g. CPI year-over-year on a monthly frame.
    PctChange { column: String, periods: usize },
    /// Absolute change over `periods` rows.
    Change { column: String, periods: usize },
    /// Trailing mean over `window` rows (complete windows only).
    RollingMean { column: String, window: usize },
    /// 1 when the column is negative (an inverted curve), else 0.
    InversionFlag { column: String },
    /// 1 inside a configured recession window, else 0.
    RecessionFlag,
}

impl Transform {
    /// Column ids this transform reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Transform::Spread { long, short } => vec![long.as_str(), short.as_str()],
            Transform::Ratio {
                numerator,
                denominator,
            } => vec![numerator.as_str(), denominator.as_str()],
            Transform::PctChange { column, .. }
            | Transform::Change { column, .. }
            | Transform::RollingMean { column, .. }
            | Transform::InversionFlag { column } => vec![column.as_str()],
            Transform::RecessionFlag => vec![],
        }
    }

    /// Row window, for transforms that have one.
    pub fn window(&self) -> Option<usize> {
        match self {
            Transform::PctChange { periods, .. } | Transform::Change { periods, .. } => Some(*periods),
            Transform::RollingMean { window, .. } => Some(*window),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Transform::Spread { long, short } => format!("{long} - {short}"),
            Transform::Ratio {
                numerator,
                denominator,
            } => format!("{numerator} / {denominator}"),
            Transform::PctChange { column, periods } => format!("% change of {column} over {periods} periods"),
            Transform::Change { column, periods } => format!("change of {column} over {periods} periods"),
            Transform::RollingMean { column, window } => format!("{window}-period mean of {column}"),
            Transform::InversionFlag { column } => format!("1 when {column} < 0"),
            Transform::RecessionFlag => "1 inside a recession window".to_string(),
        }
    }
}

/// A named metric definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDef {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub transform: Transform,
}

impl MetricDef {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            label: None,
            transform,
        }
    }

    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.transform.describe())
    }
}

/// Compute one metric as a column on `frame`'s axis.
pub fn compute_metric(
    frame: &AlignedFrame,
    def: &MetricDef,
    recessions: &[RecessionWindow],
) -> Result<Column, PipelineError> {
    let input = |id: &str| input_values(frame, def, id);
    if def.transform.window() == Some(0) {
        return Err(PipelineError::validation(format!(
            "Metric '{}' needs a window of at least 1 period.",
            def.name
        )));
    }

    let values = match &def.transform {
        Transform::Spread { long, short } => transform::zip_with(input(long)?, input(short)?, |a, b| Some(a - b)),
        Transform::Ratio {
            numerator,
            denominator,
        } => transform::zip_with(input(numerator)?, input(denominator)?, transform::safe_div),
        Transform::PctChange { column, periods } => transform::pct_change(input(column)?, *periods),
        Transform::Change { column, periods } => transform::change(input(column)?, *periods),
        Transform::RollingMean { column, window } => transform::rolling_mean(input(column)?, *window),
        Transform::InversionFlag { column } => input(column)?
            .iter()
            .map(|v| v.map(|x| if x < 0.0 { 1.0 } else { 0.0 }))
            .collect(),
        Transform::RecessionFlag => transform::recession_flag(frame.dates(), recessions),
    };

    Ok(Column::new(def.name.clone(), transform::finite_only(values)))
}

fn input_values<'a>(frame: &'a AlignedFrame, def: &MetricDef, id: &str) -> Result<&'a [Option<f64>], PipelineError> {
    frame
        .column(id)
        .map(|c| c.values.as_slice())
        .ok_or_else(|| PipelineError::validation(format!("Metric '{}' references unknown column '{id}'.", def.name)))
}

/// Compute `defs` in order, returning a new frame with one extra column per metric.
///
/// Later definitions may read columns produced by earlier ones.
pub fn compute_all(
    frame: &AlignedFrame,
    defs: &[MetricDef],
    recessions: &[RecessionWindow],
) -> Result<AlignedFrame, PipelineError> {
    let mut working = frame.clone();
    for def in defs {
        if working.has_column(&def.name) {
            return Err(PipelineError::validation(format!(
                "Metric '{}' collides with an existing column.",
                def.name
            )));
        }
        let column = compute_metric(&working, def, recessions)?;
        debug!(
            "computed metric {} ({} of {} values missing)",
            def.name,
            column.missing_count(),
            column.values.len()
        );
        working = working.with_column(column)?;
    }
    Ok(working)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::Frequency;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn yields() -> AlignedFrame {
        AlignedFrame::new(
            Frequency::Daily,
            vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)],
            vec![
                Column::new("DGS10", vec![Some(4.25), Some(4.00), None]),
                Column::new("DGS2", vec![Some(4.80), None, Some(4.10)]),
            ],
        )
        .unwrap()
    }

    fn spread() -> MetricDef {
        MetricDef::new(
            "SPREAD_10Y2Y",
            Transform::Spread {
                long: "DGS10".to_string(),
                short: "DGS2".to_string(),
            },
        )
    }

    #[test]
    fn ten_two_spread_example() {
        let col = compute_metric(&yields(), &spread(), &[]).unwrap();
        let v = col.values[0].unwrap();
        assert!((v - (-0.55)).abs() < 1e-12, "got {v}");
    }

    #[test]
    fn missing_inputs_propagate() {
        let col = compute_metric(&yields(), &spread(), &[]).unwrap();
        assert_eq!(col.values[1], None);
        assert_eq!(col.values[2], None);
    }

    #[test]
    fn computation_is_bit_identical_and_pure() {
        let frame = yields();
        let before = frame.clone();
        let defs = vec![
            spread(),
            MetricDef::new(
                "INV",
                Transform::InversionFlag {
                    column: "SPREAD_10Y2Y".to_string(),
                },
            ),
            MetricDef::new(
                "R",
                Transform::Ratio {
                    numerator: "DGS10".to_string(),
                    denominator: "DGS2".to_string(),
                },
            ),
        ];
        let a = compute_all(&frame, &defs, &[]).unwrap();
        let b = compute_all(&frame, &defs, &[]).unwrap();
        assert_eq!(frame, before);

        for (ca, cb) in a.columns().iter().zip(b.columns()) {
            let bits_a: Vec<Option<u64>> = ca.values.iter().map(|v| v.map(f64::to_bits)).collect();
            let bits_b: Vec<Option<u64>> = cb.values.iter().map(|v| v.map(f64::to_bits)).collect();
            assert_eq!(bits_a, bits_b);
        }
        assert_eq!(a.column("INV").unwrap().values, vec![Some(1.0), None, None]);
    }

    #[test]
    fn pct_change_with_zero_base_is_missing() {
        let frame = AlignedFrame::new(
            Frequency::Monthly,
            vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31)],
            vec![Column::new("X", vec![Some(0.0), Some(100.0), Some(110.0)])],
        )
        .unwrap();
        let def = MetricDef::new(
            "X_CHG",
            Transform::PctChange {
                column: "X".to_string(),
                periods: 1,
            },
        );
        let col = compute_metric(&frame, &def, &[]).unwrap();
        assert_eq!(col.values[0], None);
        assert_eq!(col.values[1], None);
        assert!((col.values[2].unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn recession_flag_marks_windows() {
        let frame = yields();
        let windows = vec![RecessionWindow {
            start: d(2024, 1, 3),
            end: d(2024, 1, 3),
            label: None,
        }];
        let col = compute_metric(&frame, &MetricDef::new("USREC", Transform::RecessionFlag), &windows).unwrap();
        assert_eq!(col.values, vec![Some(0.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn unknown_inputs_and_collisions_are_rejected() {
        let bad = MetricDef::new(
            "BAD",
            Transform::Spread {
                long: "DGS30".to_string(),
                short: "DGS2".to_string(),
            },
        );
        let err = compute_metric(&yields(), &bad, &[]).unwrap_err();
        assert!(err.to_string().contains("DGS30"));

        let clash = MetricDef::new("DGS10", Transform::RecessionFlag);
        assert!(compute_all(&yields(), &[clash], &[]).is_err());

        let zero = MetricDef::new(
            "Z",
            Transform::Change {
                column: "DGS10".to_string(),
                periods: 0,
            },
        );
        assert!(compute_metric(&yields(), &zero, &[]).is_err());
    }

    #[test]
    fn transforms_parse_from_toml() {
        let def: MetricDef = toml::from_str(
            r#"
            name = "CPI_YoY"
            label = "CPI inflation, YoY %"
            transform = { op = "pct-change", column = "CPIAUCSL", periods = 12 }
            "#,
        )
        .unwrap();
        assert_eq!(
            def.transform,
            Transform::PctChange {
                column: "CPIAUCSL".to_string(),
                periods: 12
            }
        );

        let flag: MetricDef = toml::from_str(r#"
            name = "USREC"
            transform = { op = "recession-flag" }
        "#)
        .unwrap();
        assert_eq!(flag.transform, Transform::RecessionFlag);
    }
}
