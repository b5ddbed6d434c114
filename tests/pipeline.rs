//! End-to-end pipeline runs against an in-memory series source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;

use fred_macro_report::app::pipeline::{execute_report, run_frame, run_report};
use fred_macro_report::config::{Overrides, ReportConfig};
use fred_macro_report::data::SeriesSource;
use fred_macro_report::domain::{DateRange, Frequency, Observation, OutputFormat, Series};
use fred_macro_report::error::PipelineError;
use fred_macro_report::report::Section;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Serves fixed series; ids listed in `flaky` always fail transiently.
struct MemorySource {
    series: HashMap<String, Series>,
    flaky: Vec<String>,
    calls: AtomicUsize,
}

impl MemorySource {
    fn new(series: Vec<Series>) -> Self {
        Self {
            series: series.into_iter().map(|s| (s.id.clone(), s)).collect(),
            flaky: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SeriesSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, id: &str, range: &DateRange) -> Result<Series, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.flaky.iter().any(|f| f == id) {
            return Err(PipelineError::Transient {
                id: id.to_string(),
                message: "upstream timeout".to_string(),
            });
        }
        let series = self
            .series
            .get(id)
            .ok_or_else(|| PipelineError::NotFound { id: id.to_string() })?;
        let observations = series
            .observations
            .iter()
            .filter(|o| range.contains(o.date))
            .copied()
            .collect();
        Ok(Series::new(id, series.frequency, observations))
    }
}

fn daily(id: &str, values: &[(NaiveDate, Option<f64>)]) -> Series {
    Series::new(
        id,
        Frequency::Daily,
        values.iter().map(|(d, v)| Observation::new(*d, *v)).collect(),
    )
}

fn treasury_source() -> MemorySource {
    MemorySource::new(vec![
        daily(
            "DGS10",
            &[
                (d(2024, 1, 2), Some(4.25)),
                (d(2024, 1, 3), Some(4.30)),
                (d(2024, 1, 4), None),
                (d(2024, 1, 5), Some(4.05)),
            ],
        ),
        daily(
            "DGS2",
            &[
                (d(2024, 1, 2), Some(4.80)),
                (d(2024, 1, 3), Some(4.75)),
                (d(2024, 1, 4), Some(4.70)),
                (d(2024, 1, 5), Some(4.40)),
            ],
        ),
    ])
}

const CONFIG: &str = r#"
[run]
start = "2024-01-01"
end = "2024-01-31"
fill = "explicit-gap"

[fetch]
max_retries = 1
backoff_ms = 0

[[series]]
id = "DGS10"
label = "10-Year Treasury"

[[series]]
id = "DGS2"
label = "2-Year Treasury"

[[series]]
id = "NOTAREALSERIES"

[[recessions]]
start = "2024-01-03"
end = "2024-01-04"
label = "Synthetic"

[[metrics]]
name = "SPREAD_10Y2Y"
label = "10Y-2Y spread"
transform = { op = "spread", long = "DGS10", short = "DGS2" }

[[metrics]]
name = "INVERTED"
transform = { op = "inversion-flag", column = "SPREAD_10Y2Y" }

[report]
title = "Treasury curve"

[[report.sections]]
kind = "prose"
text = "Daily Treasury yields."

[[report.sections]]
kind = "table"
columns = ["DGS10", "DGS2", "SPREAD_10Y2Y"]

[[report.sections]]
kind = "chart"
column = "SPREAD_10Y2Y"
width = 30
height = 6

[[report.sections]]
kind = "summary"

[[report.sections]]
kind = "recessions"
column = "SPREAD_10Y2Y"
"#;

fn config() -> ReportConfig {
    ReportConfig::from_toml_str(CONFIG).unwrap()
}

#[test]
fn spread_on_a_known_date() {
    let _ = env_logger::try_init();

    let out = run_frame(&config(), &treasury_source()).unwrap();
    let spread = out.frame.value("SPREAD_10Y2Y", d(2024, 1, 2)).unwrap();
    assert!((spread - (-0.55)).abs() < 1e-12);
    assert_eq!(out.frame.value("INVERTED", d(2024, 1, 2)), Some(1.0));
    // Missing 10Y on the 4th propagates to the spread.
    assert_eq!(out.frame.value("SPREAD_10Y2Y", d(2024, 1, 4)), None);
}

#[test]
fn unknown_series_is_isolated_and_flagged_as_a_gap() {
    let source = treasury_source();
    let out = run_report(&config(), &source, None).unwrap();

    assert_eq!(out.snapshot.frame.missing_count("NOTAREALSERIES"), Some(4));
    assert!(out.snapshot.frame.value("DGS10", d(2024, 1, 2)).is_some());

    let gaps = &out.document[out.document.find("## Data gaps").unwrap()..];
    assert!(gaps.contains("**NOTAREALSERIES**"));
    assert!(gaps.contains("| NOTAREALSERIES | 4 | 4 |"));
    assert!(out.document.contains("| 2024-01-04 | NA | 4.70 | NA |"));
}

#[test]
fn end_before_start_fails_before_any_fetch() {
    let source = treasury_source();
    let mut cfg = ReportConfig::from_toml_str(
        r#"
        [[series]]
        id = "DGS10"
        [[series]]
        id = "UNRATE"
        "#,
    )
    .unwrap();
    cfg.apply(&Overrides {
        start: Some(d(2025, 1, 1)),
        end: Some(d(2024, 1, 1)),
        ..Overrides::default()
    });

    let err = run_report(&cfg, &source, None).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(source.calls(), 0);
}

#[test]
fn unknown_section_reference_is_a_render_error() {
    let source = treasury_source();
    let mut cfg = config();
    cfg.report.sections.push(Section::Chart {
        title: None,
        column: "CPI_YoY".to_string(),
        width: 40,
        height: 8,
    });

    let err = run_report(&cfg, &source, None).unwrap_err();
    assert_eq!(
        err,
        PipelineError::Render {
            reference: "CPI_YoY".to_string()
        }
    );
    assert_eq!(source.calls(), 0);
}

#[test]
fn reports_are_deterministic_without_a_timestamp() {
    let a = run_report(&config(), &treasury_source(), None).unwrap();
    let b = run_report(&config(), &treasury_source(), None).unwrap();
    assert_eq!(a.document, b.document);

    let mut cfg = config();
    cfg.output.format = OutputFormat::Interactive;
    let c = run_report(&cfg, &treasury_source(), None).unwrap();
    let e = run_report(&cfg, &treasury_source(), None).unwrap();
    assert_eq!(c.document, e.document);
    assert!(c.document.starts_with("<!DOCTYPE html>"));
}

#[test]
fn execute_writes_report_and_frame_csv() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.output.path = dir.path().join("out").join("report.md");
    cfg.output.frame_csv = Some(dir.path().join("out").join("frame.csv"));

    execute_report(&cfg, &treasury_source(), Some("2026-10-17T00:00:00Z".to_string())).unwrap();

    let doc = std::fs::read_to_string(&cfg.output.path).unwrap();
    assert!(doc.contains("| Generated at | 2026-10-17T00:00:00Z |"));
    let csv = std::fs::read_to_string(dir.path().join("out").join("frame.csv")).unwrap();
    assert!(csv.starts_with("date,DGS10,DGS2,NOTAREALSERIES,SPREAD_10Y2Y,INVERTED\n"));
}

#[test]
fn exhausted_retries_abort_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = treasury_source();
    source.flaky.push("DGS2".to_string());
    let mut cfg = config();
    cfg.output.path = dir.path().join("report.md");

    let err = execute_report(&cfg, &source, None).unwrap_err();
    assert!(err.is_retryable());
    assert!(!cfg.output.path.exists());
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn failed_report_write_leaves_no_frame_csv() {
    let dir = tempfile::tempdir().unwrap();
    // The report directory cannot be created: a file is in the way.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let mut cfg = config();
    cfg.output.path = blocker.join("report.md");
    cfg.output.frame_csv = Some(dir.path().join("frame.csv"));

    let err = execute_report(&cfg, &treasury_source(), None).unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
    assert!(!dir.path().join("frame.csv").exists());
    assert!(!dir.path().join("frame.csv.partial").exists());
}
