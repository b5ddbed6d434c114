//! Shared pipeline logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! validate -> acquire -> align -> drop sparse -> fill -> placeholders -> metrics -> render
//!
//! Everything here takes a `&dyn SeriesSource`, so tests drive the full
//! pipeline with an in-memory source. Nothing is written to disk until the
//! whole document has rendered.

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};

use crate::config::ReportConfig;
use crate::data::{AcquireOptions, Acquisition, SeriesCache, SeriesSource, acquire};
use crate::domain::Frequency;
use crate::error::PipelineError;
use crate::frame::{AlignedFrame, Column, align, apply_fill, drop_sparse_columns};
use crate::io::{frame_csv_bytes, write_all_or_nothing};
use crate::metrics::compute_all;
use crate::report::{RenderMeta, Snapshot, Warning, preflight, render};

/// Aligned frame plus what happened on the way.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub frame: AlignedFrame,
    pub warnings: Vec<Warning>,
    pub source: String,
}

/// All computed outputs of a single `fmr run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub snapshot: Snapshot,
    pub meta: RenderMeta,
    pub document: String,
}

/// Acquisition only (used by `fmr fetch`).
pub fn run_fetch(config: &ReportConfig, source: &dyn SeriesSource) -> Result<Acquisition, PipelineError> {
    config.validate()?;
    fetch(config, source)
}

/// Acquire, align, fill and compute metrics. No rendering.
pub fn run_frame(config: &ReportConfig, source: &dyn SeriesSource) -> Result<FrameOutput, PipelineError> {
    config.validate()?;
    build_frame(config, source)
}

/// Run the pipeline up to the rendered document, without writing anything.
pub fn run_report(
    config: &ReportConfig,
    source: &dyn SeriesSource,
    generated_at: Option<String>,
) -> Result<RunOutput, PipelineError> {
    config.validate()?;
    preflight(&config.report, &config.known_names())?;

    let built = build_frame(config, source)?;

    let snapshot = Snapshot {
        frame: built.frame,
        labels: labels(config),
        recessions: config.recessions.clone(),
        warnings: built.warnings,
    };
    let meta = RenderMeta {
        generated_at,
        source: built.source,
        range: config.run.range(),
        frequency: snapshot.frame.frequency(),
        fill: config.run.fill,
    };
    let document = render(&config.report, &snapshot, &meta, config.output.format)?;

    Ok(RunOutput {
        snapshot,
        meta,
        document,
    })
}

/// `run_report`, then write the document and the optional frame CSV.
///
/// Either both files are written or neither is.
pub fn execute_report(
    config: &ReportConfig,
    source: &dyn SeriesSource,
    generated_at: Option<String>,
) -> Result<RunOutput, PipelineError> {
    let output = run_report(config, source, generated_at)?;

    // Both files are rendered before anything touches the disk, then land together.
    let csv = match &config.output.frame_csv {
        Some(path) => Some((path, frame_csv_bytes(&output.snapshot.frame)?)),
        None => None,
    };
    let mut files: Vec<(&Path, &[u8])> = vec![(config.output.path.as_path(), output.document.as_bytes())];
    if let Some((path, bytes)) = &csv {
        files.push((path.as_path(), bytes.as_slice()));
    }
    write_all_or_nothing(&files)?;

    info!("wrote {}", config.output.path.display());
    if let Some((path, _)) = &csv {
        info!("wrote frame CSV {}", path.display());
    }

    Ok(output)
}

fn fetch(config: &ReportConfig, source: &dyn SeriesSource) -> Result<Acquisition, PipelineError> {
    let cache = config.fetch.cache_dir.as_ref().map(SeriesCache::new);
    let options = AcquireOptions {
        range: config.run.range(),
        retry: config.fetch.retry_policy(),
        cache: cache.as_ref(),
        concurrency: config.fetch.concurrency,
    };
    acquire(source, &config.series_ids(), &options)
}

fn build_frame(config: &ReportConfig, source: &dyn SeriesSource) -> Result<FrameOutput, PipelineError> {
    let mut acquisition = fetch(config, source)?;
    if acquisition.series.is_empty() {
        return Err(PipelineError::validation(format!(
            "None of the configured series could be acquired ({}).",
            acquisition.failed_ids().join(", ")
        )));
    }

    for series in &mut acquisition.series {
        if let Some(freq) = config.series_config(&series.id).and_then(|s| s.frequency) {
            series.frequency = freq;
        }
    }

    let frequency = config.run.frequency.unwrap_or_else(|| {
        Frequency::coarsest(acquisition.series.iter().map(|s| s.frequency)).unwrap_or(Frequency::Daily)
    });
    let range = config.run.range();
    info!("aligning {} series to {} ({})", acquisition.series.len(), frequency.display_name(), range.describe());

    let mut warnings = Vec::new();
    for failure in &acquisition.failures {
        warnings.push(Warning::new(
            failure.id.clone(),
            "Series not found at the source; shown as missing (NA).",
        ));
    }

    let mut frame = align(&acquisition.series, frequency, &range)?;

    if let Some(threshold) = config.run.max_missing_ratio {
        let (kept, dropped) = drop_sparse_columns(&frame, threshold);
        for id in dropped {
            let ratio = frame.missing_count(&id).unwrap_or(0) as f64 / frame.len().max(1) as f64;
            warn!("{id}: dropped, {:.0}% of dates missing", ratio * 100.0);
            warnings.push(Warning::new(
                id,
                format!(
                    "{:.0}% of dates missing before filling (limit {:.0}%); shown as missing (NA).",
                    ratio * 100.0,
                    threshold * 100.0
                ),
            ));
        }
        frame = kept;
    }

    let filled = apply_fill(&frame, config.run.fill);
    let with_placeholders = restore_configured_columns(&filled, &config.series_ids())?;

    let frame = compute_all(&with_placeholders, &config.metrics, &config.recessions)?;
    for metric in &config.metrics {
        if frame.column(&metric.name).is_some_and(|c| c.values.iter().all(Option::is_none)) {
            warnings.push(Warning::new(metric.name.clone(), "No value could be computed; shown as missing (NA)."));
        }
    }

    info!(
        "frame ready: {} dates x {} columns, {} warnings",
        frame.len(),
        frame.columns().len(),
        warnings.len()
    );

    Ok(FrameOutput {
        frame,
        warnings,
        source: source.name().to_string(),
    })
}

/// Put every configured series back in config order, using an all-missing
/// column for any that were not acquired or were dropped.
fn restore_configured_columns(frame: &AlignedFrame, ids: &[String]) -> Result<AlignedFrame, PipelineError> {
    let columns = ids
        .iter()
        .map(|id| {
            frame
                .column(id)
                .cloned()
                .unwrap_or_else(|| Column::new(id.clone(), vec![None; frame.len()]))
        })
        .collect();
    AlignedFrame::new(frame.frequency(), frame.dates().to_vec(), columns)
}

fn labels(config: &ReportConfig) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for s in &config.series {
        if let Some(label) = &s.label {
            out.insert(s.id.clone(), label.clone());
        }
    }
    for m in &config.metrics {
        out.insert(m.name.clone(), m.display_label());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::{DateRange, Observation, Series};

    struct Fixed(Vec<Series>);

    impl SeriesSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch(&self, id: &str, _range: &DateRange) -> Result<Series, PipelineError> {
            self.0
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .ok_or_else(|| PipelineError::NotFound { id: id.to_string() })
        }
    }

    fn monthly(id: &str, values: &[Option<f64>]) -> Series {
        let obs = values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation::new(NaiveDate::from_ymd_opt(2024, i as u32 + 1, 1).unwrap(), *v))
            .collect();
        Series::new(id, Frequency::Monthly, obs)
    }

    fn config(toml: &str) -> ReportConfig {
        ReportConfig::from_toml_str(toml).unwrap()
    }

    #[test]
    fn sparse_columns_are_dropped_and_reported() {
        let source = Fixed(vec![
            monthly("A", &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            monthly("B", &[Some(1.0), None, None, None]),
        ]);
        let cfg = config(
            r#"
            [run]
            max_missing_ratio = 0.5
            fill = "explicit-gap"
            [[series]]
            id = "A"
            [[series]]
            id = "B"
            "#,
        );
        let out = run_frame(&cfg, &source).unwrap();
        assert_eq!(out.frame.column_ids(), vec!["A", "B"]);
        assert_eq!(out.frame.missing_count("B"), Some(4));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].subject, "B");
    }

    #[test]
    fn nothing_acquired_is_a_validation_error() {
        let cfg = config("[[series]]\nid = \"NOPE\"\n");
        let err = run_frame(&cfg, &Fixed(vec![])).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn frequency_override_drives_the_axis() {
        let source = Fixed(vec![monthly("A", &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)])]);
        let cfg = config("[run]\nfrequency = \"quarterly\"\n[[series]]\nid = \"A\"\n");
        let out = run_frame(&cfg, &source).unwrap();
        assert_eq!(out.frame.frequency(), Frequency::Quarterly);
        assert_eq!(out.frame.len(), 2);
        assert_eq!(out.frame.column("A").unwrap().values, vec![Some(3.0), Some(6.0)]);
    }
}
