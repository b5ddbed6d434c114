//! Run configuration (TOML).
//!
//! A run is described by one file (default `report.toml`): date range,
//! series list, recession reference windows, metric definitions, report
//! layout and fetch settings. CLI flags may override a few run-level fields;
//! `validate` is applied after overrides and before any network call.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Deserialize;

use crate::data::RetryPolicy;
use crate::domain::{DateRange, FillPolicy, Frequency, OutputFormat, RecessionWindow};
use crate::error::PipelineError;
use crate::metrics::MetricDef;
use crate::report::ReportSpec;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub run: RunSettings,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub fetch: FetchSettings,

    /// Series to acquire, in report order.
    #[serde(default)]
    pub series: Vec<SeriesConfig>,

    /// Reference recession intervals (e.g. NBER dates).
    #[serde(default)]
    pub recessions: Vec<RecessionWindow>,

    /// Derived metrics, evaluated in order.
    #[serde(default)]
    pub metrics: Vec<MetricDef>,

    #[serde(default)]
    pub report: ReportSpec,
}

/// Date range, canonical frequency and fill policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub start: Option<NaiveDate>,

    #[serde(default)]
    pub end: Option<NaiveDate>,

    /// Canonical frequency; defaults to the coarsest acquired frequency.
    #[serde(default)]
    pub frequency: Option<Frequency>,

    #[serde(default)]
    pub fill: FillPolicy,

    /// Drop columns whose missing ratio (before filling) reaches this value.
    #[serde(default)]
    pub max_missing_ratio: Option<f64>,
}

impl RunSettings {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,

    /// Optional CSV export of the aligned frame and metrics.
    #[serde(default)]
    pub frame_csv: Option<PathBuf>,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("report/macro_report.md")
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
            frame_csv: None,
        }
    }
}

/// Which series source to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON API when `FRED_API_KEY` is set, otherwise the public CSV export.
    #[default]
    Auto,
    Api,
    Graph,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    #[serde(default)]
    pub source: SourceKind,

    /// Directory of `<ID>.csv` files for `source = "local"`.
    #[serde(default)]
    pub local_dir: Option<PathBuf>,

    /// Enables the on-disk cache when set.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    4
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            local_dir: None,
            cache_dir: None,
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesConfig {
    pub id: String,

    #[serde(default)]
    pub label: Option<String>,

    /// Free-form grouping shown by `fmr fetch` (e.g. "yield-curve", "inflation").
    #[serde(default)]
    pub group: Option<String>,

    /// Overrides the inferred frequency.
    #[serde(default)]
    pub frequency: Option<Frequency>,
}

/// Run-level values that may be overridden from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub frequency: Option<Frequency>,
    pub fill: Option<FillPolicy>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    pub source: Option<SourceKind>,
    pub no_cache: bool,
}

impl ReportConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("Failed to read config '{}'", path.display()), e))?;
        toml::from_str(&contents)
            .map_err(|e| PipelineError::validation(format!("Invalid configuration '{}': {e}", path.display())))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, PipelineError> {
        toml::from_str(contents).map_err(|e| PipelineError::validation(format!("Invalid configuration: {e}")))
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if overrides.start.is_some() {
            self.run.start = overrides.start;
        }
        if overrides.end.is_some() {
            self.run.end = overrides.end;
        }
        if overrides.frequency.is_some() {
            self.run.frequency = overrides.frequency;
        }
        if let Some(fill) = overrides.fill {
            self.run.fill = fill;
        }
        if let Some(format) = overrides.format {
            self.output.format = format;
        }
        if let Some(path) = &overrides.output {
            self.output.path = path.clone();
        }
        if let Some(source) = overrides.source {
            self.fetch.source = source;
        }
        if overrides.no_cache {
            self.fetch.cache_dir = None;
        }
    }

    pub fn series_ids(&self) -> Vec<String> {
        self.series.iter().map(|s| s.id.clone()).collect()
    }

    /// Every column name a report section may reference.
    pub fn known_names(&self) -> Vec<String> {
        self.series
            .iter()
            .map(|s| s.id.clone())
            .chain(self.metrics.iter().map(|m| m.name.clone()))
            .collect()
    }

    /// Series id to group name, for series that declare one.
    pub fn groups(&self) -> BTreeMap<String, String> {
        self.series
            .iter()
            .filter_map(|s| s.group.clone().map(|g| (s.id.clone(), g)))
            .collect()
    }

    pub fn series_config(&self, id: &str) -> Option<&SeriesConfig> {
        self.series.iter().find(|s| s.id == id)
    }

    /// Reject malformed configuration before any computation.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.run.range().validate()?;

        if self.series.is_empty() {
            return Err(PipelineError::validation("No series configured."));
        }

        let mut names: HashSet<&str> = HashSet::new();
        for s in &self.series {
            if s.id.trim().is_empty() {
                return Err(PipelineError::validation("Series id must not be empty."));
            }
            if !names.insert(s.id.as_str()) {
                return Err(PipelineError::validation(format!("Series '{}' is listed more than once.", s.id)));
            }
        }

        for m in &self.metrics {
            for input in m.transform.inputs() {
                if !names.contains(input) {
                    return Err(PipelineError::validation(format!(
                        "Metric '{}' uses '{input}', which is neither a configured series nor an earlier metric.",
                        m.name
                    )));
                }
            }
            if m.transform.window() == Some(0) {
                return Err(PipelineError::validation(format!(
                    "Metric '{}' needs a window of at least 1 period.",
                    m.name
                )));
            }
            if !names.insert(m.name.as_str()) {
                return Err(PipelineError::validation(format!(
                    "Metric name '{}' collides with a series or another metric.",
                    m.name
                )));
            }
        }

        for w in &self.recessions {
            if w.end < w.start {
                return Err(PipelineError::validation(format!(
                    "Recession window {} ends before it starts.",
                    w.display_label()
                )));
            }
        }

        if let Some(ratio) = self.run.max_missing_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PipelineError::validation("max_missing_ratio must be in (0, 1]."));
            }
        }

        if self.fetch.concurrency == 0 {
            return Err(PipelineError::validation("fetch.concurrency must be at least 1."));
        }
        if self.fetch.source == SourceKind::Local && self.fetch.local_dir.is_none() {
            return Err(PipelineError::validation("source = \"local\" requires fetch.local_dir."));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(PipelineError::validation("output.path must not be empty."));
        }

        Ok(())
    }
}
