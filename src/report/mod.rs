//! Report layout, rendering and output.
//!
//! A report is an ordered list of sections bound to an immutable `Snapshot`
//! of the aligned frame (observed series and derived metrics). Every column
//! a section names is checked twice: once before acquisition (`preflight`
//! against the configured names) and once against the snapshot at render
//! time. Either check fails with `PipelineError::Render` naming the missing
//! reference.

use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::domain::{DateRange, FillPolicy, Frequency, OutputFormat, RecessionWindow};
use crate::error::PipelineError;
use crate::frame::AlignedFrame;
use crate::io::write_all_or_nothing;

pub mod format;
pub mod html;
pub mod markdown;

pub use format::*;

/// Title plus the ordered sections of one report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportSpec {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub sections: Vec<Section>,
}

fn default_title() -> String {
    "FRED Macro Report".to_string()
}

impl Default for ReportSpec {
    fn default() -> Self {
        Self {
            title: default_title(),
            subtitle: None,
            sections: Vec::new(),
        }
    }
}

fn default_chart_width() -> usize {
    72
}

fn default_chart_height() -> usize {
    14
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Section {
    /// Free text, rendered as-is (Markdown) or escaped into a paragraph (HTML).
    Prose { text: String },

    /// Date-indexed values; `last` keeps only the trailing rows. Empty `columns` means all.
    Table {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default)]
        last: Option<usize>,
    },

    Chart {
        #[serde(default)]
        title: Option<String>,
        column: String,
        #[serde(default = "default_chart_width")]
        width: usize,
        #[serde(default = "default_chart_height")]
        height: usize,
    },

    /// Per-column statistics. Empty `columns` means all.
    Summary {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        columns: Vec<String>,
    },

    /// Recession windows, optionally with the range of one column inside each.
    Recessions {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        column: Option<String>,
    },
}

impl Section {
    /// Column names this section needs.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Section::Prose { .. } => Vec::new(),
            Section::Table { columns, .. } | Section::Summary { columns, .. } => {
                columns.iter().map(String::as_str).collect()
            }
            Section::Chart { column, .. } => vec![column.as_str()],
            Section::Recessions { column, .. } => column.iter().map(String::as_str).collect(),
        }
    }
}

/// A non-fatal problem surfaced in the report's "Data gaps" section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Everything a renderer may read. Built once per run, never mutated.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: AlignedFrame,
    /// Display labels by column id (series labels and metric labels).
    pub labels: BTreeMap<String, String>,
    pub recessions: Vec<RecessionWindow>,
    pub warnings: Vec<Warning>,
}

impl Snapshot {
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.labels.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Columns named by a section, or all frame columns when none are named.
    pub fn resolve<'a>(&'a self, columns: &'a [String]) -> Vec<&'a str> {
        if columns.is_empty() {
            self.frame.column_ids()
        } else {
            columns.iter().map(String::as_str).collect()
        }
    }
}

/// Run metadata printed at the top of the report.
///
/// `generated_at` is the only wall-clock value in a document; leave it `None`
/// for byte-reproducible output.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMeta {
    pub generated_at: Option<String>,
    pub source: String,
    pub range: DateRange,
    pub frequency: Frequency,
    pub fill: FillPolicy,
}

/// Fail on the first section reference not in `names`.
pub fn preflight(spec: &ReportSpec, names: &[String]) -> Result<(), PipelineError> {
    for section in &spec.sections {
        for reference in section.references() {
            if !names.iter().any(|n| n == reference) {
                return Err(PipelineError::Render {
                    reference: reference.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Render the whole document in `format`.
pub fn render(
    spec: &ReportSpec,
    snapshot: &Snapshot,
    meta: &RenderMeta,
    format: OutputFormat,
) -> Result<String, PipelineError> {
    let available: Vec<String> = snapshot.frame.column_ids().into_iter().map(str::to_string).collect();
    preflight(spec, &available)?;

    info!(
        "rendering {} report: {} sections, {} columns x {} dates",
        format.display_name(),
        spec.sections.len(),
        available.len(),
        snapshot.frame.len()
    );

    Ok(match format {
        OutputFormat::Static => markdown::render_markdown(spec, snapshot, meta),
        OutputFormat::Interactive => html::render_html(spec, snapshot, meta),
    })
}

/// Write `content` to `path` via a sibling temp file and a rename, creating parent dirs.
pub fn write_document(path: &Path, content: &str) -> Result<(), PipelineError> {
    write_all_or_nothing(&[(path, content.as_bytes())])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use chrono::NaiveDate;

    use crate::frame::Column;

    pub(crate) fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    pub(crate) fn sample_snapshot() -> Snapshot {
        let frame = AlignedFrame::new(
            Frequency::Monthly,
            vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31)],
            vec![
                Column::new("DGS10", vec![Some(4.25), Some(4.3), Some(4.2)]),
                Column::new("DGS2", vec![Some(4.8), None, Some(4.6)]),
                Column::new("SPREAD", vec![Some(-0.55), None, Some(-0.4)]),
            ],
        )
        .unwrap();
        let mut labels = BTreeMap::new();
        labels.insert("DGS10".to_string(), "10-Year <Treasury>".to_string());
        Snapshot {
            frame,
            labels,
            recessions: vec![RecessionWindow {
                start: d(2024, 2, 1),
                end: d(2024, 2, 29),
                label: Some("Test".to_string()),
            }],
            warnings: vec![Warning::new("NOTAREALSERIES", "Series not found; shown as missing.")],
        }
    }

    pub(crate) fn sample_meta() -> RenderMeta {
        RenderMeta {
            generated_at: None,
            source: "memory".to_string(),
            range: DateRange::new(Some(d(2024, 1, 1)), Some(d(2024, 3, 31))),
            frequency: Frequency::Monthly,
            fill: FillPolicy::ExplicitGap,
        }
    }

    fn spec_with(sections: Vec<Section>) -> ReportSpec {
        ReportSpec {
            sections,
            ..ReportSpec::default()
        }
    }

    #[test]
    fn missing_reference_is_named() {
        let spec = spec_with(vec![
            Section::Prose { text: "x".to_string() },
            Section::Chart {
                title: None,
                column: "CPI_YoY".to_string(),
                width: 40,
                height: 8,
            },
        ]);
        let err = render(&spec, &sample_snapshot(), &sample_meta(), OutputFormat::Static).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Render {
                reference: "CPI_YoY".to_string()
            }
        );
        assert!(preflight(&spec, &["DGS10".to_string()]).is_err());
    }

    #[test]
    fn rendering_is_deterministic_in_both_formats() {
        let spec = spec_with(vec![
            Section::Table {
                title: None,
                columns: vec![],
                last: None,
            },
            Section::Chart {
                title: None,
                column: "SPREAD".to_string(),
                width: 30,
                height: 6,
            },
        ]);
        for format in [OutputFormat::Static, OutputFormat::Interactive] {
            let a = render(&spec, &sample_snapshot(), &sample_meta(), format).unwrap();
            let b = render(&spec, &sample_snapshot(), &sample_meta(), format).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn sections_parse_from_toml() {
        let spec: ReportSpec = toml::from_str(
            r#"
            title = "T"
            [[sections]]
            kind = "table"
            columns = ["DGS10"]
            last = 6

            [[sections]]
            kind = "recessions"
            "#,
        )
        .unwrap();
        assert_eq!(spec.sections.len(), 2);
        assert_eq!(spec.sections[0].references(), vec!["DGS10"]);
        assert!(spec.sections[1].references().is_empty());
    }

    #[test]
    fn write_document_creates_parents_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.md");
        write_document(&path, "# hello\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "# hello\n");
        let names: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().flatten().collect();
        assert_eq!(names.len(), 1);
    }
}
