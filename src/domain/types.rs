//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - cached on disk between runs (`Series`)
//! - read from the TOML run configuration (enums, `RecessionWindow`)
//! - passed between pipeline stages as immutable snapshots

use chrono::{Datelike, Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Observation frequency, ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub fn display_name(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
        }
    }

    /// Label of the period containing `date`.
    ///
    /// Periods are labelled by their last calendar day; weeks end on Sunday.
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::Weekly => {
                let from_monday = date.weekday().num_days_from_monday() as i64;
                date + Duration::days(6 - from_monday)
            }
            Frequency::Monthly => month_end(date.year(), date.month()),
            Frequency::Quarterly => {
                let quarter_month = ((date.month() - 1) / 3 + 1) * 3;
                month_end(date.year(), quarter_month)
            }
        }
    }

    /// The period label following `end` (which must itself be a period label).
    pub fn next_period_end(self, end: NaiveDate) -> NaiveDate {
        self.period_end(end + Duration::days(1))
    }

    /// Guess a frequency from observation spacing (median gap in days).
    pub fn infer(dates: &[NaiveDate]) -> Option<Frequency> {
        if dates.len() < 2 {
            return None;
        }
        let mut gaps: Vec<i64> = dates.windows(2).map(|w| (w[1] - w[0]).num_days().abs()).collect();
        gaps.sort_unstable();
        let median = gaps[gaps.len() / 2];

        Some(match median {
            0..=4 => Frequency::Daily,
            5..=10 => Frequency::Weekly,
            11..=45 => Frequency::Monthly,
            _ => Frequency::Quarterly,
        })
    }

    pub fn coarsest(freqs: impl IntoIterator<Item = Frequency>) -> Option<Frequency> {
        freqs.into_iter().max()
    }
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_y, next_m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    // The first of any month in chrono's supported range is valid.
    NaiveDate::from_ymd_opt(next_y, next_m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// One dated observation. `value == None` is the explicit missing marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            date,
            value: value.filter(|v| v.is_finite()),
        }
    }
}

/// A fetched time series (immutable once acquired).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub frequency: Frequency,
    pub observations: Vec<Observation>,
}

impl Series {
    /// Build a series with observations sorted by date; on duplicate dates the last one wins.
    pub fn new(id: impl Into<String>, frequency: Frequency, mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.date);
        let mut deduped: Vec<Observation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(last) if last.date == obs.date => *last = obs,
                _ => deduped.push(obs),
            }
        }
        Self {
            id: id.into(),
            frequency,
            observations: deduped,
        }
    }

    /// Build a series, inferring the frequency when no override is given.
    pub fn from_observations(
        id: impl Into<String>,
        observations: Vec<Observation>,
        frequency: Option<Frequency>,
    ) -> Self {
        let series = Series::new(id, Frequency::Daily, observations);
        let dates: Vec<NaiveDate> = series.observations.iter().map(|o| o.date).collect();
        let frequency = frequency
            .or_else(|| Frequency::infer(&dates))
            .unwrap_or(Frequency::Daily);
        Series { frequency, ..series }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    pub fn present_count(&self) -> usize {
        self.observations.iter().filter(|o| o.value.is_some()).count()
    }
}

/// Inclusive date range; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(PipelineError::validation(format!(
                    "Date range end {end} is before start {start}."
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    pub fn describe(&self) -> String {
        let start = self.start.map(|d| d.to_string()).unwrap_or_else(|| "earliest".to_string());
        let end = self.end.map(|d| d.to_string()).unwrap_or_else(|| "latest".to_string());
        format!("{start} .. {end}")
    }
}

/// How gaps on the aligned axis are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FillPolicy {
    /// Carry the last present value forward.
    #[default]
    ForwardFill,
    /// Leave gaps as explicit missing markers.
    ExplicitGap,
}

impl FillPolicy {
    pub fn display_name(self) -> &'static str {
        match self {
            FillPolicy::ForwardFill => "forward-fill",
            FillPolicy::ExplicitGap => "explicit-gap",
        }
    }
}

/// Target document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown with ASCII charts.
    #[default]
    Static,
    /// Self-contained HTML with SVG charts and a hover readout.
    Interactive,
}

impl OutputFormat {
    pub fn display_name(self) -> &'static str {
        match self {
            OutputFormat::Static => "static",
            OutputFormat::Interactive => "interactive",
        }
    }
}

/// A reference recession interval (inclusive). Used for overlays only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecessionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub label: Option<String>,
}

impl RecessionWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("{} to {}", self.start, self.end))
    }
}
