//! Aligned frames: many series on one canonical date axis.
//!
//! `AlignedFrame` is the hand-off type between the normalizer, the metric
//! engine and the renderer. It is immutable once built; operations that add
//! columns return a new frame.

use chrono::NaiveDate;

use crate::domain::{Frequency, Observation, Series};
use crate::error::PipelineError;

pub mod normalize;

pub use normalize::{align, apply_fill, drop_sparse_columns, normalize, NormalizeOptions};

/// One named column of an aligned frame. `None` is the explicit missing marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(id: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// A date axis plus a fixed set of columns.
///
/// Invariants (checked by [`AlignedFrame::new`]):
/// - dates strictly increasing
/// - every column holds exactly one entry per date
/// - column ids are unique
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    frequency: Frequency,
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl AlignedFrame {
    pub fn new(frequency: Frequency, dates: Vec<NaiveDate>, columns: Vec<Column>) -> Result<Self, PipelineError> {
        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(PipelineError::validation(format!(
                "Frame axis is not strictly increasing ({} then {}).",
                w[0], w[1]
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if col.values.len() != dates.len() {
                return Err(PipelineError::validation(format!(
                    "Column '{}' has {} values for {} dates.",
                    col.id,
                    col.values.len(),
                    dates.len()
                )));
            }
            if columns[..i].iter().any(|c| c.id == col.id) {
                return Err(PipelineError::validation(format!("Duplicate column '{}'.", col.id)));
            }
        }
        Ok(Self {
            frequency,
            dates,
            columns,
        })
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn has_column(&self, id: &str) -> bool {
        self.column(id).is_some()
    }

    pub fn column_ids(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn value(&self, id: &str, date: NaiveDate) -> Option<f64> {
        let idx = self.dates.binary_search(&date).ok()?;
        self.column(id)?.values[idx]
    }

    pub fn missing_count(&self, id: &str) -> Option<usize> {
        self.column(id).map(Column::missing_count)
    }

    /// Return a new frame with `column` appended. `self` is left untouched.
    pub fn with_column(&self, column: Column) -> Result<AlignedFrame, PipelineError> {
        let mut columns = self.columns.clone();
        columns.push(column);
        AlignedFrame::new(self.frequency, self.dates.clone(), columns)
    }

    /// Return a new frame keeping only the columns for which `keep` is true.
    pub fn retain_columns(&self, mut keep: impl FnMut(&Column) -> bool) -> AlignedFrame {
        AlignedFrame {
            frequency: self.frequency,
            dates: self.dates.clone(),
            columns: self.columns.iter().filter(|c| keep(c)).cloned().collect(),
        }
    }

    /// Split the frame back into series (one observation per axis date, gaps included).
    pub fn to_series(&self) -> Vec<Series> {
        self.columns
            .iter()
            .map(|col| {
                let observations = self
                    .dates
                    .iter()
                    .zip(&col.values)
                    .map(|(&date, &value)| Observation::new(date, value))
                    .collect();
                Series::new(col.id.clone(), self.frequency, observations)
            })
            .collect()
    }

    /// `(date, value)` pairs for one column.
    pub fn points(&self, id: &str) -> Option<Vec<(NaiveDate, Option<f64>)>> {
        let col = self.column(id)?;
        Some(self.dates.iter().copied().zip(col.values.iter().copied()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn rejects_unsorted_axis() {
        let err = AlignedFrame::new(Frequency::Daily, vec![d(2024, 1, 3), d(2024, 1, 2)], vec![]).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let dup = AlignedFrame::new(Frequency::Daily, vec![d(2024, 1, 2), d(2024, 1, 2)], vec![]);
        assert!(dup.is_err());
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = AlignedFrame::new(
            Frequency::Daily,
            vec![d(2024, 1, 2), d(2024, 1, 3)],
            vec![Column::new("A", vec![Some(1.0)])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("'A'"));
    }

    #[test]
    fn with_column_leaves_original_untouched() {
        let frame = AlignedFrame::new(
            Frequency::Daily,
            vec![d(2024, 1, 2)],
            vec![Column::new("A", vec![Some(1.0)])],
        )
        .unwrap();
        let before = frame.clone();

        let extended = frame.with_column(Column::new("B", vec![None])).unwrap();
        assert_eq!(frame, before);
        assert_eq!(extended.column_ids(), vec!["A", "B"]);
        assert_eq!(extended.missing_count("B"), Some(1));
        assert!(frame.with_column(Column::new("A", vec![None])).is_err());
    }

    #[test]
    fn value_lookup_by_date() {
        let frame = AlignedFrame::new(
            Frequency::Daily,
            vec![d(2024, 1, 2), d(2024, 1, 3)],
            vec![Column::new("A", vec![Some(1.0), None])],
        )
        .unwrap();
        assert_eq!(frame.value("A", d(2024, 1, 2)), Some(1.0));
        assert_eq!(frame.value("A", d(2024, 1, 3)), None);
        assert_eq!(frame.value("A", d(2024, 1, 4)), None);
    }
}
