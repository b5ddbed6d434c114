//! Series read from a directory of previously downloaded CSVs (`<dir>/<ID>.csv`).

use std::fs::File;
use std::path::PathBuf;

use crate::data::graph::restrict;
use crate::data::SeriesSource;
use crate::domain::{DateRange, Series};
use crate::error::PipelineError;
use crate::io::ingest::parse_series_csv;

pub struct LocalCsvSource {
    dir: PathBuf,
}

impl LocalCsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.csv"))
    }
}

impl SeriesSource for LocalCsvSource {
    fn name(&self) -> &str {
        "local-csv"
    }

    fn fetch(&self, id: &str, range: &DateRange) -> Result<Series, PipelineError> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(PipelineError::NotFound { id: id.to_string() });
        }
        let file = File::open(&path).map_err(|e| PipelineError::io(format!("Failed to open '{}'", path.display()), e))?;
        let observations = parse_series_csv(id, file)?;
        Ok(restrict(Series::from_observations(id, observations, None), range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_files_by_id_and_reports_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("UNRATE.csv"),
            "observation_date,UNRATE\n2024-01-01,3.7\n2024-02-01,3.9\n2024-03-01,3.9\n",
        )
        .unwrap();

        let source = LocalCsvSource::new(dir.path());
        let series = source.fetch("UNRATE", &DateRange::default()).unwrap();
        assert_eq!(series.observations.len(), 3);
        assert_eq!(series.frequency, crate::domain::Frequency::Monthly);

        let err = source.fetch("NOTAREALSERIES", &DateRange::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::NotFound {
                id: "NOTAREALSERIES".to_string()
            }
        );
    }
}
