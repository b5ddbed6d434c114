//! On-disk read-through cache for fetched series.
//!
//! One JSON file per `(series id, range)` key. There is no automatic eviction:
//! entries live until `clear` is called (e.g. via `fmr cache-clear`).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::domain::{DateRange, Series};
use crate::error::PipelineError;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct SeriesCache {
    dir: PathBuf,
}

impl SeriesCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str, range: &DateRange) -> PathBuf {
        let start = range.start.map(|d| d.to_string()).unwrap_or_else(|| "min".to_string());
        let end = range.end.map(|d| d.to_string()).unwrap_or_else(|| "max".to_string());
        let safe_id: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe_id}__{start}__{end}.{EXTENSION}"))
    }

    /// Cached series, if any. Unreadable entries count as misses.
    pub fn get(&self, id: &str, range: &DateRange) -> Option<Series> {
        let path = self.path_for(id, range);
        let file = File::open(&path).ok()?;
        match serde_json::from_reader::<_, Series>(file) {
            Ok(series) if series.id == id => {
                debug!("cache hit for {id} ({})", path.display());
                Some(series)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("ignoring unreadable cache entry {}: {e}", path.display());
                None
            }
        }
    }

    pub fn put(&self, series: &Series, range: &DateRange) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| PipelineError::io(format!("Failed to create cache dir '{}'", self.dir.display()), e))?;
        let path = self.path_for(&series.id, range);
        let tmp = path.with_extension("partial");
        let file = File::create(&tmp)
            .map_err(|e| PipelineError::io(format!("Failed to create cache entry '{}'", tmp.display()), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, series)
            .map_err(|e| PipelineError::io(format!("Failed to write cache entry '{}'", tmp.display()), e))?;
        writer
            .flush()
            .map_err(|e| PipelineError::io(format!("Failed to write cache entry '{}'", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .map_err(|e| PipelineError::io(format!("Failed to finalize cache entry '{}'", path.display()), e))?;
        Ok(())
    }

    /// Remove every cache entry. Returns how many files were deleted.
    pub fn clear(&self) -> Result<usize, PipelineError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(PipelineError::io(format!("Failed to read cache dir '{}'", self.dir.display()), e)),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION || ext == "partial") {
                fs::remove_file(&path)
                    .map_err(|e| PipelineError::io(format!("Failed to remove '{}'", path.display()), e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::{Frequency, Observation};

    fn sample() -> Series {
        Series::new(
            "DGS10",
            Frequency::Daily,
            vec![
                Observation::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), Some(3.95)),
                Observation::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), None),
            ],
        )
    }

    #[test]
    fn put_then_get_is_keyed_by_range() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path().join("cache"));
        let range = DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 1), None);

        assert!(cache.get("DGS10", &range).is_none());
        cache.put(&sample(), &range).unwrap();
        assert_eq!(cache.get("DGS10", &range), Some(sample()));
        assert!(cache.get("DGS10", &DateRange::default()).is_none());
    }

    #[test]
    fn clear_removes_entries_and_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path().join("cache"));
        assert_eq!(cache.clear().unwrap(), 0);

        cache.put(&sample(), &DateRange::default()).unwrap();
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.get("DGS10", &DateRange::default()).is_none());
    }

    #[test]
    fn corrupt_entries_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        let range = DateRange::default();
        fs::write(cache.path_for("DGS10", &range), "{not json").unwrap();
        assert!(cache.get("DGS10", &range).is_none());
    }
}
