//! Data acquisition.
//!
//! - `SeriesSource` is the seam between the pipeline and wherever series come from
//! - `fred` talks to the FRED JSON API (needs `FRED_API_KEY`)
//! - `graph` downloads FRED's public CSV export (no key)
//! - `local` reads previously downloaded CSV files from a directory
//! - `cache` is the optional on-disk read-through cache
//! - `acquire` fans fetches out in parallel with retry/backoff

use crate::domain::{DateRange, Series};
use crate::error::PipelineError;

pub mod acquire;
pub mod cache;
pub mod fred;
pub mod graph;
pub mod local;

pub use acquire::{acquire, Acquisition, AcquisitionFailure, AcquireOptions, RetryPolicy};
pub use cache::SeriesCache;
pub use fred::FredApiClient;
pub use graph::FredGraphClient;
pub use local::LocalCsvSource;

/// Something that can return the observations of a series by identifier.
///
/// Implementations must be shareable across the acquisition worker threads.
pub trait SeriesSource: Send + Sync {
    /// Short name used in logs and report metadata.
    fn name(&self) -> &str;

    /// Fetch one series restricted to `range`.
    ///
    /// Unknown identifiers must fail with `PipelineError::NotFound`; retryable
    /// failures with `PipelineError::Transient`.
    fn fetch(&self, id: &str, range: &DateRange) -> Result<Series, PipelineError>;
}
