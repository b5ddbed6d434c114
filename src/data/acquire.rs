//! Parallel acquisition with retry/backoff and per-series failure isolation.
//!
//! Each identifier is fetched independently on a bounded rayon pool; the
//! results are joined before anything downstream runs. A `NotFound` only
//! removes that series (it is reported as a gap); an exhausted `Transient`
//! or any other failure aborts the whole acquisition.

use std::thread;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use rayon::prelude::*;

use crate::data::{SeriesCache, SeriesSource};
use crate::domain::{DateRange, Series};
use crate::error::PipelineError;

/// Retry settings for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Everything `acquire` needs besides the source and the ids.
#[derive(Debug, Clone)]
pub struct AcquireOptions<'a> {
    pub range: DateRange,
    pub retry: RetryPolicy,
    pub cache: Option<&'a SeriesCache>,
    /// Upper bound on simultaneous fetches.
    pub concurrency: usize,
}

/// A series that could not be acquired but did not abort the run.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionFailure {
    pub id: String,
    pub error: PipelineError,
}

/// Joined result of one acquisition round, in request order.
#[derive(Debug, Clone, Default)]
pub struct Acquisition {
    pub series: Vec<Series>,
    pub failures: Vec<AcquisitionFailure>,
}

impl Acquisition {
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}

/// Fetch one series, retrying transient failures with exponential backoff + jitter.
pub fn fetch_with_retry(
    source: &dyn SeriesSource,
    id: &str,
    range: &DateRange,
    policy: &RetryPolicy,
) -> Result<Series, PipelineError> {
    let mut attempt = 0;
    loop {
        match source.fetch(id, range) {
            Ok(series) => return Ok(series),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt) + jitter(policy.base_delay);
                warn!(
                    "{id}: {err} (retry {}/{} in {} ms)",
                    attempt + 1,
                    policy.max_retries,
                    delay.as_millis()
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn jitter(base: Duration) -> Duration {
    let max_ms = base.as_millis().min(u64::MAX as u128) as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Fetch `ids` concurrently and join the results.
///
/// Validation happens before any source call.
pub fn acquire(
    source: &dyn SeriesSource,
    ids: &[String],
    options: &AcquireOptions<'_>,
) -> Result<Acquisition, PipelineError> {
    options.range.validate()?;
    if ids.is_empty() {
        return Err(PipelineError::validation("No series identifiers requested."));
    }
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(PipelineError::validation(format!("Series '{id}' requested more than once.")));
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency.max(1))
        .build()
        .map_err(|e| PipelineError::validation(format!("Failed to start fetch workers: {e}")))?;

    info!(
        "fetching {} series from {} ({})",
        ids.len(),
        source.name(),
        options.range.describe()
    );

    let results: Vec<(String, Result<Series, PipelineError>)> = pool.install(|| {
        ids.par_iter()
            .map(|id| (id.clone(), fetch_cached(source, id, options)))
            .collect()
    });

    let mut acquisition = Acquisition::default();
    for (id, result) in results {
        match result {
            Ok(series) => {
                info!(
                    "{id}: {} observations ({} present, {})",
                    series.observations.len(),
                    series.present_count(),
                    series.frequency.display_name()
                );
                acquisition.series.push(series);
            }
            Err(err @ PipelineError::NotFound { .. }) => {
                warn!("{err} It will be reported as a gap.");
                acquisition.failures.push(AcquisitionFailure { id, error: err });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(acquisition)
}

fn fetch_cached(source: &dyn SeriesSource, id: &str, options: &AcquireOptions<'_>) -> Result<Series, PipelineError> {
    if let Some(series) = options.cache.and_then(|c| c.get(id, &options.range)) {
        return Ok(series);
    }

    let series = fetch_with_retry(source, id, &options.range, &options.retry)?;

    if let Some(cache) = options.cache {
        if let Err(e) = cache.put(&series, &options.range) {
            warn!("{id}: not cached: {e}");
        }
    }
    Ok(series)
}
