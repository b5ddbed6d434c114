//! FRED's public CSV export (`fredgraph.csv`), which needs no API key.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::data::SeriesSource;
use crate::domain::{DateRange, Series};
use crate::error::PipelineError;
use crate::io::ingest::parse_series_csv;

const BASE_URL: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";
const USER_AGENT: &str = concat!("fred-macro-report/", env!("CARGO_PKG_VERSION"));

pub struct FredGraphClient {
    client: Client,
}

impl FredGraphClient {
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::validation(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl SeriesSource for FredGraphClient {
    fn name(&self) -> &str {
        "fred-graph-csv"
    }

    fn fetch(&self, id: &str, range: &DateRange) -> Result<Series, PipelineError> {
        let mut req = self.client.get(BASE_URL).query(&[("id", id)]);
        if let Some(start) = range.start {
            req = req.query(&[("cosd", start.to_string())]);
        }
        if let Some(end) = range.end {
            req = req.query(&[("coed", end.to_string())]);
        }

        let transient = |message: String| PipelineError::Transient {
            id: id.to_string(),
            message,
        };

        let resp = req
            .send()
            .map_err(|e| transient(format!("FRED CSV request failed: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| transient(format!("Failed to read FRED CSV body: {e}")))?;

        check_response(id, status, &body)?;

        let observations = parse_series_csv(id, body.as_bytes())?;
        let series = Series::from_observations(id, observations, None);
        Ok(restrict(series, range))
    }
}

fn check_response(id: &str, status: u16, body: &str) -> Result<(), PipelineError> {
    match status {
        200..=299 => {
            // Unknown ids come back as an HTML error page rather than CSV.
            if body.trim_start().starts_with('<') {
                Err(PipelineError::NotFound { id: id.to_string() })
            } else if body.trim().is_empty() {
                Err(PipelineError::Transient {
                    id: id.to_string(),
                    message: "FRED CSV export answered with an empty body.".to_string(),
                })
            } else {
                Ok(())
            }
        }
        400 | 404 => Err(PipelineError::NotFound { id: id.to_string() }),
        408 | 429 | 500..=599 => Err(PipelineError::Transient {
            id: id.to_string(),
            message: format!("FRED CSV export answered with status {status}."),
        }),
        _ => Err(PipelineError::validation(format!(
            "FRED CSV export rejected the request for {id} (status {status})."
        ))),
    }
}

/// Drop observations outside `range` (the export does not always honour it).
pub(crate) fn restrict(series: Series, range: &DateRange) -> Series {
    let observations = series
        .observations
        .into_iter()
        .filter(|o| range.contains(o.date))
        .collect();
    Series {
        observations,
        ..series
    }
}
