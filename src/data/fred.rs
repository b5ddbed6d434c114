//! FRED JSON API integration (`fred/series/observations`).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::data::SeriesSource;
use crate::domain::{DateRange, Observation, Series};
use crate::error::PipelineError;
use crate::io::ingest::{parse_date, parse_value};

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const OBS_LIMIT: usize = 100_000;
const USER_AGENT: &str = concat!("fred-macro-report/", env!("CARGO_PKG_VERSION"));

pub struct FredApiClient {
    client: Client,
    api_key: String,
}

impl FredApiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::validation(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into().trim().to_string(),
        })
    }

    /// Build a client from `FRED_API_KEY`. `app::run` loads `.env` before this.
    pub fn from_env(timeout: Duration) -> Result<Self, PipelineError> {
        let api_key = std::env::var("FRED_API_KEY")
            .map_err(|_| PipelineError::validation("Missing FRED_API_KEY in environment (.env)."))?;
        if api_key.trim().is_empty() {
            return Err(PipelineError::validation("FRED_API_KEY is empty."));
        }
        Self::new(api_key, timeout)
    }

    /// True when an API key is available, used to pick the default source.
    pub fn key_available() -> bool {
        std::env::var("FRED_API_KEY").is_ok_and(|k| !k.trim().is_empty())
    }
}

impl SeriesSource for FredApiClient {
    fn name(&self) -> &str {
        "fred-api"
    }

    fn fetch(&self, id: &str, range: &DateRange) -> Result<Series, PipelineError> {
        let limit = OBS_LIMIT.to_string();
        let mut req = self.client.get(BASE_URL).query(&[
            ("series_id", id),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
            ("sort_order", "asc"),
            ("limit", limit.as_str()),
        ]);
        if let Some(start) = range.start {
            req = req.query(&[("observation_start", start.to_string())]);
        }
        if let Some(end) = range.end {
            req = req.query(&[("observation_end", end.to_string())]);
        }

        let resp = req.send().map_err(|e| PipelineError::Transient {
            id: id.to_string(),
            message: format!("FRED request failed: {e}"),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(classify_failure(id, status.as_u16(), &body));
        }

        let body: ObservationsResponse = resp.json().map_err(|e| PipelineError::Transient {
            id: id.to_string(),
            message: format!("Failed to parse FRED response: {e}"),
        })?;

        Ok(Series::from_observations(id, to_observations(body), None))
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_message: String,
}

fn to_observations(body: ObservationsResponse) -> Vec<Observation> {
    body.observations
        .into_iter()
        .filter_map(|obs| {
            let date = parse_date(&obs.date)?;
            Some(Observation::new(date, parse_value(&obs.value)))
        })
        .collect()
}

/// Map a non-success HTTP answer onto the error taxonomy.
///
/// FRED answers unknown series with `400 Bad Request` and a message saying the
/// series does not exist; a bad API key is also a 400 but is not retryable.
pub(crate) fn classify_failure(id: &str, status: u16, body: &str) -> PipelineError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error_message)
        .unwrap_or_default();

    match status {
        404 => PipelineError::NotFound { id: id.to_string() },
        400 if message.to_ascii_lowercase().contains("does not exist") => {
            PipelineError::NotFound { id: id.to_string() }
        }
        408 | 429 | 500..=599 => PipelineError::Transient {
            id: id.to_string(),
            message: format!("FRED answered with status {status}."),
        },
        _ => PipelineError::validation(format!(
            "FRED rejected the request for {id} (status {status}): {}",
            if message.is_empty() { "no details" } else { message.as_str() }
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn observations_keep_missing_markers() {
        let body: ObservationsResponse = serde_json::from_str(
            r#"{"observations": [
                {"date": "2024-01-02", "value": "4.25"},
                {"date": "2024-01-03", "value": "."},
                {"date": "garbage", "value": "1.0"}
            ]}"#,
        )
        .unwrap();
        let obs = to_observations(body);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(obs[0].value, Some(4.25));
        assert_eq!(obs[1].value, None);
    }

    #[test]
    fn unknown_series_is_not_found() {
        let body = r#"{"error_code":400,"error_message":"Bad Request.  The series does not exist."}"#;
        assert_eq!(
            classify_failure("NOTAREALSERIES", 400, body),
            PipelineError::NotFound {
                id: "NOTAREALSERIES".to_string()
            }
        );
        assert!(matches!(classify_failure("X", 404, ""), PipelineError::NotFound { .. }));
    }

    #[test]
    fn server_errors_are_transient_and_bad_keys_are_not() {
        assert!(classify_failure("DGS10", 503, "").is_retryable());
        assert!(classify_failure("DGS10", 429, "").is_retryable());

        let bad_key = r#"{"error_code":400,"error_message":"Bad Request.  The value for variable api_key is not registered."}"#;
        let err = classify_failure("DGS10", 400, bad_key);
        assert!(matches!(err, PipelineError::Validation(ref m) if m.contains("api_key")));
    }
}
