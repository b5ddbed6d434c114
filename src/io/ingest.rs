//! CSV ingest for FRED-style two-column downloads.
//!
//! FRED's graph endpoint (and files saved from it) look like:
//!
//! ```text
//! observation_date,DGS10
//! 2024-01-02,3.95
//! 2024-01-15,.
//! ```
//!
//! We take the first column as the date and the second as the value, ignoring
//! header names. Design goals:
//! - **Tolerant rows**: unparseable dates are dropped, unparseable values become missing
//! - **Strict shape**: fewer than two columns is an error
//! - **Deterministic behavior**: output is sorted by date, duplicates collapse to the last row

use std::io::Read;

use chrono::NaiveDate;
use log::debug;

use crate::domain::Observation;
use crate::error::PipelineError;

/// Parse a two-column series CSV into observations.
pub fn parse_series_csv<R: Read>(series_id: &str, reader: R) -> Result<Vec<Observation>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::validation(format!("Failed to read CSV headers for {series_id}: {e}")))?
        .clone();

    if headers.len() < 2 {
        return Err(PipelineError::validation(format!(
            "Unexpected CSV format for {series_id}: need at least 2 columns, got {}.",
            headers.len()
        )));
    }
    debug!(
        "{series_id}: reading columns '{}' / '{}'",
        normalize_header_name(&headers[0]),
        normalize_header_name(&headers[1])
    );

    let mut out = Vec::new();
    let mut dropped = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(_) => {
                dropped += 1;
                continue;
            }
        };

        let Some(date) = record.get(0).and_then(parse_date) else {
            dropped += 1;
            continue;
        };
        let value = record.get(1).and_then(parse_value);
        out.push(Observation::new(date, value));
    }

    if dropped > 0 {
        debug!("{series_id}: dropped {dropped} rows without a usable date");
    }

    out.sort_by_key(|o| o.date);
    Ok(out)
}

fn normalize_header_name(name: &str) -> String {
    // Files saved from spreadsheet tools sometimes carry a UTF-8 BOM on the
    // first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Parse a date in one of the accepted layouts.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    // FRED writes ISO dates; hand-edited files often use the other layouts.
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let s = s.trim().trim_start_matches('\u{feff}');
    // Some exports append a time component.
    let s = s.split_whitespace().next().unwrap_or(s);
    FMTS.iter().find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a FRED value cell. `"."` and empty cells are FRED's missing markers.
pub fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
