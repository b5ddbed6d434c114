//! Export the aligned frame (series and metrics) to CSV.
//!
//! One `date` column followed by one column per frame column, in frame order.
//! Missing values are written as empty cells so spreadsheets and pandas read
//! them back as missing.

use std::io::Write;
use std::path::Path;

use crate::error::PipelineError;
use crate::io::atomic::write_all_or_nothing;
use crate::frame::AlignedFrame;

/// Write `frame` to `path`, creating parent directories.
pub fn write_frame_csv(path: &Path, frame: &AlignedFrame) -> Result<(), PipelineError> {
    let bytes = frame_csv_bytes(frame)?;
    write_all_or_nothing(&[(path, bytes.as_slice())])
}

/// The frame as CSV, in memory, so it can be written together with other outputs.
pub fn frame_csv_bytes(frame: &AlignedFrame) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    write_frame(&mut buf, frame).map_err(|e| PipelineError::io("Failed to encode frame CSV", e))?;
    Ok(buf)
}

/// Write `frame` as CSV to any writer.
pub fn write_frame<W: Write>(writer: W, frame: &AlignedFrame) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["date"];
    header.extend(frame.column_ids());
    wtr.write_record(&header)?;

    for (i, date) in frame.dates().iter().enumerate() {
        let mut record = vec![date.to_string()];
        for col in frame.columns() {
            record.push(col.values[i].map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
