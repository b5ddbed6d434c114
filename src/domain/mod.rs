//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observation frequencies and period labelling (`Frequency`)
//! - fetched series (`Series`, `Observation`)
//! - run-level enums (`FillPolicy`, `OutputFormat`) and `DateRange`
//! - reference recession intervals (`RecessionWindow`)

pub mod types;

pub use types::*;
