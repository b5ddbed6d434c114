//! Input/output helpers.
//!
//! - FRED-style CSV ingest (`ingest`)
//! - aligned-frame CSV export (`export`)
//! - all-or-nothing output writing (`atomic`)

pub mod atomic;
pub mod export;
pub mod ingest;

pub use atomic::write_all_or_nothing;
pub use export::*;
pub use ingest::*;
