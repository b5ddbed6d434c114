//! `fred-macro-report` library crate.
//!
//! The binary (`fmr`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes or touching the network
//! - sources, the normalizer, metrics and renderers are usable on their own
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod frame;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod report;
