//! Command-line parsing for the FRED macro report pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline itself: every subcommand resolves to a `ReportConfig` plus
//! `Overrides` before anything runs.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::{Overrides, SourceKind};
use crate::domain::{FillPolicy, Frequency, OutputFormat};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fmr", version, about = "FRED macro report: fetch, align, derive, render")]
pub struct Cli {
    /// More log output (debug level).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline and write the report.
    Run(RunArgs),
    /// Acquire every configured series (warming the cache) and print a summary.
    Fetch(RunArgs),
    /// Acquire, align and compute metrics, then export the frame as CSV.
    Frame(FrameArgs),
    /// Delete every cached series.
    CacheClear(ConfigArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Run configuration (TOML).
    #[arg(short, long, value_name = "TOML", default_value = "report.toml")]
    pub config: PathBuf,
}

/// Config path plus run-level overrides.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// First date to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Last date to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// Canonical frequency of the aligned frame.
    #[arg(long, value_enum)]
    pub frequency: Option<Frequency>,

    /// Gap handling on the aligned frame.
    #[arg(long, value_enum)]
    pub fill: Option<FillPolicy>,

    /// Report format.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Report output path.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Series source.
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Bypass the on-disk cache for this run.
    #[arg(long)]
    pub no_cache: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            start: self.start,
            end: self.end,
            frequency: self.frequency,
            fill: self.fill,
            format: self.format,
            output: self.output.clone(),
            source: self.source,
            no_cache: self.no_cache,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FrameArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Where to write the frame CSV (defaults to `output.frame_csv`).
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
