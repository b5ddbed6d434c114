//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and initialises logging
//! - loads the TOML configuration and applies CLI overrides
//! - picks the series source (FRED API, FRED CSV export, or a local directory)
//! - runs the pipeline and prints terminal summaries

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Command, ConfigArgs, FrameArgs, RunArgs};
use crate::config::{ReportConfig, SourceKind};
use crate::data::{FredApiClient, FredGraphClient, LocalCsvSource, SeriesCache, SeriesSource};
use crate::error::{AppError, PipelineError};

pub mod pipeline;

/// Entry point for the `fmr` binary.
pub fn run() -> Result<(), AppError> {
    // We want `fmr` and `fmr -c report.toml` to behave like `fmr run ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    init_logging(cli.verbose, cli.quiet);
    // A missing .env is fine; the key may come from the real environment.
    dotenvy::dotenv().ok();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Fetch(args) => handle_fetch(args),
        Command::Frame(args) => handle_frame(args),
        Command::CacheClear(args) => handle_cache_clear(args),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    let env = env_logger::Env::default().default_filter_or(level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = load_config(&args)?;
    let source = build_source(&config)?;
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let output = pipeline::execute_report(&config, source.as_ref(), Some(generated_at))?;

    println!(
        "{}",
        crate::report::format_run_summary(&output.snapshot, &output.meta, Some(&config.output.path))
    );
    Ok(())
}

fn handle_fetch(args: RunArgs) -> Result<(), AppError> {
    let config = load_config(&args)?;
    let source = build_source(&config)?;

    let acquisition = pipeline::run_fetch(&config, source.as_ref())?;
    println!("{}", crate::report::format_fetch_summary(&acquisition, &config.groups()));
    Ok(())
}

fn handle_frame(args: FrameArgs) -> Result<(), AppError> {
    let config = load_config(&args.run)?;
    let out = args
        .out
        .clone()
        .or_else(|| config.output.frame_csv.clone())
        .ok_or_else(|| AppError::new(2, "No frame CSV path: pass --out or set output.frame_csv."))?;
    let source = build_source(&config)?;

    let built = pipeline::run_frame(&config, source.as_ref())?;
    crate::io::export::write_frame_csv(&out, &built.frame)?;

    for w in &built.warnings {
        println!("warning: {}: {}", w.subject, w.message);
    }
    println!(
        "Wrote {} ({} dates x {} columns)",
        out.display(),
        built.frame.len(),
        built.frame.columns().len()
    );
    Ok(())
}

fn handle_cache_clear(args: ConfigArgs) -> Result<(), AppError> {
    let config = ReportConfig::load(&args.config)?;
    let Some(dir) = &config.fetch.cache_dir else {
        println!("No cache_dir configured; nothing to clear.");
        return Ok(());
    };
    let cache = SeriesCache::new(dir);
    let removed = cache.clear()?;
    println!("Removed {removed} cached series from {}", cache.dir().display());
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<ReportConfig, PipelineError> {
    let mut config = ReportConfig::load(&args.config.config)?;
    config.apply(&args.overrides());
    info!("loaded {}", args.config.config.display());
    Ok(config)
}

/// Resolve `fetch.source` into a concrete source.
pub fn build_source(config: &ReportConfig) -> Result<Box<dyn SeriesSource>, PipelineError> {
    let timeout = config.fetch.timeout();
    let kind = match config.fetch.source {
        SourceKind::Auto if FredApiClient::key_available() => SourceKind::Api,
        SourceKind::Auto => SourceKind::Graph,
        other => other,
    };

    let source: Box<dyn SeriesSource> = match kind {
        SourceKind::Api => Box::new(FredApiClient::from_env(timeout)?),
        SourceKind::Graph | SourceKind::Auto => Box::new(FredGraphClient::new(timeout)?),
        SourceKind::Local => {
            let dir = config
                .fetch
                .local_dir
                .as_deref()
                .ok_or_else(|| PipelineError::validation("source = \"local\" requires fetch.local_dir."))?;
            Box::new(LocalCsvSource::new(dir))
        }
    };
    info!("using source {}", source.name());
    Ok(source)
}

/// Rewrite argv so `fmr` defaults to `fmr run`.
///
/// Rules:
/// - `fmr`                      -> `fmr run`
/// - `fmr -c x.toml ...`        -> `fmr run -c x.toml ...`
/// - `fmr --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "fetch" | "frame" | "cache-clear");
    if is_subcommand {
        return argv;
    }

    // Global flags may precede the subcommand; look past them.
    let first_other = argv
        .iter()
        .skip(1)
        .find(|a| !matches!(a.as_str(), "-v" | "--verbose" | "-q" | "--quiet"))
        .cloned();
    match first_other.as_deref() {
        Some("run" | "fetch" | "frame" | "cache-clear") => argv,
        Some(a) if a.starts_with('-') => {
            argv.insert(1, "run".to_string());
            argv
        }
        None => {
            argv.push("run".to_string());
            argv
        }
        // Otherwise, leave as-is and let clap report it.
        Some(_) => argv,
    }
}
