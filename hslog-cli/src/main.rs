//! Hearthstone Log CLI Application
//!
//! This is the command-line interface for the log lifecycle engine.
//! It uses the hslog-engine library and adds:
//! - Configuration files and replacement pattern tables
//! - Parallel replay of several log files
//! - Per-match records (offered heroes, pick, placements, outcome)
//! - Report generation (TXT/JSON)

use anyhow::{Context, Result};
use clap::Parser;
use hslog_engine::{EngineConfig, LifecycleEngine};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

mod config;
mod events;
mod report;
mod state;

use config::{AppConfig, Libraries, OutputFormat};
use report::{FileReport, Report};
use state::SessionTracker;

/// Hearthstone Log Reader - Replay client logs into lifecycle events
#[derive(Parser, Debug)]
#[command(name = "hslog-cli")]
#[command(about = "Replay Hearthstone client logs into lifecycle events", long_about = None)]
#[command(version)]
struct Args {
    /// Path to a log file to replay (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    log: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pattern file replacing the built-in feature tables
    #[arg(short, long, value_name = "FILE")]
    patterns: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Maximum number of lines to read per file (for testing)
    #[arg(long, value_name = "COUNT")]
    max_lines: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Hearthstone Log CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using engine library v{}", hslog_engine::VERSION);

    let config = resolve_config(&args)?;

    if config.input.files.is_empty() {
        println!("Hearthstone Log Reader - No input specified");
        println!("\nQuick Start:");
        println!("  hslog-cli --log Power.log");
        println!("  hslog-cli --log Power.log --format json --output report.json");
        println!("\nWith a configuration file:");
        println!("  hslog-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    let libraries = match &config.patterns.file {
        Some(path) => config::load_patterns(path)?,
        None => Libraries::builtin()?,
    };
    log::info!(
        "Pattern tables: {} app feature(s), {} match feature(s)",
        libraries.app.len(),
        libraries.game.len()
    );

    let reports = config
        .input
        .files
        .par_iter()
        .map(|path| replay_file(path, &config.engine, &libraries, args.max_lines))
        .collect::<Result<Vec<_>>>()?;

    let report = Report::new(reports);
    match &config.output.path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create report file: {:?}", path))?;
            let mut out = BufWriter::new(file);
            write_report(&report, config.output.format, &mut out)?;
            out.flush()?;
            log::info!("Report written to {:?}", path);
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_report(&report, config.output.format, &mut out)?;
        }
    }

    Ok(())
}

/// Merge the configuration file (if any) with command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            let config = config::load_config(path)?;
            log::debug!("Configuration loaded successfully");
            config
        }
        None => AppConfig::default(),
    };

    if !args.log.is_empty() {
        config.input.files = args.log.clone();
    }
    if args.patterns.is_some() {
        config.patterns.file = args.patterns.clone();
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.output.is_some() {
        config.output.path = args.output.clone();
    }

    Ok(config)
}

/// Replay one file through a fresh engine and collect its results
fn replay_file(
    path: &Path,
    engine_config: &EngineConfig,
    libraries: &Libraries,
    max_lines: Option<usize>,
) -> Result<FileReport> {
    log::info!("Replaying log file: {:?}", path);

    let file = File::open(path).with_context(|| format!("Failed to open log file: {:?}", path))?;
    let mut engine = LifecycleEngine::with_libraries(
        engine_config.clone(),
        libraries.app.clone(),
        libraries.game.clone(),
    )
    .context("Failed to build lifecycle engine")?;

    let lines = BufReader::new(file)
        .lines()
        .take(max_lines.unwrap_or(usize::MAX));

    let mut tracker = SessionTracker::new();
    let mut events = Vec::new();
    for event in engine.replay_lines(lines) {
        let event = event.with_context(|| format!("Failed to read log file: {:?}", path))?;
        tracker.observe(&event);
        events.push(event);
    }

    let stats = engine.stats();
    log::info!(
        "{:?}: {} line(s), {} event(s), {} parse failure(s)",
        path,
        stats.lines,
        stats.events(),
        stats.parse_failures
    );

    Ok(FileReport {
        path: path.to_path_buf(),
        stats,
        final_app_state: tracker.app_state(),
        matches: tracker.finish(),
        events,
    })
}

fn write_report<W: Write>(report: &Report, format: OutputFormat, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Txt => report.write_txt(out),
        OutputFormat::Json => report.write_json(out),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
