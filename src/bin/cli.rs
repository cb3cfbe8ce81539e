//! crashmatch CLI - Batch driver for crash-trip linkage
//!
//! Usage:
//!   crashmatch-cli link <crashes> <trips>... [--output <dir>] [--year <year>]
//!   crashmatch-cli pipeline <crashes> <trips> [--output <dir>]
//!   crashmatch-cli report [--output <dir>]
//!   crashmatch-cli generate [--preset <name>] [--output <dir>]  (synthetic feature)
//!
//! `link` is the resumable batch mode: it walks trip files one at a time,
//! appends matches and scores as it goes, and checkpoints each completed
//! file so an interrupted run restarts where it stopped. `pipeline` runs
//! every stage over a single pair of input tables and prints a summary.

use clap::{Parser, Subcommand};
use log::warn;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crashmatch::{tables, Checkpoint, LinkageEngine, MatchConfig, Result, SummaryReport};

const MATCHES_FILE: &str = "matches.csv";
const SCORED_FILE: &str = "scored.csv";
const TEMPORAL_FILE: &str = "temporal.csv";
const CLASSIFICATIONS_FILE: &str = "classifications.csv";
const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Parser)]
#[command(name = "crashmatch-cli")]
#[command(about = "Batch linkage of vehicle GPS trips to crash locations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Match and score trip files against a crash table, resumably
    Link {
        /// Crash table (CSV)
        crashes: PathBuf,

        /// Trip table files (CSV), processed one at a time
        #[arg(required = true)]
        trips: Vec<PathBuf>,

        /// Output directory for result tables and the checkpoint
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Keep only crashes from this year
        #[arg(long)]
        year: Option<i32>,

        /// Buffer radius in meters around each crash
        #[arg(long)]
        buffer: Option<f64>,

        /// Discard the checkpoint and existing outputs, start over
        #[arg(long)]
        fresh: bool,
    },

    /// Run every pipeline stage over one pair of input tables
    Pipeline {
        /// Crash table (CSV)
        crashes: PathBuf,

        /// Trip table (CSV)
        trips: PathBuf,

        /// Output directory for the four result tables
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Keep only crashes from this year
        #[arg(long)]
        year: Option<i32>,

        /// Buffer radius in meters around each crash
        #[arg(long)]
        buffer: Option<f64>,
    },

    /// Summarize previously written result tables
    Report {
        /// Directory holding temporal.csv and classifications.csv
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Generate seeded synthetic input tables
    #[cfg(feature = "synthetic")]
    Generate {
        /// Scenario preset: standard, partial, dense
        #[arg(long, default_value = "standard")]
        preset: String,

        /// Output directory for crashes.csv and trips.csv
        #[arg(short, long, default_value = "synthetic")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; --verbose lifts the default filter to debug
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = match cli.command {
        Commands::Link {
            crashes,
            trips,
            output,
            year,
            buffer,
            fresh,
        } => run_link(&crashes, &trips, &output, year, buffer, fresh, cli.verbose),
        Commands::Pipeline {
            crashes,
            trips,
            output,
            year,
            buffer,
        } => run_pipeline(&crashes, &trips, &output, year, buffer, cli.verbose),
        Commands::Report { output } => run_report(&output),
        #[cfg(feature = "synthetic")]
        Commands::Generate { preset, output } => run_generate(&preset, &output),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// Load the crash table and build an engine over it.
fn build_engine(
    crashes: &Path,
    year: Option<i32>,
    buffer: Option<f64>,
    verbose: bool,
) -> Result<LinkageEngine> {
    println!("\n[Step 1] Loading crash table: {}", crashes.display());
    let records = tables::read_crashes(crashes, year)?;
    match year {
        Some(year) => println!(
            "  [OK] {} crash(es) after filtering to {}",
            records.len(),
            year
        ),
        None => println!("  [OK] {} crash(es)", records.len()),
    }

    let mut config = MatchConfig::default();
    if let Some(buffer) = buffer {
        config.buffer_radius = buffer;
    }

    if verbose {
        println!("\n[Config]");
        println!("  buffer_radius: {}m", config.buffer_radius);
        println!("  max_candidates: {}", config.max_candidates);
        println!("  min_trip_points: {}", config.min_trip_points);
    }

    let engine = LinkageEngine::new(records, config)?;
    let stats = engine.stats();
    println!(
        "  Indexed {} crash(es), {} dated",
        stats.indexed_count, stats.dated_crash_count
    );
    Ok(engine)
}

/// Resumable match+score over a list of trip files.
fn run_link(
    crashes: &Path,
    trips: &[PathBuf],
    output: &Path,
    year: Option<i32>,
    buffer: Option<f64>,
    fresh: bool,
    verbose: bool,
) -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("CRASH LINKAGE");
    println!("{}", "=".repeat(60));

    fs::create_dir_all(output)?;
    let matches_path = output.join(MATCHES_FILE);
    let scored_path = output.join(SCORED_FILE);
    let checkpoint_path = output.join(CHECKPOINT_FILE);

    if fresh {
        for path in [&matches_path, &scored_path, &checkpoint_path] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
    }

    let engine = build_engine(crashes, year, buffer, verbose)?;

    // A corrupt checkpoint is not worth aborting a batch over
    let mut checkpoint = match Checkpoint::load(&checkpoint_path) {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            warn!("checkpoint unreadable ({}), starting fresh", err);
            Checkpoint::new()
        }
    };
    if !checkpoint.is_empty() {
        println!("\n[Resume] {} file(s) already completed", checkpoint.len());
    }

    println!("\n[Step 2] Matching {} trip file(s)...", trips.len());
    let mut total_trips = 0usize;
    let mut total_matches = 0usize;
    let mut total_skipped = 0usize;
    let mut failed_files = 0usize;

    for (i, trip_path) in trips.iter().enumerate() {
        let id = trip_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown")
            .to_string();

        println!("\n  [{}/{}] {}", i + 1, trips.len(), id);
        if checkpoint.is_done(&id) {
            println!("    [SKIP] checkpointed");
            continue;
        }

        // An unreadable file is reported and retried on the next run
        let batch = match tables::read_trips(trip_path) {
            Ok(batch) => batch,
            Err(err) => {
                eprintln!("    [ERR] {}", err);
                failed_files += 1;
                continue;
            }
        };

        let (matches, skipped) = engine.match_trips(&batch);
        let scored = engine.score(&matches)?;

        let store = engine.crashes();
        tables::append_rows(&matches_path, &tables::match_rows(&matches, store))?;
        tables::append_rows(&scored_path, &tables::scored_rows(&scored, store))?;

        checkpoint.mark_done(&id);
        checkpoint.save(&checkpoint_path)?;

        println!(
            "    [OK] {} trip(s), {} match(es), {} skipped",
            batch.len(),
            matches.len(),
            skipped
        );
        total_trips += batch.len();
        total_matches += matches.len();
        total_skipped += skipped;
    }

    println!("\n{}", "-".repeat(60));
    println!("RESULTS");
    println!("{}", "-".repeat(60));
    println!("  Trip files: {} ({} failed)", trips.len(), failed_files);
    println!(
        "  Trips matched: {} ({} skipped)",
        total_trips - total_skipped,
        total_skipped
    );
    println!("  Matches written: {}", total_matches);
    println!("  Output: {}", matches_path.display());
    println!("          {}", scored_path.display());
    Ok(())
}

/// Every stage over one pair of input tables, plus a summary.
fn run_pipeline(
    crashes: &Path,
    trips: &Path,
    output: &Path,
    year: Option<i32>,
    buffer: Option<f64>,
    verbose: bool,
) -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("LINKAGE PIPELINE");
    println!("{}", "=".repeat(60));

    let engine = build_engine(crashes, year, buffer, verbose)?;

    println!("\n[Step 2] Loading trip table: {}", trips.display());
    let batch = tables::read_trips(trips)?;
    println!("  [OK] {} trip(s)", batch.len());

    println!("\n[Step 3] Running pipeline stages...");
    let result = engine.process_trips(&batch)?;
    println!("  Matches: {}", result.matches.len());
    println!("  Scored: {}", result.scored.len());
    println!("  Temporally validated: {}", result.temporal.len());
    println!("  Classified: {}", result.classifications.len());

    println!("\n[Step 4] Writing result tables to: {}", output.display());
    fs::create_dir_all(output)?;
    let store = engine.crashes();
    tables::write_rows(
        &output.join(MATCHES_FILE),
        &tables::match_rows(&result.matches, store),
    )?;
    tables::write_rows(
        &output.join(SCORED_FILE),
        &tables::scored_rows(&result.scored, store),
    )?;
    tables::write_rows(
        &output.join(TEMPORAL_FILE),
        &tables::temporal_rows(&result.temporal, store),
    )?;
    tables::write_rows(
        &output.join(CLASSIFICATIONS_FILE),
        &tables::classification_rows(&result.classifications),
    )?;
    println!("  [OK] 4 table(s) written");

    println!("\n{}", SummaryReport::from_result(&result, store));
    Ok(())
}

/// Summarize previously written temporal and classification tables.
fn run_report(output: &Path) -> Result<()> {
    let temporal: Vec<tables::TemporalRow> = tables::read_rows(&output.join(TEMPORAL_FILE))?;
    let classifications: Vec<tables::ClassificationRow> =
        tables::read_rows(&output.join(CLASSIFICATIONS_FILE))?;

    println!("{}", SummaryReport::from_tables(&temporal, &classifications));
    Ok(())
}

/// Write seeded synthetic input tables for a scenario preset.
#[cfg(feature = "synthetic")]
fn run_generate(preset: &str, output: &Path) -> Result<()> {
    use crashmatch::synthetic::SyntheticScenario;

    let scenario = match preset {
        "standard" => SyntheticScenario::standard_linkage(),
        "partial" => SyntheticScenario::partially_dated(),
        "dense" => SyntheticScenario::dense_urban(),
        other => {
            eprintln!(
                "Unknown preset '{}' (expected standard, partial, dense)",
                other
            );
            std::process::exit(2);
        }
    };

    println!("\n{}", "=".repeat(60));
    println!("SYNTHETIC DATA");
    println!("{}", "=".repeat(60));

    let dataset = scenario.generate();
    println!("  Crashes: {}", dataset.metadata.crash_count);
    println!("  Trips: {}", dataset.metadata.trip_count);
    println!("  Points: {}", dataset.metadata.total_points);
    println!("  Expected matches: {}", dataset.expected.len());

    fs::create_dir_all(output)?;
    let crash_path = output.join("crashes.csv");
    let trip_path = output.join("trips.csv");
    dataset.write_input_tables(&crash_path, &trip_path)?;
    println!("  Written: {}", crash_path.display());
    println!("  Written: {}", trip_path.display());
    Ok(())
}
