//! pdswave command-line interface.
//!
//! Reads one run of DAPHNE waveform records, fills per-channel charge and
//! persistence histograms and writes the result file, a JSON summary and
//! the per-side PNG grids.

mod render;

use clap::Parser;
use pdswave_analysis::accumulate;
use pdswave_core::AnalysisConfig;
use pdswave_io::{
    load_channel_map, open_source, results_path, summary_path, write_results_hdf5, RecordBatches,
    RecordSource, RunSummary,
};
use render::{RenderError, RunPlots};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    PdswaveIo(#[from] pdswave_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] pdswave_core::Error),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{} holds no waveform records", .0.display())]
    EmptyInput(PathBuf),
}

/// Charge and persistence histograms for DAPHNE photon detector waveforms.
#[derive(Parser)]
#[command(name = "pdswave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Waveform input: HDF5 table (.h5) or raw channel dump (.dat)
    input: PathBuf,

    /// Run number, used in output file names
    run: u32,

    /// JSON analysis configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Channel map text file (slot link channel offline-channel per row)
    #[arg(long, default_value = "functions/APAchannelmap.txt")]
    channel_map: PathBuf,

    /// Directory for the result file, summary and images
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Offline channel of a .dat dump (default: parsed from `_ch<N>` in the name)
    #[arg(long)]
    channel: Option<i32>,

    /// Worker threads (default: one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Skip PNG export
    #[arg(long)]
    no_plots: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    log::debug!("Configuration: {}", serde_json::to_string(&config)?);

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    // Nothing is written until the input is known to hold records.
    let source = open_source(&cli.input, cli.channel)?;
    if source.is_empty() {
        return Err(CliError::EmptyInput(cli.input.clone()));
    }
    log::info!("{}: {} records", cli.input.display(), source.len());

    let channel_map = load_channel_map(&cli.channel_map);

    let start = Instant::now();
    let acc = accumulate(
        RecordBatches::new(&*source, config.batch_size),
        &config,
    )?;
    let elapsed = start.elapsed();
    let (histograms, stats) = acc.into_parts();
    if stats.records_processed == 0 {
        log::warn!("No record had a valid channel; histograms are empty");
    }

    fs::create_dir_all(&cli.output_dir)?;

    let results = results_path(&cli.output_dir, cli.run);
    let datasets = write_results_hdf5(&results, cli.run, &histograms, &channel_map)?;
    log::info!("Wrote {datasets} histograms to {}", results.display());

    let summary = RunSummary::new(cli.run, &cli.input, &histograms, &stats, &channel_map);
    let summary_file = summary_path(&cli.output_dir, cli.run);
    summary.write_json(&summary_file)?;
    log::info!("Wrote {}", summary_file.display());

    if !cli.no_plots {
        let plots = RunPlots {
            run: cli.run,
            layout: &config.layout,
            plot: &config.plot,
            histograms: &histograms,
            channel_map: &channel_map,
        };
        plots.render_all(&cli.output_dir)?;
    }

    println!(
        "Run {}: {} records processed, {} skipped in {:.2}s",
        cli.run,
        stats.records_processed,
        stats.records_skipped,
        elapsed.as_secs_f64()
    );
    println!("Channels with data: {}", summary.channels.len());
    Ok(())
}
