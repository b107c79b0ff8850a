use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sprt_core::config::TestConfig;
use sprt_core::scheduler::TrialScheduler;
use sprt_core::simulation::EloSimulator;
use sprt_core::sprt::{SprtMode, SprtParameters};
use sprt_runner::report::write_reports;
use sprt_runner::{init_tracing, print_progress, print_summary};
use tracing::info;

/// Dry run against a synthetic oracle with a known Elo difference.
#[derive(Parser, Debug)]
struct Args {
    /// True Elo difference of the new configuration
    #[arg(short = 'e', long, default_value_t = 60.0)]
    elo: f64,
    #[arg(short = 'd', long, default_value_t = 0.2)]
    draw_rate: f64,
    #[arg(short = 's', long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 0.0001)]
    alpha: f64,
    #[arg(long, default_value_t = 0.0001)]
    beta: f64,
    #[arg(long, default_value_t = 0.0)]
    elo0: f64,
    #[arg(long, default_value_t = 50.0)]
    elo1: f64,
    #[arg(short = 'm', long, default_value_t = SprtMode::Trinomial)]
    mode: SprtMode,

    /// Defaults to the number of CPUs
    #[arg(short = 'j', long)]
    batch_width: Option<usize>,
    #[arg(long)]
    max_trials: Option<u64>,

    /// Write CSV/JSON reports here
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(false);

    let seed = args.seed.unwrap_or_else(rand::random);
    let batch_width = args
        .batch_width
        .unwrap_or_else(|| std::cmp::max(1, num_cpus::get()));

    let config = TestConfig {
        sprt: SprtParameters::new(args.elo0, args.elo1, args.alpha, args.beta).with_mode(args.mode),
        ..TestConfig::default()
    }
    .with_batch_width(batch_width)
    .with_max_trials(args.max_trials);

    info!(elo = args.elo, draw_rate = args.draw_rate, seed, "simulating");

    let oracle = Arc::new(EloSimulator::new(args.elo, args.draw_rate, seed));
    let quiet = args.quiet;
    let report = TrialScheduler::new(config, oracle)?.run_with_progress(|progress| {
        if !quiet {
            print_progress(progress);
        }
    })?;

    print_summary(&report);

    if let Some(output_dir) = &args.output_dir {
        let (csv_path, json_path) = write_reports(&report, output_dir)?;
        eprintln!("Wrote {} and {}", csv_path.display(), json_path.display());
    }

    Ok(())
}

// cargo run -p sprt_runner --bin simulate -r -- -e 60 -q
// cargo run -p sprt_runner --bin simulate -r -- -e 0 -m pentanomial -j 8 -o tmp
