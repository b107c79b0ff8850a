use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use regex::Regex;
use sprt_core::scheduler::TrialScheduler;
use sprt_core::sprt::SprtMode;
use sprt_runner::command_oracle::{CommandOracle, OutputStream};
use sprt_runner::report::write_reports;
use sprt_runner::settings::RunnerConfig;
use sprt_runner::{RunnerError, init_tracing, print_progress, print_summary};
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// YAML run file. Flags below override its values.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Command measuring the base configuration, e.g. "nextpnr-ice40 --json base.json --seed {seed}"
    #[arg(short = 'b', long)]
    base_cmd: Option<String>,
    /// Command measuring the new configuration
    #[arg(short = 'n', long)]
    new_cmd: Option<String>,

    #[arg(long)]
    alpha: Option<f64>,
    #[arg(long)]
    beta: Option<f64>,
    #[arg(long)]
    elo0: Option<f64>,
    #[arg(long)]
    elo1: Option<f64>,
    #[arg(short = 'm', long)]
    mode: Option<SprtMode>,

    /// Trials per batch, also the number of worker threads
    #[arg(short = 'j', long)]
    batch_width: Option<usize>,
    #[arg(long)]
    max_retries: Option<usize>,
    #[arg(long)]
    max_trials: Option<u64>,

    /// Regex whose first capture group is the metric
    #[arg(short = 'p', long)]
    pattern: Option<String>,
    #[arg(long)]
    stream: Option<OutputStream>,
    #[arg(short = 'w', long)]
    workdir: Option<PathBuf>,
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Don't print a progress line per trial
    #[arg(short = 'q', long)]
    quiet: bool,
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn resolve_config(args: &Args) -> Result<RunnerConfig, RunnerError> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };

    let sprt = &mut config.test.sprt;
    sprt.alpha = args.alpha.unwrap_or(sprt.alpha);
    sprt.beta = args.beta.unwrap_or(sprt.beta);
    sprt.elo0 = args.elo0.unwrap_or(sprt.elo0);
    sprt.elo1 = args.elo1.unwrap_or(sprt.elo1);
    sprt.mode = args.mode.unwrap_or(sprt.mode);

    let test = &mut config.test;
    test.batch_width = args.batch_width.unwrap_or(test.batch_width);
    test.max_retries = args.max_retries.unwrap_or(test.max_retries);
    if args.max_trials.is_some() {
        test.max_trials = args.max_trials;
    }

    if let Some(cmd) = &args.base_cmd {
        config.base_command = Some(cmd.clone());
    }
    if let Some(cmd) = &args.new_cmd {
        config.new_command = Some(cmd.clone());
    }
    if let Some(pattern) = &args.pattern {
        config.metric_pattern = pattern.clone();
    }
    config.metric_stream = args.stream.unwrap_or(config.metric_stream);
    if let Some(workdir) = &args.workdir {
        config.workdir = Some(workdir.clone());
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }

    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = resolve_config(&args)?;
    config.test.validate()?;

    let (base_cmd, new_cmd) = config.commands()?;
    let oracle = CommandOracle::new(
        base_cmd,
        new_cmd,
        Regex::new(&config.metric_pattern).map_err(RunnerError::from)?,
        config.metric_stream,
        config.workdir.clone(),
    )
    .map_err(RunnerError::Oracle)?;

    info!(base = base_cmd, new = new_cmd, "measuring with external commands");

    let scheduler = TrialScheduler::new(config.test.clone(), Arc::new(oracle))?;
    let quiet = args.quiet;
    let report = scheduler.run_with_progress(|progress| {
        if !quiet {
            print_progress(progress);
        }
    })?;

    print_summary(&report);

    let (csv_path, json_path) = write_reports(&report, &config.output_dir)?;
    eprintln!("Wrote {} and {}", csv_path.display(), json_path.display());

    Ok(())
}

// cargo run -p sprt_runner --release -- -b "nextpnr-ice40 --hx8k --package ct256 --json base.json --seed {seed}" -n "nextpnr-ice40 --hx8k --package ct256 --json new.json --seed {seed}" -w /tmp/picosoc
// cargo run -p sprt_runner --release -- -c run.yaml -j 8
