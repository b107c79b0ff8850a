use colored::Colorize;
use sprt_core::outcome::Outcome;
use sprt_core::scheduler::{Progress, RunReport, SchedulerError};
use sprt_core::sprt::SprtStatus;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod command_oracle;
pub mod report;
pub mod settings;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("invalid metric pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{0}")]
    Oracle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the `llr,LA,LB,outcome` progress line with the outcome coloured.
pub fn print_progress(progress: &Progress) {
    let label = progress.outcome.to_string();
    let label = match progress.outcome {
        Outcome::Win => label.green(),
        Outcome::Draw => label.yellow(),
        Outcome::Loss => label.red(),
    };
    println!(
        "{},{},{},{}",
        progress.llr, progress.bounds.lower, progress.bounds.upper, label
    );
}

pub fn print_summary(report: &RunReport) {
    let verdict = match report.status {
        SprtStatus::AcceptH1 => format!("{} was accepted", report.status).green().bold(),
        SprtStatus::AcceptH0 => format!("{} was accepted", report.status).red().bold(),
        SprtStatus::Continue => "No hypothesis was accepted".yellow().bold(),
    };
    println!("{verdict}");

    let [losses, draws, wins] = report.counts;
    println!(
        "Trials: {} (W: {}, L: {}, D: {}), measured: {}, batches: {}, final LLR: {:.3} [{:.3}, {:.3}]",
        report.recorded_trials(),
        wins,
        losses,
        draws,
        report.base_results.len(),
        report.batches,
        report.final_llr(),
        report.bounds.lower,
        report.bounds.upper,
    );
    if let (Some(base), Some(new)) = (report.mean_base(), report.mean_new()) {
        println!("Mean metric. Base: {base:.3}. New: {new:.3}");
    }
}
