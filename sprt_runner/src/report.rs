use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;
use sprt_core::outcome::Outcome;
use sprt_core::scheduler::RunReport;

use crate::RunnerError;

/// One row per measured trial. Outcome and LLR are empty for trials measured after the decision.
#[derive(Serialize, Debug, PartialEq)]
pub struct TrialRow {
    pub index: usize,
    pub base: f64,
    pub new: f64,
    pub outcome: Option<Outcome>,
    pub llr: Option<f64>,
}

#[derive(Serialize)]
pub struct RunSummary<'a> {
    pub finished_at: DateTime<Utc>,
    pub accepted: &'static str,
    pub recorded_trials: usize,
    pub measured_trials: usize,
    pub final_llr: f64,
    pub mean_base: Option<f64>,
    pub mean_new: Option<f64>,
    pub report: &'a RunReport,
}

pub fn trial_rows(report: &RunReport) -> Vec<TrialRow> {
    report
        .base_results
        .iter()
        .zip(&report.new_results)
        .enumerate()
        .map(|(index, (&base, &new))| TrialRow {
            index,
            base,
            new,
            outcome: report.outcomes.get(index).copied(),
            llr: report.llr.get(index).copied(),
        })
        .collect()
}

pub fn write_trials_csv(report: &RunReport, path: &Path) -> Result<(), RunnerError> {
    let mut wtr = Writer::from_path(path)?;
    for row in trial_rows(report) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_summary_json(
    report: &RunReport,
    finished_at: DateTime<Utc>,
    path: &Path,
) -> Result<(), RunnerError> {
    let summary = RunSummary {
        finished_at,
        accepted: report.status.as_str(),
        recorded_trials: report.recorded_trials(),
        measured_trials: report.base_results.len(),
        final_llr: report.final_llr(),
        mean_base: report.mean_base(),
        mean_new: report.mean_new(),
        report,
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &summary)?;
    Ok(())
}

/// Writes `sprt-<timestamp>.csv` and `sprt-<timestamp>.json` into `output_dir`.
pub fn write_reports(
    report: &RunReport,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf), RunnerError> {
    std::fs::create_dir_all(output_dir)?;

    let now = Utc::now();
    let stem = format!("sprt-{}", now.format("%Y-%m-%d_%H-%M-%S"));
    let csv_path = output_dir.join(format!("{stem}.csv"));
    let json_path = output_dir.join(format!("{stem}.json"));

    write_trials_csv(report, &csv_path)?;
    write_summary_json(report, now, &json_path)?;

    Ok((csv_path, json_path))
}
