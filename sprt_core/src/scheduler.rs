use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, TestConfig};
use crate::oracle::{MeasureError, Oracle};
use crate::outcome::{Outcome, Variant};
use crate::sprt::{Bounds, SprtCalculator, SprtParameters, SprtStatus};
use crate::worker_pool::WorkerPool;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("measuring {variant} at trial index {index} failed after {attempts} attempt(s): {reason}")]
    TrialFailed {
        variant: Variant,
        index: u64,
        attempts: usize,
        reason: MeasureError,
    },

    #[error("worker pool shut down unexpectedly")]
    WorkerPoolClosed,
}

/// Emitted after every recorded outcome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub index: u64,
    pub llr: f64,
    pub bounds: Bounds,
    pub outcome: Outcome,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.llr, self.bounds.lower, self.bounds.upper, self.outcome
        )
    }
}

/// Everything a finished run produced, handed over for reporting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub status: SprtStatus,
    pub params: SprtParameters,
    pub bounds: Bounds,
    /// Loss/Draw/Win counts fed to the tester
    pub counts: [u64; 3],
    /// LLR after each recorded outcome
    pub llr: Vec<f64>,
    pub outcomes: Vec<Outcome>,
    /// Every base measurement taken, including the tail of the last batch
    pub base_results: Vec<f64>,
    /// Every new measurement taken, including the tail of the last batch
    pub new_results: Vec<f64>,
    pub batches: u64,
    /// Set when the run ended on `max_trials` rather than on a decision
    pub stopped_by_limit: bool,
}

impl RunReport {
    pub fn recorded_trials(&self) -> usize {
        self.llr.len()
    }

    pub fn final_llr(&self) -> f64 {
        self.llr.last().copied().unwrap_or(0.0)
    }

    pub fn mean_base(&self) -> Option<f64> {
        mean(&self.base_results)
    }

    pub fn mean_new(&self) -> Option<f64> {
        mean(&self.new_results)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Runs paired trials in batches and feeds their outcomes to an SPRT until it concludes.
pub struct TrialScheduler {
    config: TestConfig,
    pool: WorkerPool,
    sprt: SprtCalculator,
    next_index: u64,
    batches: u64,
    llr: Vec<f64>,
    outcomes: Vec<Outcome>,
    base_results: Vec<f64>,
    new_results: Vec<f64>,
}

impl TrialScheduler {
    pub fn new<O: Oracle + 'static>(
        config: TestConfig,
        oracle: Arc<O>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let sprt = SprtCalculator::new(config.sprt)?;
        let pool = WorkerPool::new(oracle, config.batch_width);

        Ok(Self {
            config,
            pool,
            sprt,
            next_index: 0,
            batches: 0,
            llr: Vec::new(),
            outcomes: Vec::new(),
            base_results: Vec::new(),
            new_results: Vec::new(),
        })
    }

    pub fn sprt(&self) -> &SprtCalculator {
        &self.sprt
    }

    pub fn status(&self) -> SprtStatus {
        self.sprt.status()
    }

    pub fn run(self) -> Result<RunReport, SchedulerError> {
        self.run_with_progress(|_| {})
    }

    /// Runs batches until the test concludes (or `max_trials` is hit).
    pub fn run_with_progress<F: FnMut(&Progress)>(
        mut self,
        mut on_progress: F,
    ) -> Result<RunReport, SchedulerError> {
        let bounds = self.sprt.bounds();
        info!(
            lower = bounds.lower,
            upper = bounds.upper,
            batch_width = self.config.batch_width,
            mode = %self.config.sprt.mode,
            "starting sequential test"
        );

        let mut stopped_by_limit = false;
        while !self.sprt.has_conclusion() {
            if !self.run_batch(&mut on_progress)? {
                stopped_by_limit = true;
                break;
            }
        }

        if stopped_by_limit {
            info!(
                trials = self.llr.len(),
                llr = self.sprt.llr(),
                "trial limit reached without a decision"
            );
        } else {
            info!(status = self.sprt.status().as_str(), "{}", self.sprt);
        }

        Ok(self.into_report(stopped_by_limit))
    }

    /// Measures and records one batch without a progress callback.
    pub fn run_next_batch(&mut self) -> Result<bool, SchedulerError> {
        self.run_batch(&mut |_: &Progress| {})
    }

    /// Measures and records one batch. Returns false if the test has already concluded or the
    /// trial limit left nothing to run.
    fn run_batch<F: FnMut(&Progress)>(
        &mut self,
        on_progress: &mut F,
    ) -> Result<bool, SchedulerError> {
        if self.sprt.has_conclusion() {
            return Ok(false);
        }

        let width = match self.config.max_trials {
            Some(max) => max
                .saturating_sub(self.llr.len() as u64)
                .min(self.config.batch_width as u64),
            None => self.config.batch_width as u64,
        };
        if width == 0 {
            return Ok(false);
        }

        let start = self.next_index;
        let indices: Vec<u64> = (start..start + width).collect();

        let base = self.measure_batch(Variant::Base, &indices)?;
        let new = self.measure_batch(Variant::New, &indices)?;

        self.next_index += width;
        self.batches += 1;
        self.base_results.extend_from_slice(&base);
        self.new_results.extend_from_slice(&new);

        for (i, &index) in indices.iter().enumerate() {
            let outcome = Outcome::classify(base[i], new[i]);
            let status = self.sprt.record(outcome);
            let progress = Progress {
                index,
                llr: self.sprt.llr(),
                bounds: self.sprt.bounds(),
                outcome,
            };
            debug!(
                index,
                base = base[i],
                new = new[i],
                %outcome,
                llr = progress.llr,
                "recorded trial"
            );

            self.llr.push(progress.llr);
            self.outcomes.push(outcome);
            on_progress(&progress);

            if status.is_terminal() {
                break;
            }
        }

        info!(
            batch = self.batches,
            first_index = start,
            llr = self.sprt.llr(),
            "{}",
            self.sprt.stats_string()
        );

        Ok(true)
    }

    /// Measures one side of a batch, retrying failed indices individually.
    fn measure_batch(
        &self,
        variant: Variant,
        indices: &[u64],
    ) -> Result<Vec<f64>, SchedulerError> {
        let mut results = self.pool.run_batch(variant, indices)?;

        for attempt in 1..=self.config.max_retries {
            let failed: Vec<usize> = results
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_err())
                .map(|(slot, _)| slot)
                .collect();
            if failed.is_empty() {
                break;
            }

            let retry_indices: Vec<u64> = failed.iter().map(|&slot| indices[slot]).collect();
            warn!(%variant, ?retry_indices, attempt, "retrying failed measurements");

            let retried = self.pool.run_batch(variant, &retry_indices)?;
            for (slot, result) in failed.into_iter().zip(retried) {
                results[slot] = result;
            }
        }

        results
            .into_iter()
            .zip(indices)
            .map(|(result, &index)| {
                result.map_err(|reason| SchedulerError::TrialFailed {
                    variant,
                    index,
                    attempts: self.config.max_retries + 1,
                    reason,
                })
            })
            .collect()
    }

    fn into_report(self, stopped_by_limit: bool) -> RunReport {
        RunReport {
            status: self.sprt.status(),
            params: *self.sprt.params(),
            bounds: self.sprt.bounds(),
            counts: self.sprt.counts(),
            llr: self.llr,
            outcomes: self.outcomes,
            base_results: self.base_results,
            new_results: self.new_results,
            batches: self.batches,
            stopped_by_limit,
        }
    }
}
