use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sprt::SprtParameters;

pub const DEFAULT_BATCH_WIDTH: usize = 4;
pub const DEFAULT_MAX_RETRIES: usize = 2;

/// Invalid test parameters. Each variant names the offending parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("alpha must be in (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("beta must be in (0, 1), got {0}")]
    InvalidBeta(f64),

    #[error("alpha + beta must be below 1, got alpha = {alpha}, beta = {beta}")]
    ErrorRatesTooLarge { alpha: f64, beta: f64 },

    #[error("{name} must be finite, got {value}")]
    NonFiniteElo { name: &'static str, value: f64 },

    #[error("elo0 ({elo0}) must not be greater than elo1 ({elo1})")]
    InvertedElo { elo0: f64, elo1: f64 },

    #[error("batch_width must be at least 1")]
    ZeroBatchWidth,
}

/// Everything fixed at the start of a test run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    #[serde(flatten)]
    pub sprt: SprtParameters,
    /// Number of paired trials dispatched together, also the worker count.
    pub batch_width: usize,
    /// Extra attempts for a single failed measurement before the run aborts.
    pub max_retries: usize,
    /// Optional cap on recorded trials. `None` runs until a decision.
    pub max_trials: Option<u64>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            sprt: SprtParameters::default(),
            batch_width: DEFAULT_BATCH_WIDTH,
            max_retries: DEFAULT_MAX_RETRIES,
            max_trials: None,
        }
    }
}

impl TestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sprt.validate()?;
        if self.batch_width == 0 {
            return Err(ConfigError::ZeroBatchWidth);
        }
        Ok(())
    }

    pub fn with_batch_width(mut self, batch_width: usize) -> Self {
        self.batch_width = batch_width;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_trials(mut self, max_trials: Option<u64>) -> Self {
        self.max_trials = max_trials;
        self
    }
}
