use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sprt_core::config::TestConfig;

use crate::RunnerError;
use crate::command_oracle::{DEFAULT_METRIC_PATTERN, OutputStream};

const DEFAULT_OUTPUT_DIR: &str = "tmp";

/// Contents of the YAML run file. Every field is optional.
///
/// ```yaml
/// alpha: 0.0001
/// beta: 0.0001
/// elo0: 0
/// elo1: 50
/// mode: trinomial
/// batch_width: 4
/// base_command: nextpnr-ice40 --hx8k --package ct256 --json base.json --seed {seed}
/// new_command: nextpnr-ice40 --hx8k --package ct256 --json new.json --seed {seed}
/// workdir: /tmp/yosys-bench/verilog/benchmarks_large/picosoc
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    #[serde(flatten)]
    pub test: TestConfig,
    pub base_command: Option<String>,
    pub new_command: Option<String>,
    pub metric_pattern: String,
    pub metric_stream: OutputStream,
    pub workdir: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test: TestConfig::default(),
            base_command: None,
            new_command: None,
            metric_pattern: DEFAULT_METRIC_PATTERN.to_owned(),
            metric_stream: OutputStream::default(),
            workdir: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl RunnerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RunnerError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn commands(&self) -> Result<(&str, &str), RunnerError> {
        let base = self
            .base_command
            .as_deref()
            .ok_or(RunnerError::MissingSetting("base_command"))?;
        let new = self
            .new_command
            .as_deref()
            .ok_or(RunnerError::MissingSetting("new_command"))?;
        Ok((base, new))
    }
}
