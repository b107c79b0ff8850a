use std::path::PathBuf;
use std::process::Command;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sprt_core::oracle::{MeasureError, Oracle};
use sprt_core::outcome::Variant;
use strum::{Display, EnumString};
use tracing::trace;

/// Matches nextpnr's "Max frequency for clock ...: 48.32 MHz" lines.
pub const DEFAULT_METRIC_PATTERN: &str = r": (\d+\.\d+) MHz";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    #[default]
    Stderr,
}

/// Returns the metric from the last line matching `pattern`. The first capture group is parsed.
pub fn extract_metric(pattern: &Regex, output: &str) -> Option<f64> {
    output
        .lines()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .last()
}

/// Measures a trial by running an external command once per `(variant, index)`.
///
/// `{seed}` and `{index}` in the command are replaced by the trial index, `{variant}` by
/// `base` or `new`.
pub struct CommandOracle {
    base_command: Vec<String>,
    new_command: Vec<String>,
    pattern: Regex,
    stream: OutputStream,
    workdir: Option<PathBuf>,
}

impl CommandOracle {
    pub fn new(
        base_command: &str,
        new_command: &str,
        pattern: Regex,
        stream: OutputStream,
        workdir: Option<PathBuf>,
    ) -> Result<Self, String> {
        let split = |cmd: &str, name: &str| -> Result<Vec<String>, String> {
            let parts: Vec<String> = cmd.split_whitespace().map(str::to_owned).collect();
            if parts.is_empty() {
                Err(format!("{name} command is empty"))
            } else {
                Ok(parts)
            }
        };

        Ok(Self {
            base_command: split(base_command, "base")?,
            new_command: split(new_command, "new")?,
            pattern,
            stream,
            workdir,
        })
    }

    fn command_line(&self, variant: Variant, index: u64) -> Vec<String> {
        let template = match variant {
            Variant::Base => &self.base_command,
            Variant::New => &self.new_command,
        };
        let index = index.to_string();
        let variant: &'static str = variant.into();

        template
            .iter()
            .map(|part| {
                part.replace("{seed}", &index)
                    .replace("{index}", &index)
                    .replace("{variant}", variant)
            })
            .collect()
    }
}

impl Oracle for CommandOracle {
    fn measure(&self, variant: Variant, index: u64) -> Result<f64, MeasureError> {
        let command_line = self.command_line(variant, index);
        let (program, args) = command_line
            .split_first()
            .ok_or_else(|| MeasureError::new("empty command"))?;

        let mut command = Command::new(program);
        command.args(args);
        if let Some(workdir) = &self.workdir {
            command.current_dir(workdir);
        }

        trace!(?command_line, "spawning");
        let output = command
            .output()
            .map_err(|e| MeasureError::new(format!("failed to run {program}: {e}")))?;

        if !output.status.success() {
            return Err(MeasureError::new(format!(
                "{program} exited with {}",
                output.status
            )));
        }

        let text = match self.stream {
            OutputStream::Stdout => String::from_utf8_lossy(&output.stdout),
            OutputStream::Stderr => String::from_utf8_lossy(&output.stderr),
        };

        extract_metric(&self.pattern, &text).ok_or_else(|| {
            MeasureError::new(format!(
                "no line of {} matched /{}/",
                self.stream,
                self.pattern.as_str()
            ))
        })
    }
}
