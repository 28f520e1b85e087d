//! Per-trial invocation of the external converter.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::ConverterConfig;
use crate::core::trials::Trial;

/// Errors that can occur while converting a single trial.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter exited with {status} for {path}")]
    ConverterFailed {
        path: PathBuf,
        status: String,
        stderr: String,
    },
}

/// How the external converter is launched.
#[derive(Debug, Clone)]
pub struct ConverterCommand {
    program: String,
    args: Vec<String>,
    output_dir_flag: String,
}

impl ConverterCommand {
    /// Create a converter command with the default `--output-dir` flag.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir_flag: "--output-dir".to_string(),
        }
    }

    /// Executable name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build `<program> [args...] <csv_file> <flag> <out_dir>`.
    pub fn command_for(&self, csv_file: &Path, out_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(csv_file)
            .arg(&self.output_dir_flag)
            .arg(out_dir);
        cmd
    }
}

impl From<&ConverterConfig> for ConverterCommand {
    fn from(config: &ConverterConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            output_dir_flag: config.output_dir_flag.clone(),
        }
    }
}

/// Outcome of dispatching a batch of trials.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Output directories of trials the converter handled successfully.
    pub converted: Vec<PathBuf>,
    /// Trials that failed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl DispatchReport {
    /// Total number of trials attempted.
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }
}

/// Run the converter for one trial and wait for it to finish.
///
/// Creates `<output_root>/<base>_output` first. Returns the output directory
/// on success.
pub fn run_converter(
    trial: &Trial,
    output_root: &Path,
    converter: &ConverterCommand,
) -> Result<PathBuf, DispatchError> {
    let out_dir = trial.output_dir(output_root);
    fs::create_dir_all(&out_dir).map_err(|e| DispatchError::CreateDirectory {
        path: out_dir.clone(),
        source: e,
    })?;

    debug!(
        "Running {} on {} -> {}",
        converter.program(),
        trial.path.display(),
        out_dir.display()
    );

    let Output {
        status,
        stdout,
        stderr,
    } = converter
        .command_for(&trial.path, &out_dir)
        .output()
        .map_err(|e| DispatchError::Spawn {
            program: converter.program().to_string(),
            source: e,
        })?;

    let stdout = String::from_utf8_lossy(&stdout);
    for line in stdout.lines() {
        debug!("[{}] {}", trial.base, line);
    }

    if !status.success() {
        return Err(DispatchError::ConverterFailed {
            path: trial.path.clone(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(out_dir)
}

/// Convert every trial in order, continuing past failures.
///
/// Each failure is logged and recorded in the report; nothing is retried
/// and partial converter output is left in place.
pub fn dispatch_all(
    trials: &[Trial],
    output_root: &Path,
    converter: &ConverterCommand,
    progress: &ProgressBar,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    if trials.is_empty() {
        info!("No CSV files to process");
        return report;
    }

    for trial in trials {
        progress.set_message(trial.base.clone());

        match run_converter(trial, output_root, converter) {
            Ok(out_dir) => {
                progress.suspend(|| {
                    println!(
                        "Processed {} -> {}",
                        trial.path.display(),
                        out_dir.display()
                    )
                });
                report.converted.push(out_dir);
            }
            Err(e) => {
                error!("Error processing {}: {}", trial.path.display(), e);
                if let DispatchError::ConverterFailed { stderr, .. } = &e {
                    if !stderr.is_empty() {
                        warn!("[{}] {}", trial.base, stderr);
                    }
                }
                report.failed.push((trial.path.clone(), e.to_string()));
            }
        }

        progress.inc(1);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_command_for_argument_order() {
        let converter = ConverterCommand::new("python3", vec!["convert.py".to_string()]);
        let cmd = converter.command_for(Path::new("data/a.csv"), Path::new("out/a_output"));

        assert_eq!(cmd.get_program(), "python3");
        let args: Vec<&std::ffi::OsStr> = cmd.get_args().collect();
        assert_eq!(
            args,
            vec!["convert.py", "data/a.csv", "--output-dir", "out/a_output"]
        );
    }

    #[test]
    fn test_from_config() {
        let config = ConverterConfig {
            program: "tool".to_string(),
            args: vec![],
            output_dir_flag: "-o".to_string(),
        };
        let converter = ConverterCommand::from(&config);
        let cmd = converter.command_for(Path::new("x.csv"), Path::new("x_output"));
        let args: Vec<&std::ffi::OsStr> = cmd.get_args().collect();
        assert_eq!(args, vec!["x.csv", "-o", "x_output"]);
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let csv = temp_dir.path().join("t.csv");
        File::create(&csv).unwrap();
        let trial = Trial::from_path(csv).unwrap();

        let converter = ConverterCommand::new("definitely-not-a-real-converter-binary", vec![]);
        let result = run_converter(&trial, temp_dir.path(), &converter);

        assert!(matches!(result, Err(DispatchError::Spawn { .. })));
        assert!(temp_dir.path().join("t_output").is_dir());
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("convert.sh");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    /// The script receives: <csv> --output-dir <dir>
    #[cfg(unix)]
    #[test]
    fn test_dispatch_continues_after_failure() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        let out = temp_dir.path().join("out");
        fs::create_dir_all(&data).unwrap();

        for name in ["a_bad.csv", "b_good.csv"] {
            File::create(data.join(name)).unwrap();
        }

        let script = write_script(
            temp_dir.path(),
            r#"case "$1" in *bad*) echo boom >&2; exit 3;; esac
base=$(basename "$1" .csv)
echo converted > "$3/${base}_joint_1.csv""#,
        );
        let converter =
            ConverterCommand::new("sh", vec![script.to_string_lossy().into_owned()]);

        let trials = crate::core::trials::discover_trials(&data);
        let report = dispatch_all(&trials, &out, &converter, &ProgressBar::hidden());

        assert_eq!(report.total(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("a_bad.csv"));
        assert_eq!(report.converted, vec![out.join("b_good_output")]);
        assert!(out.join("b_good_output/b_good_joint_1.csv").exists());
    }

    #[test]
    fn test_dispatch_no_trials() {
        let temp_dir = TempDir::new().unwrap();
        let converter = ConverterCommand::new("true", vec![]);

        let report = dispatch_all(&[], temp_dir.path(), &converter, &ProgressBar::hidden());

        assert_eq!(report.total(), 0);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
