//! Trial discovery.
//!
//! A trial is one CSV recording in the data directory. Its converter output
//! lives in `<output_root>/<base>_output`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// Suffix of per-trial output directories.
pub const OUTPUT_DIR_SUFFIX: &str = "_output";

/// One input recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    /// Path to the CSV file.
    pub path: PathBuf,
    /// File name with directory and extension stripped.
    pub base: String,
}

impl Trial {
    /// Build a trial from a CSV path, or `None` if it has no file stem.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let base = path.file_stem()?.to_string_lossy().into_owned();
        Some(Self { path, base })
    }

    /// Directory the converter writes this trial's files into.
    pub fn output_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(format!("{}{}", self.base, OUTPUT_DIR_SUFFIX))
    }
}

/// List the CSV trials in `data_dir`, sorted by path.
///
/// A missing or unreadable directory yields no trials.
pub fn discover_trials(data_dir: &Path) -> Vec<Trial> {
    let entries = match fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read data directory {}: {}", data_dir.display(), e);
            return Vec::new();
        }
    };

    let mut csv_files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();

    csv_files.sort();
    debug!("{} CSV files in {}", csv_files.len(), data_dir.display());

    csv_files.into_iter().filter_map(Trial::from_path).collect()
}
