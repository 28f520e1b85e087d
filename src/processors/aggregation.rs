//! Aggregation of converter outputs into per-joint directories.
//!
//! Files are copied, never moved: trial output directories stay intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use regex::Regex;
use thiserror::Error;

use crate::core::trials::OUTPUT_DIR_SUFFIX;

/// Errors that can occur during joint aggregation.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Invalid joint marker '{marker}': {source}")]
    InvalidMarker {
        marker: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to create joint directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Filename matcher for one joint number.
///
/// `joint_1` matches `trial_joint_1.csv` and `joint_1_hat.csv` but not
/// `joint_10.csv`.
#[derive(Debug, Clone)]
pub struct JointMarker {
    joint: u32,
    pattern: Regex,
}

impl JointMarker {
    /// Build a marker for `<prefix><joint>`.
    pub fn new(prefix: &str, joint: u32) -> Result<Self, AggregationError> {
        let marker = format!("{}{}", prefix, joint);
        let pattern = Regex::new(&format!(r"{}(?:\D|$)", regex::escape(&marker)))
            .map_err(|e| AggregationError::InvalidMarker { marker, source: e })?;
        Ok(Self { joint, pattern })
    }

    /// Joint number this marker selects.
    pub fn joint(&self) -> u32 {
        self.joint
    }

    /// True if `file_name` carries this joint's marker.
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }
}

/// Name of the aggregation directory for a joint.
pub fn joint_dir_name(prefix: &str, joint: u32) -> String {
    format!("{}{}", prefix, joint)
}

/// Per-trial output directories directly under `output_root`, sorted.
pub fn find_trial_output_dirs(output_root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(output_root)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .map(|name| name.to_string_lossy().ends_with(OUTPUT_DIR_SUFFIX))
                    .unwrap_or(false)
        })
        .collect();

    dirs.sort();
    dirs
}

/// Files in `trial_dirs` whose name matches `marker`.
///
/// Only regular files directly inside each directory are considered; the
/// result is ordered by directory, then by file name.
pub fn collect_joint_files(trial_dirs: &[PathBuf], marker: &JointMarker) -> Vec<PathBuf> {
    let mut matches = Vec::new();

    for dir in trial_dirs {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .map(|name| marker.matches(&name.to_string_lossy()))
                        .unwrap_or(false)
            })
            .collect();

        files.sort();
        matches.extend(files);
    }

    matches
}

/// Result of an aggregation pass.
#[derive(Debug, Default)]
pub struct AggregationReport {
    /// Destination paths per joint directory (in a dry run, the paths a real
    /// run would write). Joints without matches are absent.
    pub joints: BTreeMap<u32, Vec<PathBuf>>,
    /// Joints whose directory was removed because nothing matched.
    pub empty: Vec<u32>,
    /// Copies that failed.
    pub failed: Vec<(PathBuf, String)>,
}

impl AggregationReport {
    /// Total number of files copied across all joints.
    pub fn total_files(&self) -> usize {
        self.joints.values().map(Vec::len).sum()
    }
}

/// Copy converter outputs into `joint_<n>` directories under `output_root`.
///
/// For every joint: the destination directory is created, every trial output
/// directory is scanned for matching files, and each match is copied in
/// under its original name. A destination that received nothing is removed.
/// A missing `output_root` is left uncreated and every joint reported empty.
///
/// # Arguments
///
/// * `output_root` - Directory holding the `<base>_output` trial directories
/// * `joints` - Joint numbers to aggregate
/// * `prefix` - Marker prefix, also used for destination directory names
/// * `dry_run` - If true, only report what would be copied
pub fn aggregate_joints(
    output_root: &Path,
    joints: &[u32],
    prefix: &str,
    dry_run: bool,
) -> Result<AggregationReport, AggregationError> {
    let mut report = AggregationReport::default();

    if !output_root.is_dir() {
        info!(
            "Output root {} does not exist; nothing to aggregate",
            output_root.display()
        );
        report.empty = joints.to_vec();
        return Ok(report);
    }

    let trial_dirs = find_trial_output_dirs(output_root);
    debug!(
        "{} trial output directories under {}",
        trial_dirs.len(),
        output_root.display()
    );

    for &joint in joints {
        let marker = JointMarker::new(prefix, joint)?;
        let dir_name = joint_dir_name(prefix, joint);
        let dest_dir = output_root.join(&dir_name);

        if !dry_run {
            fs::create_dir_all(&dest_dir).map_err(|e| AggregationError::CreateDirectory {
                path: dest_dir.clone(),
                source: e,
            })?;
        }

        let sources = collect_joint_files(&trial_dirs, &marker);
        let mut placed: Vec<PathBuf> = Vec::with_capacity(sources.len());

        for src in sources {
            let file_name = match src.file_name() {
                Some(name) => name.to_owned(),
                None => continue,
            };
            let dest = dest_dir.join(&file_name);

            if placed.contains(&dest) {
                warn!(
                    "{} already collected for joint {}; overwriting with {}",
                    file_name.to_string_lossy(),
                    joint,
                    src.display()
                );
            }

            if dry_run {
                println!(
                    "Would copy joint {}: {} -> {}/",
                    joint,
                    src.display(),
                    dir_name
                );
                if !placed.contains(&dest) {
                    placed.push(dest);
                }
                continue;
            }

            match fs::copy(&src, &dest) {
                Ok(_) => {
                    debug!("Copied {} -> {}", src.display(), dest.display());
                    if !placed.contains(&dest) {
                        placed.push(dest);
                    }
                }
                Err(e) => {
                    error!("Failed to copy {}: {}", src.display(), e);
                    report.failed.push((src, e.to_string()));
                }
            }
        }

        if placed.is_empty() {
            info!("No files found for joint {}", joint);
            if !dry_run {
                if let Err(e) = fs::remove_dir(&dest_dir) {
                    warn!("Could not remove {}: {}", dest_dir.display(), e);
                }
            }
            report.empty.push(joint);
        } else {
            println!("Joint {}: {} files -> {}/", joint, placed.len(), dir_name);
            report.joints.insert(joint, placed);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_output_file(root: &Path, trial: &str, name: &str, content: &str) -> PathBuf {
        let dir = root.join(format!("{}_output", trial));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_joint_marker_boundaries() {
        let marker = JointMarker::new("joint_", 1).unwrap();
        assert_eq!(marker.joint(), 1);
        assert!(marker.matches("walk_joint_1.csv"));
        assert!(marker.matches("joint_1"));
        assert!(marker.matches("walk_joint_1_hat.csv"));
        assert!(!marker.matches("walk_joint_10.csv"));
        assert!(!marker.matches("walk_joint_2.csv"));
        assert!(!marker.matches("walk_jointX1.csv"));
    }

    #[test]
    fn test_joint_marker_escapes_prefix() {
        let marker = JointMarker::new("j.", 3).unwrap();
        assert!(marker.matches("a_j.3.csv"));
        assert!(!marker.matches("a_jx3.csv"));
    }

    #[test]
    fn test_find_trial_output_dirs() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("b_output")).unwrap();
        fs::create_dir_all(temp_dir.path().join("a_output")).unwrap();
        fs::create_dir_all(temp_dir.path().join("joint_3")).unwrap();
        File::create(temp_dir.path().join("c_output")).unwrap();

        let dirs = find_trial_output_dirs(temp_dir.path());
        assert_eq!(
            dirs,
            vec![temp_dir.path().join("a_output"), temp_dir.path().join("b_output")]
        );
    }

    #[test]
    fn test_only_matching_joints_survive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_output_file(root, "t1", "t1_joint_3.csv", "a");
        create_output_file(root, "t1", "t1_joint_5.csv", "b");
        create_output_file(root, "t2", "t2_joint_3.csv", "c");

        let joints: Vec<u32> = (1..=7).collect();
        let report = aggregate_joints(root, &joints, "joint_", false).unwrap();

        assert_eq!(report.joints.keys().copied().collect::<Vec<_>>(), vec![3, 5]);
        assert_eq!(report.empty, vec![1, 2, 4, 6, 7]);
        assert_eq!(report.total_files(), 3);

        assert!(root.join("joint_3/t1_joint_3.csv").exists());
        assert!(root.join("joint_3/t2_joint_3.csv").exists());
        assert!(root.join("joint_5/t1_joint_5.csv").exists());
        for n in [1, 2, 4, 6, 7] {
            assert!(!root.join(format!("joint_{}", n)).exists());
        }
    }

    #[test]
    fn test_copies_preserve_name_and_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let content = "timestamp,joint_2\n0.0,1.25\n0.1,1.5\n";
        let src = create_output_file(root, "walk", "walk_joint_2.csv", content);

        aggregate_joints(root, &[2], "joint_", false).unwrap();

        let copy = root.join("joint_2/walk_joint_2.csv");
        assert_eq!(fs::read(&copy).unwrap(), fs::read(&src).unwrap());
        // Source is copied, not moved
        assert!(src.exists());
    }

    #[test]
    fn test_no_trial_dirs_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let report = aggregate_joints(temp_dir.path(), &[1, 2, 3], "joint_", false).unwrap();

        assert!(report.joints.is_empty());
        assert_eq!(report.empty, vec![1, 2, 3]);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_output_file(root, "t1", "t1_joint_4.csv", "x");

        let report = aggregate_joints(root, &[4, 6], "joint_", true).unwrap();

        assert_eq!(report.joints.get(&4).map(Vec::len), Some(1));
        assert!(!root.join("joint_4").exists());
        assert!(!root.join("joint_6").exists());
    }

    #[test]
    fn test_duplicate_basenames_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_output_file(root, "a", "joint_1.csv", "first");
        create_output_file(root, "b", "joint_1.csv", "second");

        let report = aggregate_joints(root, &[1], "joint_", false).unwrap();

        assert_eq!(report.joints.get(&1).map(Vec::len), Some(1));
        assert_eq!(fs::read_to_string(root.join("joint_1/joint_1.csv")).unwrap(), "second");
    }

    #[test]
    fn test_missing_output_root_is_not_created() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("processed_output");

        let report = aggregate_joints(&root, &[1, 2], "joint_", false).unwrap();

        assert!(report.joints.is_empty());
        assert_eq!(report.empty, vec![1, 2]);
        assert!(!root.exists());
    }

    #[test]
    fn test_dry_run_counts_duplicate_basenames_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_output_file(root, "a", "joint_1.csv", "first");
        create_output_file(root, "b", "joint_1.csv", "second");
        create_output_file(root, "b", "b_joint_1.csv", "third");

        let preview = aggregate_joints(root, &[1], "joint_", true).unwrap();
        assert_eq!(
            preview.joints.get(&1),
            Some(&vec![root.join("joint_1/joint_1.csv"), root.join("joint_1/b_joint_1.csv")])
        );

        let real = aggregate_joints(root, &[1], "joint_", false).unwrap();
        assert_eq!(preview.total_files(), real.total_files());
    }
}
