//! Configuration types for the joint pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory scanned for trial CSV files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Root under which `<base>_output` and `joint_<n>` directories are created
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("processed_output")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_root: default_output_root(),
        }
    }
}

/// External per-file converter invocation.
///
/// The converter is run as `<program> [args...] <csv_file> <output_dir_flag> <dir>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Executable to run
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the CSV path (e.g. a script name)
    #[serde(default)]
    pub args: Vec<String>,

    /// Flag that introduces the target directory
    #[serde(default = "default_output_dir_flag")]
    pub output_dir_flag: String,
}

fn default_program() -> String {
    "joint-converter".to_string()
}

fn default_output_dir_flag() -> String {
    "--output-dir".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            output_dir_flag: default_output_dir_flag(),
        }
    }
}

/// Joint aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointConfig {
    /// Joint numbers to aggregate (e.g., [1, 2, ..., 7])
    #[serde(default = "default_joint_ids")]
    pub ids: Vec<u32>,

    /// Filename marker prefix; `joint_` matches `..._joint_3_...`
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,
}

fn default_joint_ids() -> Vec<u32> {
    (1..=7).collect()
}

fn default_marker_prefix() -> String {
    "joint_".to_string()
}

impl Default for JointConfig {
    fn default() -> Self {
        Self {
            ids: default_joint_ids(),
            marker_prefix: default_marker_prefix(),
        }
    }
}

/// Motion segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Name of the timestamp column
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Gap (in timestamp units) above which a new segment starts
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Number of dominant columns reported per segment
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

fn default_threshold() -> f64 {
    0.1
}

fn default_top_n() -> usize {
    5
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            timestamp_column: default_timestamp_column(),
            threshold: default_threshold(),
            top_n: default_top_n(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub joints: JointConfig,

    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
