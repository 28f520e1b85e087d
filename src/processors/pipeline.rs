//! Two-phase batch run: convert every trial, then aggregate by joint.

use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::info;

use crate::config::PipelineConfig;
use crate::core::trials::discover_trials;

use super::aggregation::aggregate_joints;
use super::dispatch::{dispatch_all, ConverterCommand};

/// Counts from a full pipeline run.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    /// CSV files found in the data directory.
    pub trials: usize,
    /// Trials converted successfully.
    pub converted: usize,
    /// Trials whose conversion failed.
    pub failed: usize,
    /// Files copied per surviving joint directory.
    pub joint_files: BTreeMap<u32, usize>,
}

/// Run discovery, dispatch and aggregation with `config`.
///
/// `progress` is advanced once per trial; its length is set here.
pub fn run_pipeline(config: &PipelineConfig, progress: &ProgressBar) -> Result<PipelineSummary> {
    let paths = &config.paths;

    fs::create_dir_all(&paths.output_root).with_context(|| {
        format!(
            "Failed to create output root {}",
            paths.output_root.display()
        )
    })?;

    let trials = discover_trials(&paths.data_dir);
    info!(
        "Found {} CSV files in {}",
        trials.len(),
        paths.data_dir.display()
    );

    progress.set_length(trials.len() as u64);
    let converter = ConverterCommand::from(&config.converter);
    let dispatch = dispatch_all(&trials, &paths.output_root, &converter, progress);
    progress.finish_and_clear();

    let aggregation = aggregate_joints(
        &paths.output_root,
        &config.joints.ids,
        &config.joints.marker_prefix,
        false,
    )
    .context("Joint aggregation failed")?;

    Ok(PipelineSummary {
        trials: trials.len(),
        converted: dispatch.converted.len(),
        failed: dispatch.failed.len(),
        joint_files: aggregation
            .joints
            .iter()
            .map(|(&joint, files)| (joint, files.len()))
            .collect(),
    })
}
