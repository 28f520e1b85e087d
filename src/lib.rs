//! Batch processing of joint-value CSV recordings.
//!
//! This crate provides tools for:
//! - Running an external converter once per trial CSV
//! - Aggregating converter outputs into per-joint directories
//! - Splitting a recording into motion segments at timestamp gaps
//! - Appending rate-of-change columns to a recording
//!
//! # Example
//!
//! ```no_run
//! use indicatif::ProgressBar;
//! use joint_pipeline::{processors::pipeline::run_pipeline, PipelineConfig};
//!
//! let summary = run_pipeline(&PipelineConfig::default(), &ProgressBar::hidden()).unwrap();
//! println!("{} trials, {} joints", summary.trials, summary.joint_files.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{ConverterConfig, JointConfig, PathsConfig, PipelineConfig, SegmentationConfig};
pub use crate::core::loaders::Table;
pub use crate::core::trials::Trial;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
