//! Command-line interface for the joint pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::trials::discover_trials;
use crate::processors::{aggregation, derivatives, dispatch, pipeline, segmentation};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "joint-pipeline")]
#[command(about = "Batch conversion and per-joint aggregation of joint recordings", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Location and converter overrides shared by `run` and `dispatch`.
#[derive(clap::Args)]
struct BatchArgs {
    /// Directory containing trial CSV files
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Root directory for converter and joint outputs
    #[arg(long)]
    output_root: Option<PathBuf>,
    /// Converter executable
    #[arg(long)]
    converter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every trial CSV, then aggregate outputs by joint
    Run {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Convert every trial CSV without aggregating
    Dispatch {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Copy converter outputs into joint_<n> folders
    Aggregate {
        /// Root directory holding <base>_output folders
        #[arg(long)]
        output_root: Option<PathBuf>,
        /// Joint numbers to aggregate
        #[arg(short, long, num_args = 1..)]
        joints: Option<Vec<u32>>,
        /// Preview copies without touching the filesystem
        #[arg(long)]
        dry_run: bool,
    },

    /// Split a recording into motion segments at timestamp gaps
    Segment {
        /// Input CSV file
        input: PathBuf,
        /// Name of the timestamp column
        #[arg(short, long)]
        timestamp_col: Option<String>,
        /// Time gap threshold for starting a new segment
        #[arg(long)]
        threshold: Option<f64>,
        /// Output directory for segment files
        #[arg(short, long, default_value = "segments")]
        output_dir: PathBuf,
        /// Number of dominant columns reported per segment
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Append rate-of-change columns to a recording
    Derive {
        /// Input CSV file
        input: PathBuf,
        /// Output CSV (defaults to <stem>_with_derivatives.csv next to the input)
        output: Option<PathBuf>,
        /// Name of the timestamp column
        #[arg(short, long)]
        timestamp_col: Option<String>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a bar advanced once per converted trial
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn apply_batch_overrides(config: &mut PipelineConfig, batch: BatchArgs) {
    if let Some(dir) = batch.data_dir {
        config.paths.data_dir = dir;
    }
    if let Some(dir) = batch.output_root {
        config.paths.output_root = dir;
    }
    if let Some(program) = batch.converter {
        config.converter.program = program;
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Run { batch } => {
            apply_batch_overrides(&mut config, batch);
            cmd_run(&config);
        }
        Commands::Dispatch { batch } => {
            apply_batch_overrides(&mut config, batch);
            cmd_dispatch(&config);
        }
        Commands::Aggregate {
            output_root,
            joints,
            dry_run,
        } => {
            if let Some(dir) = output_root {
                config.paths.output_root = dir;
            }
            if let Some(ids) = joints {
                config.joints.ids = ids;
            }
            cmd_aggregate(&config, dry_run);
        }
        Commands::Segment {
            input,
            timestamp_col,
            threshold,
            output_dir,
            top_n,
        } => {
            let seg = &mut config.segmentation;
            if let Some(col) = timestamp_col {
                seg.timestamp_column = col;
            }
            if let Some(t) = threshold {
                seg.threshold = t;
            }
            if let Some(n) = top_n {
                seg.top_n = n;
            }
            cmd_segment(&input, &output_dir, &config);
        }
        Commands::Derive {
            input,
            output,
            timestamp_col,
        } => {
            if let Some(col) = timestamp_col {
                config.segmentation.timestamp_column = col;
            }
            cmd_derive(&input, output, &config);
        }
    }
}

fn cmd_run(config: &PipelineConfig) {
    let start = Instant::now();

    println!("Processing trials...");
    println!("Data directory: {}", config.paths.data_dir.display());
    println!("Output root: {}", config.paths.output_root.display());
    println!("Converter: {}", config.converter.program);

    let progress = create_progress_bar();

    match pipeline::run_pipeline(config, &progress) {
        Ok(summary) => {
            let joints: Vec<String> = summary
                .joint_files
                .iter()
                .map(|(joint, n)| format!("{}:{}", joint, n))
                .collect();

            print_summary(
                "Pipeline Complete",
                &[
                    ("Data directory", config.paths.data_dir.display().to_string()),
                    ("Output root", config.paths.output_root.display().to_string()),
                    ("Trials found", summary.trials.to_string()),
                    ("Converted", summary.converted.to_string()),
                    ("Failed", summary.failed.to_string()),
                    ("Joint files", joints.join(", ")),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            progress.finish_and_clear();
            error!("Pipeline failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_dispatch(config: &PipelineConfig) {
    let start = Instant::now();
    let output_root = &config.paths.output_root;

    if let Err(e) = fs::create_dir_all(output_root) {
        error!("Failed to create {}: {}", output_root.display(), e);
        std::process::exit(1);
    }

    let trials = discover_trials(&config.paths.data_dir);
    println!(
        "Found {} CSV files in {}",
        trials.len(),
        config.paths.data_dir.display()
    );

    let progress = create_progress_bar();
    progress.set_length(trials.len() as u64);

    let converter = dispatch::ConverterCommand::from(&config.converter);
    let report = dispatch::dispatch_all(&trials, output_root, &converter, &progress);
    progress.finish_and_clear();

    print_summary(
        "Dispatch Complete",
        &[
            ("Data directory", config.paths.data_dir.display().to_string()),
            ("Output root", output_root.display().to_string()),
            ("Converted", report.converted.len().to_string()),
            ("Failed", report.failed.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_aggregate(config: &PipelineConfig, dry_run: bool) {
    let start = Instant::now();

    if dry_run {
        println!("DRY RUN: No files will be copied");
    }

    let spinner = create_spinner("Collecting joint files...");

    let result = aggregation::aggregate_joints(
        &config.paths.output_root,
        &config.joints.ids,
        &config.joints.marker_prefix,
        dry_run,
    );

    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            let kept: Vec<String> = report.joints.keys().map(u32::to_string).collect();
            let empty: Vec<String> = report.empty.iter().map(u32::to_string).collect();

            print_summary(
                "Aggregation Complete",
                &[
                    ("Output root", config.paths.output_root.display().to_string()),
                    ("Joints with files", kept.join(", ")),
                    ("Joints removed", empty.join(", ")),
                    ("Files copied", report.total_files().to_string()),
                    ("Copy failures", report.failed.len().to_string()),
                    ("Dry run", dry_run.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Aggregation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_segment(input: &Path, output_dir: &Path, config: &PipelineConfig) {
    let start = Instant::now();
    let seg = &config.segmentation;

    match segmentation::segment_file(
        input,
        output_dir,
        &seg.timestamp_column,
        seg.threshold,
        seg.top_n,
    ) {
        Ok(summary) => {
            print_summary(
                "Segmentation Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output directory", output_dir.display().to_string()),
                    ("Rows loaded", summary.rows.to_string()),
                    ("Segments", summary.segment_files.len().to_string()),
                    ("Threshold", seg.threshold.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Segmentation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Default output path for `derive`: `<stem>_with_derivatives.csv` beside the input.
fn default_derive_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_with_derivatives.csv", stem))
}

fn cmd_derive(input: &Path, output: Option<PathBuf>, config: &PipelineConfig) {
    let start = Instant::now();
    let output_path = output.unwrap_or_else(|| default_derive_output(input));

    match derivatives::derive_file(input, &output_path, &config.segmentation.timestamp_column) {
        Ok(rows) => {
            print_summary(
                "Derivatives Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output file", output_path.display().to_string()),
                    ("Rows written", rows.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Derivative computation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
