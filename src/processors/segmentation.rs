//! Motion segmentation of a trial recording by timestamp gaps.
//!
//! A recording is split wherever consecutive samples are further apart than
//! a threshold. Each segment is written to its own CSV, and a metadata JSON
//! records the segment's time span and its most active columns.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::loaders::{load_table, LoaderError, Table};
use crate::core::transforms::{column_variations, dominant_columns, ColumnVariation};
use crate::core::writers::{format_float, write_json, write_table};

/// Errors that can occur during segmentation.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("Timestamp column '{0}' not found in data")]
    MissingTimestamp(String),

    #[error("Timestamp column '{0}' is not numeric")]
    NonNumericTimestamp(String),
}

/// Metadata for one written segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
    pub segment_id: usize,
    pub filename: String,
    pub start_time: String,
    pub end_time: String,
    /// Integer when the recording's timestamps are integers.
    pub duration_seconds: Value,
    pub sample_count: usize,
    pub dominant_columns: Vec<String>,
    /// Variations of the dominant columns, in dominance order.
    pub column_variations: Map<String, Value>,
}

/// Metadata for a whole segmentation run.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentMetadata {
    pub total_segments: usize,
    pub segments: Vec<SegmentInfo>,
}

/// Outcome of [`segment_file`].
#[derive(Debug)]
pub struct SegmentationSummary {
    /// Rows loaded from the input.
    pub rows: usize,
    /// Segment CSVs written.
    pub segment_files: Vec<PathBuf>,
    /// Metadata JSON path, if any segment was written.
    pub metadata_path: Option<PathBuf>,
}

/// Split `table` into segments at timestamp gaps larger than `threshold`.
///
/// Rows are stable-sorted by timestamp first. Segments with a single sample
/// are dropped.
pub fn segment_table(
    table: &Table,
    timestamp_col: &str,
    threshold: f64,
) -> Result<Vec<Table>, SegmentationError> {
    let times = table
        .numeric_column_by_name(timestamp_col)
        .map_err(|e| match e {
            LoaderError::NonNumericColumn(c) => SegmentationError::NonNumericTimestamp(c),
            _ => SegmentationError::MissingTimestamp(timestamp_col.to_string()),
        })?;

    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

    let mut segments = Vec::new();
    let mut start = 0;

    for i in 1..order.len() {
        let gap = times[order[i]] - times[order[i - 1]];
        if gap > threshold {
            if i - start > 1 {
                segments.push(table.select_rows(&order[start..i]));
            }
            start = i;
        }
    }

    if order.len() - start > 1 {
        segments.push(table.select_rows(&order[start..]));
    }

    Ok(segments)
}

/// Column typing of a whole recording, fixed before it is split.
///
/// Segments are typed by the full recording, not by their own rows: a column
/// holding text anywhere is never ranked, even in a segment where every value
/// happens to parse.
#[derive(Debug, Clone)]
pub struct SegmentSchema {
    /// Timestamp column name.
    pub timestamp_col: String,
    /// Every timestamp cell is an integer literal.
    pub integer_timestamps: bool,
    /// Columns left out of variation ranking: the timestamp and all text columns.
    pub excluded: Vec<String>,
}

impl SegmentSchema {
    /// Derive the schema from the complete recording.
    pub fn from_table(table: &Table, timestamp_col: &str) -> Result<Self, SegmentationError> {
        let idx = table
            .column_index(timestamp_col)
            .ok_or_else(|| SegmentationError::MissingTimestamp(timestamp_col.to_string()))?;

        let mut excluded = table.non_numeric_columns();
        if excluded.iter().any(|c| c == timestamp_col) {
            return Err(SegmentationError::NonNumericTimestamp(
                timestamp_col.to_string(),
            ));
        }
        excluded.insert(0, timestamp_col.to_string());

        Ok(Self {
            timestamp_col: timestamp_col.to_string(),
            integer_timestamps: table.is_integer_column(idx),
            excluded,
        })
    }

    /// Render a timestamp the way it appears in metadata.
    fn format_time(&self, t: f64) -> String {
        if self.integer_timestamps && t.is_finite() {
            (t as i64).to_string()
        } else {
            format_float(t)
        }
    }

    fn duration_value(&self, duration: f64) -> Value {
        if self.integer_timestamps && duration.is_finite() {
            Value::from(duration as i64)
        } else {
            Value::from(duration)
        }
    }
}

fn variation_value(v: &ColumnVariation) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

/// Path of the metadata JSON for recording `base`.
pub fn metadata_path(output_dir: &Path, base: &str) -> PathBuf {
    output_dir.join(format!("{}_metadata.json", base))
}

/// Write each segment to `<base>_segment_<NNN>.csv` and a `<base>_metadata.json`.
///
/// # Arguments
///
/// * `segments` - Segments from [`segment_table`]
/// * `output_dir` - Directory for segment files (created if needed)
/// * `base` - Base filename of the source recording
/// * `schema` - Column typing of the full recording
/// * `top_n` - Number of dominant columns per segment
pub fn save_segments(
    segments: &[Table],
    output_dir: &Path,
    base: &str,
    schema: &SegmentSchema,
    top_n: usize,
) -> Result<SegmentMetadata> {
    let mut metadata = SegmentMetadata {
        total_segments: segments.len(),
        segments: Vec::with_capacity(segments.len()),
    };
    let excluded: Vec<&str> = schema.excluded.iter().map(String::as_str).collect();

    for (i, segment) in segments.iter().enumerate() {
        let segment_id = i + 1;
        let filename = format!("{}_segment_{:03}.csv", base, segment_id);
        let path = output_dir.join(&filename);

        let times = segment.numeric_column_by_name(&schema.timestamp_col)?;
        let start_time = times.first().copied().unwrap_or(f64::NAN);
        let end_time = times.last().copied().unwrap_or(f64::NAN);
        let duration = end_time - start_time;

        let variations = column_variations(segment, &excluded);
        let dominant = dominant_columns(&variations, top_n);

        let mut top_variations = Map::new();
        for name in &dominant {
            if let Some((_, v)) = variations.iter().find(|(n, _)| n == name) {
                top_variations.insert(name.clone(), variation_value(v));
            }
        }

        write_table(&path, segment)
            .with_context(|| format!("Failed to write segment {}", path.display()))?;

        println!(
            "Segment {}: {} samples, {:.3}s duration",
            segment_id,
            segment.len(),
            duration
        );
        println!("  Dominant columns: {}", dominant.join(", "));
        println!("  Saved to: {}", filename);

        metadata.segments.push(SegmentInfo {
            segment_id,
            filename,
            start_time: schema.format_time(start_time),
            end_time: schema.format_time(end_time),
            duration_seconds: schema.duration_value(duration),
            sample_count: segment.len(),
            dominant_columns: dominant,
            column_variations: top_variations,
        });
    }

    let metadata_path = metadata_path(output_dir, base);
    write_json(&metadata_path, &metadata)
        .with_context(|| format!("Failed to write metadata {}", metadata_path.display()))?;

    println!("\nMetadata saved to: {}", metadata_path.display());
    Ok(metadata)
}

/// Load, segment and save one recording.
///
/// Finding no segments is not an error: nothing is written and the summary
/// reports zero files.
pub fn segment_file(
    input: &Path,
    output_dir: &Path,
    timestamp_col: &str,
    threshold: f64,
    top_n: usize,
) -> Result<SegmentationSummary> {
    let table = load_table(input)
        .with_context(|| format!("Error reading file: {}", input.display()))?;
    println!("Loaded {} rows from {}", table.len(), input.display());

    let base = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string());

    let schema = SegmentSchema::from_table(&table, timestamp_col)?;
    let segments = segment_table(&table, timestamp_col, threshold)?;
    println!("Found {} motion segments", segments.len());

    if segments.is_empty() {
        println!("No segments found. Try adjusting the threshold.");
        return Ok(SegmentationSummary {
            rows: table.len(),
            segment_files: Vec::new(),
            metadata_path: None,
        });
    }

    let metadata = save_segments(&segments, output_dir, &base, &schema, top_n)?;

    Ok(SegmentationSummary {
        rows: table.len(),
        segment_files: metadata
            .segments
            .iter()
            .map(|s| output_dir.join(&s.filename))
            .collect(),
        metadata_path: Some(metadata_path(output_dir, &base)),
    })
}
