//! Data processing modules.

pub mod aggregation;
pub mod derivatives;
pub mod dispatch;
pub mod pipeline;
pub mod segmentation;

// Re-export key types for convenience
pub use aggregation::{
    aggregate_joints, collect_joint_files, find_trial_output_dirs, AggregationError,
    AggregationReport, JointMarker,
};
pub use derivatives::{add_rate_columns, derive_file};
pub use dispatch::{dispatch_all, run_converter, ConverterCommand, DispatchError, DispatchReport};
pub use pipeline::{run_pipeline, PipelineSummary};
pub use segmentation::{
    save_segments, segment_file, segment_table, SegmentMetadata, SegmentSchema,
    SegmentationError,
};
