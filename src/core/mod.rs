//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod trials;
pub mod writers;

pub use loaders::{load_table, LoaderError, Table};
pub use transforms::ColumnVariation;
pub use trials::{discover_trials, Trial};
pub use writers::{format_float, write_json, write_table, WriteError};
